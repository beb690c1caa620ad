use axum::http::HeaderValue;
use reqwest::Url;

use super::error::ApiError;
use super::models::SubmitRequest;

/// Post id named by the request's URL: the last non-empty path segment of an
/// absolute URL.
pub fn post_id(request: &SubmitRequest) -> Result<String, ApiError> {
    let url = Url::parse(request.url.trim()).map_err(|_| ApiError::InvalidParameters)?;

    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_owned)
        .ok_or(ApiError::InvalidParameters)
}

/// Replacement cookie carried by the request, if any. It is sent verbatim as
/// a header on every later fetch, so it must be a valid header value.
pub fn cookie(request: &SubmitRequest) -> Result<Option<&str>, ApiError> {
    if request.cookie.is_empty() {
        return Ok(None);
    }

    HeaderValue::from_str(&request.cookie).map_err(|_| ApiError::InvalidParameters)?;
    Ok(Some(&request.cookie))
}
