use axum::{Json, extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tracing::{info, warn};

use super::{
    error::ApiError,
    models::{ApiResponse, HealthResponse, QueueStatus, SubmitRequest},
    state::AppState,
};
use crate::resolver::media_jobs;
use crate::shutdown::Phase;

/// Image submission endpoint (POST /api/images)
///
/// ## Flow:
/// 1. Require a JSON Content-Type and a body within the configured limit
/// 2. Decode `{url, cookie}` and take the post id from the URL path
/// 3. Install the new session cookie when one is supplied; a cookie that is
///    not a valid header value is rejected before anything changes
/// 4. Look the post up and build one job per media id
/// 5. Offer each job to the admission queue; a full queue drops the job
///    (logged) without failing the request
/// 6. Reply with the lookup result
pub async fn submit_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    super::utils::parse_content_type(content_type)?;

    let body_bytes = read_body(body, state.max_payload_bytes).await?;
    let request: SubmitRequest = serde_json::from_slice(&body_bytes)?;
    let post_id = super::validation::post_id(&request)?;

    if let Some(cookie) = super::validation::cookie(&request)? {
        state.settings.update_secret(cookie).await;
    }

    let lookup = state.resolver.resolve(&post_id).await.map_err(|e| {
        warn!(post_id = %post_id, error = %e, "Post lookup failed");
        ApiError::Lookup(e.to_string())
    })?;

    let jobs = media_jobs(&lookup, &state.media_url_template);
    let total = jobs.len();
    let mut admitted = 0;
    for job in jobs {
        if state.queue.try_enqueue(job) {
            state.metrics.job_admitted();
            admitted += 1;
        } else {
            state.metrics.job_rejected();
        }
    }

    info!(post_id = %post_id, total, admitted, "Post submitted");

    Ok((StatusCode::OK, Json(ApiResponse::ok(lookup))))
}

/// Reads the request body, refusing anything larger than `max_size`
async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let data = Limited::new(body, max_size)
        .collect()
        .await
        .map_err(|err| {
            if err.is::<LengthLimitError>() {
                ApiError::PayloadTooLarge(max_size)
            } else {
                ApiError::Internal(err.to_string())
            }
        })?
        .to_bytes()
        .to_vec();

    Ok(data)
}

/// Liveness probe (GET /ping)
pub async fn ping() -> &'static str {
    "pong"
}

/// Health endpoint (GET /health)
///
/// 200 while running, 503 once shutdown has begun.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let phase = state.coordinator.phase();
    let (status, status_code) = match phase {
        Phase::Running => ("healthy", StatusCode::OK),
        Phase::Draining | Phase::Stopped => ("shutting_down", StatusCode::SERVICE_UNAVAILABLE),
    };

    let response = HealthResponse {
        status: status.to_string(),
        phase,
        queue: QueueStatus {
            capacity: state.queue.capacity(),
            queued: state.queue.len(),
        },
        metrics: state.metrics.snapshot(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}
