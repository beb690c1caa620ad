//! Post lookup: turns a post id into the media URLs to download

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::queue::Job;
use crate::settings::SettingsStore;
use crate::worker::http::{BrowserHeaders, FetchError, HttpClient};

const ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("make request to {url} err: {source}")]
    Request {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("decode lookup response err: {0}")]
    Decode(String),
}

/// Media listing of one post, echoed back to the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaLookup {
    #[serde(default)]
    pub pic_num: u32,
    #[serde(default)]
    pub pic_ids: Vec<String>,
    #[serde(default)]
    pub pic_infos: serde_json::Value,
}

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, post_id: &str) -> Result<MediaLookup, ResolveError>;
}

/// Queries the status lookup endpoint with the current session cookie
pub struct StatusLookupResolver {
    client: HttpClient,
    settings: Arc<SettingsStore>,
    headers: BrowserHeaders,
    url_template: String,
}

impl StatusLookupResolver {
    pub fn new(
        client: HttpClient,
        settings: Arc<SettingsStore>,
        headers: BrowserHeaders,
        url_template: String,
    ) -> Self {
        Self {
            client,
            settings,
            headers,
            url_template,
        }
    }
}

#[async_trait]
impl Resolver for StatusLookupResolver {
    async fn resolve(&self, post_id: &str) -> Result<MediaLookup, ResolveError> {
        let url = expand(&self.url_template, post_id);
        let cookie = self.settings.cookie().await;
        let headers = self.headers.build(&cookie, None);

        let response = self
            .client
            .get(&url, &headers)
            .await
            .map_err(|source| ResolveError::Request {
                url: url.clone(),
                source,
            })?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ResolveError::Decode(e.to_string()))?;
        let lookup: MediaLookup =
            serde_json::from_slice(&body).map_err(|e| ResolveError::Decode(e.to_string()))?;

        debug!(post_id, media = lookup.pic_ids.len(), "Resolved post");
        Ok(lookup)
    }
}

/// One job per media id, in listing order
pub fn media_jobs(lookup: &MediaLookup, url_template: &str) -> Vec<Job> {
    lookup
        .pic_ids
        .iter()
        .map(|id| Job::new(expand(url_template, id)))
        .collect()
}

fn expand(template: &str, id: &str) -> String {
    template.replace(ID_PLACEHOLDER, id)
}
