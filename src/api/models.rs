//! Wire types of the admission API.
//!
//! Every JSON reply uses the same envelope:
//!
//! ```json
//! { "code": 0, "msg": "success", "data": { "pic_num": 2, "pic_ids": ["..."], "pic_infos": {} } }
//! ```
//!
//! Errors carry the HTTP status in `code` and a null `data`.

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;
use crate::shutdown::Phase;

/// Body of `POST /api/images`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitRequest {
    /// Post URL; its last path segment is the post id
    pub url: String,
    /// Replacement session cookie, applied before the lookup when non-empty
    #[serde(default)]
    pub cookie: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub msg: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            msg: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueStatus {
    pub capacity: usize,
    pub queued: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub phase: Phase,
    pub queue: QueueStatus,
    pub metrics: MetricsSnapshot,
    pub version: String,
}
