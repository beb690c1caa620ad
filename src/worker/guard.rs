//! Panic boundary around per-job tasks

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{error, info, warn};

use super::runner::TaskError;
use crate::storage::UploadMetadata;

/// How a task ended. Only logged, never stored.
#[derive(Debug)]
pub enum TaskOutcome {
    Stored(UploadMetadata),
    Failed(TaskError),
    Panicked(String),
}

impl TaskOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, TaskOutcome::Stored(_))
    }
}

/// Drive `task` to completion, converting a panic anywhere inside it into
/// [`TaskOutcome::Panicked`]. Nothing unwinds past this frame.
pub async fn run_guarded<F>(task: F) -> TaskOutcome
where
    F: Future<Output = Result<UploadMetadata, TaskError>>,
{
    match AssertUnwindSafe(task).catch_unwind().await {
        Ok(Ok(meta)) => {
            info!(key = %meta.key, size = meta.size, "Task completed");
            TaskOutcome::Stored(meta)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Task failed");
            TaskOutcome::Failed(e)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(panic_msg = %message, "Task panicked");
            TaskOutcome::Panicked(message)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
