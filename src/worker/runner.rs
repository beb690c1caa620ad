//! Task runner - fetches one job's resource and stores it

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::http::{BrowserHeaders, FetchError, Fetcher};
use super::naming;
use crate::queue::Job;
use crate::settings::SettingsStore;
use crate::storage::{ObjectStoreClient, StorageError, UploadMetadata};

/// Content type recorded on every stored object
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Store failed: {0}")]
    Store(#[from] StorageError),
}

/// Collaborators shared by every task
#[derive(Clone)]
pub struct TaskContext {
    pub settings: Arc<SettingsStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub storage: Arc<dyn ObjectStoreClient>,
    pub headers: BrowserHeaders,
}

/// Fetch `job` and store it under its derived object name.
///
/// The settings are read here, once, so a cookie update made while earlier
/// tasks are in flight applies to this fetch. The response body is owned by
/// this call and dropped on every return path.
pub async fn process_job(job: Job, ctx: &TaskContext) -> Result<UploadMetadata, TaskError> {
    let url = job.url();
    let object_name = naming::object_name(url);

    let settings = ctx.settings.read().await;
    let headers = ctx.headers.build(&settings.cookie, Some(url));

    let body = ctx.fetcher.fetch(url, &headers).await?;
    debug!(object_name = %object_name, content_length = ?body.content_length, "Fetched resource");

    let meta = ctx
        .storage
        .put_object(
            &settings.bucket,
            &object_name,
            body.stream,
            body.content_length,
            IMAGE_CONTENT_TYPE,
        )
        .await?;

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{MockFetcher, RecordingStore, test_context};

    #[tokio::test]
    async fn test_fetched_bytes_are_stored_under_last_segment() {
        let fetcher = Arc::new(MockFetcher::with_body(b"123456789"));
        let store = Arc::new(RecordingStore::new());
        let ctx = test_context(fetcher.clone(), store.clone(), "SUB=1");

        let meta = process_job(Job::from("http://host/path/123.jpg"), &ctx)
            .await
            .unwrap();

        assert_eq!(meta.key, "123.jpg");
        let puts = store.puts();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].bucket, "picbox");
        assert_eq!(puts[0].key, "123.jpg");
        assert_eq!(puts[0].size, Some(9));
        assert_eq!(puts[0].content_type, IMAGE_CONTENT_TYPE);
        assert_eq!(&puts[0].bytes[..], b"123456789");
    }

    #[tokio::test]
    async fn test_empty_locator_stored_under_random_name() {
        let fetcher = Arc::new(MockFetcher::with_body(b"x"));
        let store = Arc::new(RecordingStore::new());
        let ctx = test_context(fetcher, store.clone(), "");

        let meta = process_job(Job::from(""), &ctx).await.unwrap();

        let stem = meta.key.strip_suffix(".jpg").unwrap();
        assert_eq!(stem.len(), 32);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(store.puts()[0].key, meta.key);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_store() {
        let fetcher = Arc::new(MockFetcher::with_body(b"x").failing_on("broken"));
        let store = Arc::new(RecordingStore::new());
        let ctx = test_context(fetcher.clone(), store.clone(), "");

        let err = process_job(Job::from("http://host/broken.jpg"), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::Fetch(_)));
        assert_eq!(fetcher.calls().len(), 1);
        assert!(store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_bucket_is_a_task_error() {
        let fetcher = Arc::new(MockFetcher::with_body(b"x"));
        let store = Arc::new(RecordingStore::without_bucket());
        let ctx = test_context(fetcher, store.clone(), "");

        let err = process_job(Job::from("http://host/a.jpg"), &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, TaskError::Store(StorageError::BucketNotFound(_))));
        assert!(store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_request_carries_fixed_headers_and_current_cookie() {
        let fetcher = Arc::new(MockFetcher::with_body(b"x"));
        let store = Arc::new(RecordingStore::new());
        let ctx = test_context(fetcher.clone(), store, "first");

        process_job(Job::from("http://host/1.jpg"), &ctx).await.unwrap();
        ctx.settings.update_secret("second").await;
        process_job(Job::from("http://host/2.jpg"), &ctx).await.unwrap();

        let calls = fetcher.calls();
        assert_eq!(calls[0].header("cookie"), Some("first"));
        assert_eq!(calls[1].header("cookie"), Some("second"));
        assert_eq!(calls[1].header("referer"), Some("http://host/2.jpg"));
        assert!(calls[1].header("user-agent").is_some());
        assert!(calls[1].header("accept").is_some());
        assert!(calls[1].header("accept-language").is_some());
    }
}
