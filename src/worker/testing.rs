//! Test doubles for the fetch and storage seams

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, stream};
use tokio::sync::Notify;

use super::http::{BrowserHeaders, FetchError, FetchedBody, Fetcher, Headers};
use super::runner::TaskContext;
use crate::config::Config;
use crate::settings::SettingsStore;
use crate::storage::{self, ByteStream, ObjectStoreClient, StorageError, UploadMetadata};

pub fn test_context(
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn ObjectStoreClient>,
    cookie: &str,
) -> TaskContext {
    let mut config = Config::default();
    config.source.cookie = cookie.to_string();

    TaskContext {
        settings: Arc::new(SettingsStore::from(&config)),
        fetcher,
        storage,
        headers: BrowserHeaders::from(&config.worker),
    }
}

#[derive(Debug, Clone)]
pub struct FetchCall {
    pub url: String,
    pub headers: Headers,
}

impl FetchCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Serves a fixed body, failing, panicking or pausing on URLs containing
/// configured substrings
pub struct MockFetcher {
    body: &'static [u8],
    fail_on: Vec<&'static str>,
    panic_on: Vec<&'static str>,
    hold: Option<(&'static str, Arc<Notify>)>,
    calls: Mutex<Vec<FetchCall>>,
}

impl MockFetcher {
    pub fn with_body(body: &'static [u8]) -> Self {
        Self {
            body,
            fail_on: Vec::new(),
            panic_on: Vec::new(),
            hold: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, pattern: &'static str) -> Self {
        self.fail_on.push(pattern);
        self
    }

    pub fn panicking_on(mut self, pattern: &'static str) -> Self {
        self.panic_on.push(pattern);
        self
    }

    /// Block fetches matching `pattern` until `gate` is notified
    pub fn holding(mut self, pattern: &'static str, gate: Arc<Notify>) -> Self {
        self.hold = Some((pattern, gate));
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, headers: &Headers) -> Result<FetchedBody, FetchError> {
        self.calls.lock().unwrap().push(FetchCall {
            url: url.to_string(),
            headers: headers.clone(),
        });

        if self.panic_on.iter().any(|p| url.contains(p)) {
            panic!("fetch exploded on {}", url);
        }
        if self.fail_on.iter().any(|p| url.contains(p)) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        if let Some((pattern, gate)) = &self.hold {
            if url.contains(pattern) {
                gate.notified().await;
            }
        }

        let chunks: Vec<std::io::Result<Bytes>> = vec![Ok(Bytes::from_static(self.body))];
        Ok(FetchedBody {
            stream: stream::iter(chunks).boxed(),
            content_length: Some(self.body.len() as u64),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PutCall {
    pub bucket: String,
    pub key: String,
    pub bytes: Bytes,
    pub size: Option<u64>,
    pub content_type: String,
}

/// Object store that remembers every successful put
pub struct RecordingStore {
    bucket: Option<&'static str>,
    puts: Mutex<Vec<PutCall>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            bucket: Some("picbox"),
            puts: Mutex::new(Vec::new()),
        }
    }

    pub fn without_bucket() -> Self {
        Self {
            bucket: None,
            puts: Mutex::new(Vec::new()),
        }
    }

    pub fn puts(&self) -> Vec<PutCall> {
        self.puts.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.puts().into_iter().map(|put| put.key).collect()
    }

    /// Poll until at least `count` puts happened
    pub async fn wait_for_puts(&self, count: usize) -> Vec<PutCall> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let puts = self.puts();
                if puts.len() >= count {
                    return puts;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for uploads")
    }
}

#[async_trait]
impl ObjectStoreClient for RecordingStore {
    async fn bucket_exists(&self, bucket: &str) -> storage::Result<bool> {
        Ok(self.bucket == Some(bucket))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: ByteStream,
        size: Option<u64>,
        content_type: &str,
    ) -> storage::Result<UploadMetadata> {
        if !self.bucket_exists(bucket).await? {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }

        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        let bytes = buffer.freeze();

        self.puts.lock().unwrap().push(PutCall {
            bucket: bucket.to_string(),
            key: key.to_string(),
            bytes: bytes.clone(),
            size,
            content_type: content_type.to_string(),
        });

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: None,
            size: bytes.len() as u64,
        })
    }
}
