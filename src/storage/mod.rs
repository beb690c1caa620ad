//! Object storage for downloaded media
//! Uses Apache Arrow object_store crate

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::aws::AmazonS3Builder;
use object_store::{
    Attribute, Attributes, ObjectStore, PutMultipartOptions, WriteMultipart,
    path::Path as StoragePath,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{StorageConfig, StorageProvider};

/// Multipart part size; S3 rejects non-final parts below 5 MiB
const PART_SIZE: usize = 5 * 1024 * 1024;

/// Parts uploaded concurrently per object. Bounds the memory held for one
/// upload to roughly `PART_SIZE * (MAX_PARTS_IN_FLIGHT + 1)`.
const MAX_PARTS_IN_FLIGHT: usize = 2;

/// Streamed object body. Dropping it releases the underlying connection.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Bucket {0} does not exist")]
    BucketNotFound(String),

    #[error("Reading object body failed: {0}")]
    BodyRead(#[from] std::io::Error),

    #[error("Declared size {declared} bytes but received {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: u64,
}

/// Object read back from storage
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Put-object capability used by worker tasks
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Whether `bucket` can receive objects
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Store `body` under `key`. Fails with [`StorageError::BucketNotFound`]
    /// when the bucket is absent.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        size: Option<u64>,
        content_type: &str,
    ) -> Result<UploadMetadata>;
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub bucket: String,
    timeout: Duration,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String, timeout: Duration) -> Self {
        Self {
            store,
            bucket,
            timeout,
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            bucket.into(),
            Duration::from_secs(20),
        )
    }

    /// Build the backend described by the storage section of the config
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::Memory => {
                tracing::warn!(bucket = %config.bucket, "Using in-memory storage, objects are lost on exit");
                Ok(Self::new(
                    Arc::new(object_store::memory::InMemory::new()),
                    config.bucket.clone(),
                    config.timeout(),
                ))
            }
            StorageProvider::S3 => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&config.bucket)
                    .with_region(config.region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(config.allow_http);

                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(access_key) = &config.access_key {
                    builder = builder.with_access_key_id(access_key);
                }
                if let Some(secret_key) = &config.secret_key {
                    builder = builder.with_secret_access_key(secret_key);
                }

                let store = builder.build()?;
                tracing::info!(bucket = %config.bucket, endpoint = ?config.endpoint, "Using S3 storage");
                Ok(Self::new(
                    Arc::new(store),
                    config.bucket.clone(),
                    config.timeout(),
                ))
            }
        }
    }

    /// Read an object back
    pub async fn get_object(&self, key: &str) -> Result<StoredObject> {
        let path = StoragePath::from(key);

        let result = self.with_deadline(self.store.get(&path)).await?;
        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| value.to_string());
        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Read from storage");

        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.with_deadline(self.store.head(&path)).await {
            Ok(_) => Ok(true),
            Err(StorageError::ObjectStoreError(object_store::Error::NotFound { .. })) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn with_deadline<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = object_store::Result<T>>,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| StorageError::Timeout(self.timeout))?
            .map_err(StorageError::from)
    }
}

#[async_trait]
impl ObjectStoreClient for StorageClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        if bucket != self.bucket {
            return Ok(false);
        }

        // Only the first listing entry is pulled: one request however large
        // the bucket is. A missing bucket fails that request with NotFound.
        let mut listing = self.store.list(None);
        let first = async { listing.next().await.transpose() };
        match self.with_deadline(first).await {
            Ok(_) => Ok(true),
            Err(StorageError::ObjectStoreError(object_store::Error::NotFound { .. })) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: ByteStream,
        size: Option<u64>,
        content_type: &str,
    ) -> Result<UploadMetadata> {
        if !self.bucket_exists(bucket).await? {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutMultipartOptions {
            attributes,
            ..Default::default()
        };

        let path = StoragePath::from(key);
        let upload = self
            .with_deadline(self.store.put_multipart_opts(&path, options))
            .await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, PART_SIZE);

        let copy = async {
            let mut actual: u64 = 0;
            while let Some(chunk) = body.next().await {
                let chunk = chunk.map_err(StorageError::BodyRead)?;
                actual += chunk.len() as u64;
                if let Some(declared) = size {
                    if actual > declared {
                        return Err(StorageError::SizeMismatch { declared, actual });
                    }
                }
                writer
                    .wait_for_capacity(MAX_PARTS_IN_FLIGHT)
                    .await
                    .map_err(StorageError::ObjectStoreError)?;
                writer.put(chunk);
            }
            match size {
                Some(declared) if declared != actual => {
                    Err(StorageError::SizeMismatch { declared, actual })
                }
                _ => Ok(actual),
            }
        };
        let copied = tokio::time::timeout(self.timeout, copy)
            .await
            .unwrap_or(Err(StorageError::Timeout(self.timeout)));
        drop(body);

        let actual = match copied {
            Ok(actual) => actual,
            Err(e) => {
                if let Err(abort_err) = writer.abort().await {
                    tracing::warn!(bucket, key, error = %abort_err, "Failed to abort upload");
                }
                return Err(e);
            }
        };

        let put_result = self.with_deadline(writer.finish()).await?;

        tracing::info!(bucket, key, size = actual, content_type, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size: actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use object_store::memory::InMemory;
    use object_store::{
        GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, PutOptions, PutPayload,
        PutResult,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store counting the listing entries its callers pull
    #[derive(Debug, Default)]
    struct CountingStore {
        inner: InMemory,
        listed: Arc<AtomicUsize>,
    }

    impl std::fmt::Display for CountingStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "CountingStore({})", self.inner)
        }
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn put_opts(
            &self,
            location: &StoragePath,
            payload: PutPayload,
            opts: PutOptions,
        ) -> object_store::Result<PutResult> {
            self.inner.put_opts(location, payload, opts).await
        }

        async fn put_multipart_opts(
            &self,
            location: &StoragePath,
            opts: PutMultipartOptions,
        ) -> object_store::Result<Box<dyn MultipartUpload>> {
            self.inner.put_multipart_opts(location, opts).await
        }

        async fn get_opts(
            &self,
            location: &StoragePath,
            options: GetOptions,
        ) -> object_store::Result<GetResult> {
            self.inner.get_opts(location, options).await
        }

        async fn delete(&self, location: &StoragePath) -> object_store::Result<()> {
            self.inner.delete(location).await
        }

        fn list(
            &self,
            prefix: Option<&StoragePath>,
        ) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
            let listed = self.listed.clone();
            self.inner
                .list(prefix)
                .inspect(move |_| {
                    listed.fetch_add(1, Ordering::SeqCst);
                })
                .boxed()
        }

        async fn list_with_delimiter(
            &self,
            prefix: Option<&StoragePath>,
        ) -> object_store::Result<ListResult> {
            let result = self.inner.list_with_delimiter(prefix).await?;
            self.listed.fetch_add(result.objects.len(), Ordering::SeqCst);
            Ok(result)
        }

        async fn copy(&self, from: &StoragePath, to: &StoragePath) -> object_store::Result<()> {
            self.inner.copy(from, to).await
        }

        async fn copy_if_not_exists(
            &self,
            from: &StoragePath,
            to: &StoragePath,
        ) -> object_store::Result<()> {
            self.inner.copy_if_not_exists(from, to).await
        }
    }

    fn body(chunks: &[&'static str]) -> ByteStream {
        let items: Vec<std::io::Result<Bytes>> = chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect();
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn test_put_object_round_trip_keeps_content_type() {
        let storage = StorageClient::in_memory("images");

        let meta = storage
            .put_object("images", "a.jpg", body(&["abc", "def"]), Some(6), "image/jpeg")
            .await
            .unwrap();

        assert_eq!(meta.key, "a.jpg");
        assert_eq!(meta.size, 6);

        let stored = storage.get_object("a.jpg").await.unwrap();
        assert_eq!(&stored.bytes[..], b"abcdef");
        assert_eq!(stored.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_unknown_bucket_is_rejected() {
        let storage = StorageClient::in_memory("images");

        assert!(!storage.bucket_exists("other").await.unwrap());

        let err = storage
            .put_object("other", "a.jpg", body(&["x"]), Some(1), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::BucketNotFound(ref b) if b == "other"));
        assert!(!storage.exists("a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_size_mismatch_is_an_error() {
        let storage = StorageClient::in_memory("images");

        let err = storage
            .put_object("images", "short.jpg", body(&["1234"]), Some(9), "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::SizeMismatch {
                declared: 9,
                actual: 4
            }
        ));
        assert!(!storage.exists("short.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_size_accepts_any_length() {
        let storage = StorageClient::in_memory("images");

        let meta = storage
            .put_object("images", "n.jpg", body(&["12", "345"]), None, "image/jpeg")
            .await
            .unwrap();
        assert_eq!(meta.size, 5);
    }

    #[tokio::test]
    async fn test_body_error_aborts_upload() {
        let storage = StorageClient::in_memory("images");
        let items: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"12")),
            Err(std::io::Error::other("connection reset")),
        ];

        let err = storage
            .put_object("images", "broken.jpg", stream::iter(items).boxed(), None, "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::BodyRead(_)));
        assert!(!storage.exists("broken.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_bucket_check_reads_one_entry_regardless_of_size() {
        let store = Arc::new(CountingStore::default());
        let listed = store.listed.clone();
        let storage = StorageClient::new(store, "images".to_string(), Duration::from_secs(20));

        for i in 0..50 {
            storage
                .put_object("images", &format!("{i}.jpg"), body(&["x"]), Some(1), "image/jpeg")
                .await
                .unwrap();
        }

        listed.store(0, Ordering::SeqCst);
        assert!(storage.bucket_exists("images").await.unwrap());
        assert!(listed.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test]
    async fn test_empty_bucket_exists() {
        let storage = StorageClient::in_memory("images");

        assert!(storage.bucket_exists("images").await.unwrap());
    }

    #[tokio::test]
    async fn test_large_body_is_uploaded_in_parts() {
        let storage = StorageClient::in_memory("images");
        let chunk = Bytes::from(vec![7u8; 1024 * 1024]);
        let chunks: Vec<std::io::Result<Bytes>> = (0..12).map(|_| Ok(chunk.clone())).collect();
        let total = 12 * 1024 * 1024;

        let meta = storage
            .put_object(
                "images",
                "big.jpg",
                stream::iter(chunks).boxed(),
                Some(total),
                "image/jpeg",
            )
            .await
            .unwrap();

        assert_eq!(meta.size, total);
        let stored = storage.get_object("big.jpg").await.unwrap();
        assert_eq!(stored.bytes.len() as u64, total);
        assert!(stored.bytes.iter().all(|b| *b == 7));
        assert_eq!(stored.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_body_longer_than_declared_stops_early() {
        let storage = StorageClient::in_memory("images");
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let endless = stream::repeat_with(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"xxxx"))
        })
        .boxed();

        let err = storage
            .put_object("images", "long.jpg", endless, Some(6), "image/jpeg")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::SizeMismatch {
                declared: 6,
                actual: 8
            }
        ));
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
        assert!(!storage.exists("long.jpg").await.unwrap());
    }
}
