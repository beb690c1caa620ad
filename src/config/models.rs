use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

/// HTTP admission server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Upper bound on an admission request body
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Time in-flight requests get to finish once shutdown starts
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_payload_bytes: default_max_payload_bytes(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_payload_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

fn default_shutdown_grace_secs() -> u64 {
    20
}

/// Admission queue and outbound fetch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Deadline applied to every outbound fetch
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Skip TLS certificate verification on outbound fetches
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl WorkerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            accept_invalid_certs: false,
        }
    }
}

fn default_queue_capacity() -> usize {
    crate::queue::DEFAULT_CAPACITY
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36".to_string()
}

fn default_accept_language() -> String {
    "zh-CN,zh;q=0.9".to_string()
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    #[default]
    Memory,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    pub endpoint: Option<String>,
    /// S3 access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// S3 secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
    pub region: Option<String>,
    /// Permit plain-http endpoints (local MinIO and friends)
    #[serde(default)]
    pub allow_http: bool,
    #[serde(default = "default_storage_timeout_secs")]
    pub timeout_secs: u64,
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Memory,
            bucket: default_bucket(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            region: None,
            allow_http: false,
            timeout_secs: default_storage_timeout_secs(),
        }
    }
}

fn default_bucket() -> String {
    "picbox".to_string()
}

fn default_storage_timeout_secs() -> u64 {
    20
}

/// Where posts are looked up and media downloaded from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Post lookup endpoint, `{id}` is replaced with the post id
    #[serde(default = "default_lookup_url_template")]
    pub lookup_url_template: String,
    /// Full-size media location, `{id}` is replaced with the media id
    #[serde(default = "default_media_url_template")]
    pub media_url_template: String,
    /// Initial session cookie, replaceable at runtime through the API
    #[serde(default)]
    pub cookie: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            lookup_url_template: default_lookup_url_template(),
            media_url_template: default_media_url_template(),
            cookie: String::new(),
        }
    }
}

fn default_lookup_url_template() -> String {
    "https://weibo.com/ajax/statuses/show?id={id}".to_string()
}

fn default_media_url_template() -> String {
    "https://lz.sinaimg.cn/oslarge/{id}.jpg".to_string()
}
