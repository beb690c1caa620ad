//! Process-wide settings shared by the admission layer and worker tasks.
//!
//! Everything except the session cookie is fixed after startup. The cookie
//! can be replaced by an admission request at any time and must be read
//! fresh before every outbound fetch.

use std::net::SocketAddr;

use tokio::sync::RwLock;
use tracing::info;

use crate::config::Config;

/// Snapshot of the settings record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: String,
    pub bind_addr: SocketAddr,
    pub cookie: String,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: config.storage.endpoint.clone(),
            access_key: config.storage.access_key.clone(),
            secret_key: config.storage.secret_key.clone(),
            bucket: config.storage.bucket.clone(),
            bind_addr: config.server.bind_addr,
            cookie: config.source.cookie.clone(),
        }
    }
}

/// Settings record guarded by a reader/writer lock.
///
/// tokio's `RwLock` is write-preferring, so a steady stream of readers
/// cannot starve `update_secret`.
#[derive(Debug)]
pub struct SettingsStore {
    inner: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Clone of the current record
    pub async fn read(&self) -> Settings {
        self.inner.read().await.clone()
    }

    /// Current cookie value
    pub async fn cookie(&self) -> String {
        self.inner.read().await.cookie.clone()
    }

    /// Replace the cookie; exclusive with all readers
    pub async fn update_secret(&self, cookie: impl Into<String>) {
        let cookie = cookie.into();
        let mut guard = self.inner.write().await;
        guard.cookie = cookie;
        info!(len = guard.cookie.len(), "Session cookie updated");
    }
}

impl From<&Config> for SettingsStore {
    fn from(config: &Config) -> Self {
        Self::new(Settings::from(config))
    }
}
