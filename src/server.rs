//! Process wiring: HTTP admission, dispatcher and shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tracing::{error, info, warn};

use crate::api::{self, state::AppState};
use crate::config::{Config, ConfigError};
use crate::observability::Metrics;
use crate::queue::{AdmissionQueue, JobReceiver};
use crate::resolver::{Resolver, StatusLookupResolver};
use crate::settings::SettingsStore;
use crate::shutdown::{self, ShutdownCoordinator};
use crate::storage::{ObjectStoreClient, StorageClient, StorageError};
use crate::worker::{BrowserHeaders, Dispatcher, FetchError, Fetcher, HttpClient, HttpConfig, TaskContext};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] FetchError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Task join error: {0}")]
    Join(#[from] JoinError),

    #[error("HTTP server did not stop within {0:?}")]
    GraceExceeded(Duration),
}

/// Outbound collaborators of the pipeline
pub struct Services {
    pub fetcher: Arc<dyn Fetcher>,
    pub storage: Arc<dyn ObjectStoreClient>,
    pub resolver: Arc<dyn Resolver>,
}

impl Services {
    /// reqwest client, configured storage backend and status lookup resolver
    pub fn from_config(config: &Config, settings: Arc<SettingsStore>) -> Result<Self, ServerError> {
        let client = HttpClient::new(HttpConfig::from(&config.worker))?;
        let storage = StorageClient::from_config(&config.storage)?;
        let resolver = StatusLookupResolver::new(
            client.clone(),
            settings,
            BrowserHeaders::from(&config.worker),
            config.source.lookup_url_template.clone(),
        );

        Ok(Self {
            fetcher: Arc::new(client),
            storage: Arc::new(storage),
            resolver: Arc::new(resolver),
        })
    }
}

/// A bound, not yet running, picbox process
pub struct Server {
    listener: TcpListener,
    state: AppState,
    dispatcher: Dispatcher,
    jobs: JobReceiver,
    grace: Duration,
}

impl Server {
    /// Bind the configured address with the production collaborators
    pub async fn bind(config: &Config) -> Result<Self, ServerError> {
        let settings = Arc::new(SettingsStore::from(config));
        let services = Services::from_config(config, settings.clone())?;
        Self::bind_with(config, settings, services).await
    }

    pub async fn bind_with(
        config: &Config,
        settings: Arc<SettingsStore>,
        services: Services,
    ) -> Result<Self, ServerError> {
        let addr = config.server.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let (queue, jobs) = AdmissionQueue::new(config.worker.queue_capacity);
        let metrics = Arc::new(Metrics::new());

        let ctx = TaskContext {
            settings: settings.clone(),
            fetcher: services.fetcher,
            storage: services.storage,
            headers: BrowserHeaders::from(&config.worker),
        };
        let dispatcher = Dispatcher::new(ctx, metrics.clone());

        let state = AppState {
            settings,
            queue,
            resolver: services.resolver,
            coordinator: Arc::new(ShutdownCoordinator::new()),
            metrics,
            media_url_template: Arc::from(config.source.media_url_template.as_str()),
            max_payload_bytes: config.server.max_payload_bytes,
        };

        Ok(Self {
            listener,
            state,
            dispatcher,
            jobs,
            grace: config.server.shutdown_grace(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        self.state.coordinator.clone()
    }

    /// Serve until `signal` resolves or the HTTP server exits on its own.
    ///
    /// Shutdown cancels the coordinator token: the HTTP server stops taking
    /// new connections and gets `grace` to finish open ones, the dispatcher
    /// leaves its loop. Tasks already spawned are left running.
    pub async fn run_until<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            listener,
            state,
            dispatcher,
            jobs,
            grace,
        } = self;

        let coordinator = state.coordinator.clone();
        let token = coordinator.token();

        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "picbox listening");
        }

        let dispatcher = tokio::spawn(dispatcher.run(jobs, token.clone()));

        let app = api::router(state);
        let http_token = token.clone();
        let mut http = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async move { http_token.cancelled().await })
                .await
        });

        let http_result = tokio::select! {
            result = &mut http => {
                warn!("HTTP server exited before shutdown was requested");
                coordinator.begin_drain();
                Some(result)
            }
            _ = signal => {
                coordinator.begin_drain();
                None
            }
        };

        let http_result = match http_result {
            Some(result) => result,
            None => match tokio::time::timeout(grace, &mut http).await {
                Ok(result) => result,
                Err(_) => {
                    error!(?grace, "HTTP server did not stop in time, aborting");
                    http.abort();
                    dispatcher.await?;
                    coordinator.finish();
                    return Err(ServerError::GraceExceeded(grace));
                }
            },
        };

        dispatcher.await?;
        coordinator.finish();

        http_result?.map_err(ServerError::Serve)
    }
}

/// Run until SIGINT or SIGTERM
pub async fn run(config: Config) -> Result<(), ServerError> {
    Server::bind(&config)
        .await?
        .run_until(shutdown::signal())
        .await
}
