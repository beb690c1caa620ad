//! Process lifecycle: Running -> Draining -> Stopped

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Running,
    Draining,
    Stopped,
}

/// Coordinates the stop of the HTTP server and the dispatcher.
///
/// Both hold clones of [`token`](Self::token). Draining cancels it: the
/// server stops accepting connections and the dispatcher leaves its loop.
/// Tasks that were already spawned are never awaited.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    phase: watch::Sender<Phase>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Running);
        Self {
            token: CancellationToken::new(),
            phase,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Running -> Draining. Returns `false` if shutdown had already begun.
    pub fn begin_drain(&self) -> bool {
        let started = self.phase.send_if_modified(|phase| {
            if *phase == Phase::Running {
                *phase = Phase::Draining;
                true
            } else {
                false
            }
        });

        if started {
            info!("Draining: admission closed, dispatcher stopping");
            self.token.cancel();
        }
        started
    }

    /// Draining -> Stopped, once the dispatcher loop has exited
    pub fn finish(&self) {
        self.begin_drain();
        let stopped = self.phase.send_if_modified(|phase| {
            if *phase == Phase::Stopped {
                false
            } else {
                *phase = Phase::Stopped;
                true
            }
        });

        if stopped {
            info!("Stopped");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on SIGINT or SIGTERM
pub async fn signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
