//! Signal handling and bounded teardown
//!
//! On SIGINT or SIGTERM the listener stops accepting traffic, then remote
//! registrations are deleted. One deadline, started when the signal arrives,
//! bounds both the connection drain and the teardown. Work still running when
//! it fires is abandoned, not cancelled cleanly.

use purgehook_webhooks::{ReconcileReport, ReconciliationEngine, WebhookError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{error, info, warn};

/// Shutdown grace period whose clock starts on the first signal
#[derive(Debug, Clone)]
pub struct ShutdownDeadline {
    grace: Duration,
    started: Arc<watch::Sender<Option<Instant>>>,
}

impl ShutdownDeadline {
    pub fn new(grace: Duration) -> Self {
        let (started, _) = watch::channel(None);
        Self {
            grace,
            started: Arc::new(started),
        }
    }

    /// Start the clock. Later calls keep the first start time.
    pub fn start(&self) {
        self.started.send_if_modified(|started| {
            if started.is_some() {
                return false;
            }
            *started = Some(Instant::now());
            true
        });
    }

    pub fn is_started(&self) -> bool {
        self.started.borrow().is_some()
    }

    /// Wait for `signal`, then start the clock.
    pub async fn on_signal<F>(self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.start();
    }

    /// Time left before the deadline; the full grace period if not started.
    pub fn remaining(&self) -> Duration {
        match *self.started.borrow() {
            Some(at) => (at + self.grace).saturating_duration_since(Instant::now()),
            None => self.grace,
        }
    }

    /// Resolves once the clock has been started and has run out.
    pub async fn expired(&self) {
        let mut started = self.started.subscribe();
        let at = match started.wait_for(Option::is_some).await {
            Ok(at) => *at,
            Err(_) => None,
        };
        match at {
            Some(at) => sleep_until(at + self.grace).await,
            None => std::future::pending().await,
        }
    }
}

/// Drive `server` until it finishes draining, or give up when `deadline`
/// runs out. `None` means connections were still open at the deadline.
pub async fn drain<F, T>(server: F, deadline: &ShutdownDeadline) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        out = server => Some(out),
        _ = deadline.expired() => {
            error!("Connections still open at shutdown deadline");
            None
        }
    }
}

/// How teardown ended
#[derive(Debug)]
pub enum TeardownOutcome {
    /// Pass finished; the report may still list failed deletions
    Completed(ReconcileReport),
    /// Pass could not persist the mapping
    Failed(WebhookError),
    /// Deadline reached before the pass finished
    TimedOut(Duration),
}

impl TeardownOutcome {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Delete every tracked registration, giving up after `deadline`.
pub async fn teardown(engine: &ReconciliationEngine, deadline: Duration) -> TeardownOutcome {
    info!(deadline = ?deadline, "Tearing down webhooks");

    match timeout(deadline, engine.deinitialize()).await {
        Ok(Ok(report)) => {
            if !report.is_complete() {
                warn!(failed = ?report.failed_events, "Some webhooks could not be deleted");
            }
            TeardownOutcome::Completed(report)
        }
        Ok(Err(e)) => {
            error!(error = %e, "Webhook teardown failed");
            TeardownOutcome::Failed(e)
        }
        Err(_) => {
            error!(deadline = ?deadline, "Webhook teardown timed out");
            TeardownOutcome::TimedOut(deadline)
        }
    }
}
