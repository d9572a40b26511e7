//! Component wiring

use crate::Result;
use crate::server::{AppState, router};
use axum::Router;
use purgehook_config::AppConfig;
use purgehook_webhooks::{
    BunnyPurgeClient, CachePurgeHandler, ClientConfig, DesiredEventSet, EventDispatcher,
    EventHandler, GhostAdminClient, JsonFileStore, ReconcileReport, ReconciliationEngine,
    RegistrationTemplate, RemoteRegistry, SignatureVerifier, WebhookError,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Every long-lived component, built once from the configuration
pub struct App {
    pub engine: Arc<ReconciliationEngine>,
    pub dispatcher: EventDispatcher,
    pub verifier: Option<Arc<SignatureVerifier>>,
    pub desired: DesiredEventSet,
    pub template: RegistrationTemplate,
    pub enable_removal: bool,
}

impl App {
    /// Build the production components: Ghost registry, Bunny purge client.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = GhostAdminClient::new(
            &config.ghost.url,
            &config.ghost.admin_api_key,
            &ClientConfig::default(),
        )?;

        let purge_config = ClientConfig::builder()
            .timeout(config.cdn.purge_timeout)
            .build();
        let purger =
            BunnyPurgeClient::new(&config.cdn.purge_url, &config.cdn.api_key, &purge_config)?;
        let handler = CachePurgeHandler::new(config.cdn.base_url.clone(), Arc::new(purger))
            .with_timeout(config.cdn.purge_timeout);

        Ok(Self::with_components(
            Arc::new(registry),
            Arc::new(handler),
            config,
        ))
    }

    /// Build around explicit registry and handler implementations.
    pub fn with_components(
        registry: Arc<dyn RemoteRegistry>,
        handler: Arc<dyn EventHandler>,
        config: &AppConfig,
    ) -> Self {
        if config.ghost.secret_generated {
            warn!(
                "GHOST_WEBHOOK_SECRET is not set; using a generated secret that changes on every restart"
            );
        }
        if config.cdn.base_url.is_none() {
            warn!("CDN_BASE_URL is not set; every callback will fail until it is configured");
        }

        let verifier = if config.signature.verify {
            let verifier = SignatureVerifier::new(&config.ghost.webhook_secret);
            let verifier = match config.signature.tolerance {
                Some(tolerance) => verifier.with_tolerance(tolerance.as_secs()),
                None => verifier,
            };
            Some(Arc::new(verifier))
        } else {
            warn!(
                "Webhook signature verification is DISABLED; any caller can trigger cache purges"
            );
            None
        };

        let dispatcher = EventDispatcher::new();
        let engine = ReconciliationEngine::new(
            registry,
            JsonFileStore::new(&config.store_path),
            dispatcher.clone(),
            handler,
        );

        Self {
            engine: Arc::new(engine),
            dispatcher,
            verifier,
            desired: DesiredEventSet::new(config.ghost.events.iter().cloned()),
            template: RegistrationTemplate {
                secret: config.ghost.webhook_secret.clone(),
                target_url_template: config.target_url_template(),
                name_prefix: config.ghost.webhook_name.clone(),
            },
            enable_removal: config.enable_removal,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            dispatcher: self.dispatcher.clone(),
            verifier: self.verifier.clone(),
            engine: self.engine.clone(),
        }
    }

    pub fn router(&self) -> Router {
        router(self.state(), self.enable_removal)
    }

    /// Run the startup reconciliation pass.
    ///
    /// Never fatal: failed events are reported, and a failed save leaves the
    /// bindings made so far in place.
    pub async fn initialize(&self) -> std::result::Result<ReconcileReport, WebhookError> {
        info!(events = self.desired.len(), "Initializing webhooks");
        let result = self.engine.initialize(&self.desired, &self.template).await;

        match &result {
            Ok(report) if report.is_complete() => {}
            Ok(report) => warn!(
                failed = ?report.failed_events,
                "Some webhooks could not be registered"
            ),
            Err(e) => error!(error = %e, "Webhook initialization failed"),
        }
        result
    }
}
