//! Webhook lifecycle and cache purging for purgehook
//!
//! This crate holds everything between the HTTP listener and the outside
//! world:
//!
//! - **Reconciliation**: converge the remote platform's webhook registrations
//!   to a desired event set, keeping remote ids across restarts
//! - **Signature Verification**: HMAC-SHA256 over the canonical body and
//!   timestamp, compared in constant time
//! - **Dispatch**: route a verified callback to the handler bound to its
//!   event and build the `{"Status", "Message"}` response
//! - **Cache Purging**: derive resource URLs from callbacks and purge them
//!   from the CDN, best effort
//!
//! # Example: Verifying a Callback
//!
//! ```rust
//! use purgehook_webhooks::{SignatureVerifier, WebhookSigner};
//!
//! let body = serde_json::json!({"post": {"current": {"slug": "hello"}}});
//! let header = WebhookSigner::new("secret").sign_with_timestamp(&body, 1_700_000_000);
//!
//! let raw = serde_json::to_vec(&body).unwrap();
//! assert!(SignatureVerifier::new("secret").verify(&raw, Some(&header)).is_ok());
//! ```
//!
//! # Example: Reconciling
//!
//! ```rust,no_run
//! use purgehook_webhooks::{
//!     BunnyPurgeClient, CachePurgeHandler, ClientConfig, DesiredEventSet, EventDispatcher,
//!     GhostAdminClient, JsonFileStore, ReconciliationEngine, RegistrationTemplate,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let registry = Arc::new(GhostAdminClient::new("https://blog.example.com", "id:0a1b", &config)?);
//! let purger = Arc::new(BunnyPurgeClient::new("https://api.bunny.net/purge", "key", &config)?);
//! let handler = Arc::new(CachePurgeHandler::new(Some("https://example.com".into()), purger));
//!
//! let engine = ReconciliationEngine::new(
//!     registry,
//!     JsonFileStore::new("data/webhooks.json"),
//!     EventDispatcher::new(),
//!     handler,
//! );
//! let template = RegistrationTemplate {
//!     secret: "secret".into(),
//!     target_url_template: "https://hooks.example.com/webhook/{event}".into(),
//!     name_prefix: "purgehook".into(),
//! };
//! let report = engine
//!     .initialize(&DesiredEventSet::new(["post.published"]), &template)
//!     .await?;
//! println!("{} registered", report.success_count);
//! # Ok(())
//! # }
//! ```

mod admin_key;
mod config;
mod dispatcher;
mod error;
mod payload;
mod purge;
mod reconcile;
mod registry;
mod signature;
pub mod store;

pub use admin_key::{ADMIN_AUDIENCE, AdminApiKey, AdminClaims};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use dispatcher::{
    DispatchOutcome, DispatchRejection, EventDispatcher, EventHandler, WEBHOOK_ROUTE,
    event_from_path,
};
pub use error::{
    HandlerError, PersistenceError, PurgeError, RegistryError, SignatureError, WebhookError,
};
pub use payload::{
    CallbackPayload, DispatchResponse, ResourceSnapshot, ResourceState, ResponseStatus,
};
pub use purge::{
    BunnyPurgeClient, CachePurgeHandler, DEFAULT_PURGE_TIMEOUT, PurgeClient, PurgeOutcome,
    PurgeReport,
};
pub use reconcile::{DesiredEventSet, ReconcileReport, ReconciliationEngine, RegistrationTemplate};
pub use registry::{
    ACCEPT_VERSION, GhostAdminClient, RemoteRegistry, RemoteWebhook, WebhookDescriptor,
};
pub use signature::{SignatureVerifier, WebhookSigner, headers};
pub use store::{IdMap, JsonFileStore};

/// Result type for reconciliation passes
pub type Result<T> = std::result::Result<T, WebhookError>;

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CachePurgeHandler, DesiredEventSet, EventDispatcher, EventHandler, JsonFileStore,
        ReconciliationEngine, RegistrationTemplate, RemoteRegistry, SignatureVerifier,
    };
}
