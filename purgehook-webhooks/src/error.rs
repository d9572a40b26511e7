//! Error types for webhook operations

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from inbound signature verification.
///
/// Every variant rejects the request; they are kept distinct for logging.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Signature header missing or blank
    #[error("Signature missing from request")]
    MissingHeader,

    /// Request body missing or blank
    #[error("Request body missing")]
    MissingBody,

    /// Header present but not `t=<ts>,v1=<hex>`
    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),

    /// Body is not JSON and cannot be canonicalized
    #[error("Request body is not valid JSON")]
    MalformedBody,

    /// Signed timestamp is older than the configured tolerance
    #[error("Timestamp outside tolerance: {age} seconds (tolerance: {tolerance} seconds)")]
    TimestampOutOfTolerance { age: u64, tolerance: u64 },

    /// Provided digest has the wrong length
    #[error("Signature length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Provided digest does not match
    #[error("Signature mismatch")]
    Mismatch,
}

/// Errors from the remote webhook registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Registry answered with a non-success status
    #[error("Registry returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Registry answered 2xx with an unusable body
    #[error("Malformed registry response: {0}")]
    MalformedResponse(String),

    /// Admin credential could not be turned into a token
    #[error("Invalid admin credential: {0}")]
    Credential(String),

    /// Configured endpoint is not a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors writing the persisted id mapping.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize id mapping: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from a single CDN purge call.
///
/// All variants are handled identically (logged, swallowed); they differ
/// only so the log says what went wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PurgeError {
    #[error("Purge timed out after {0:?}")]
    Timeout(Duration),

    #[error("Purge rejected: unauthorized (status {0})")]
    Unauthorized(u16),

    #[error("Purge failed: server error (status {0})")]
    Server(u16),

    #[error("Purge rejected with status {0}")]
    Rejected(u16),

    #[error("Purge transport error: {0}")]
    Transport(String),

    #[error("Invalid purge endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Errors raised by a bound event handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Required setting missing for this handler
    #[error("Handler misconfigured: {0}")]
    Configuration(String),

    /// Payload carried no resource to act on
    #[error("no valid URL found in payload")]
    NoResourceUrl,

    #[error("Handler failed: {0}")]
    Internal(String),
}

/// Errors surfaced by reconciliation passes.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Id mapping could not be persisted; fails the whole pass
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Event has no persisted registration
    #[error("Event is not tracked: {0}")]
    NotTracked(String),
}
