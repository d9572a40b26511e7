//! Routing of verified callbacks to in-process handlers

use crate::{CallbackPayload, DispatchResponse, HandlerError};
use async_trait::async_trait;
use http::StatusCode;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Route prefix under which callbacks arrive
pub const WEBHOOK_ROUTE: &str = "/webhook";

/// Message returned when handling fails; details stay in the logs
const GENERIC_FAILURE: &str = "Webhook processing failed";

/// A handler bound to one or more events
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        event: &str,
        payload: &CallbackPayload,
    ) -> Result<DispatchResponse, HandlerError>;
}

/// Why a callback never produced a handler response
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchRejection {
    #[error("no event in path '{0}'")]
    NoEvent(String),

    #[error("body is not a JSON object")]
    InvalidBody,

    #[error("no handler bound for event '{0}'")]
    Unregistered(String),

    #[error("handler for '{event}' failed: {source}")]
    HandlerFailed {
        event: String,
        #[source]
        source: HandlerError,
    },
}

impl DispatchRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::HandlerFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Caller-facing body; never carries handler error detail
    pub fn response(&self) -> DispatchResponse {
        match self {
            Self::NoEvent(_) => DispatchResponse::error("Invalid Webhook Endpoint"),
            Self::InvalidBody => DispatchResponse::error("Invalid webhook payload"),
            Self::Unregistered(event) => {
                DispatchResponse::warning(format!("No webhook registered for event: {}", event))
            }
            Self::HandlerFailed { .. } => DispatchResponse::error(GENERIC_FAILURE),
        }
    }
}

/// Result of dispatching one callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub status: StatusCode,
    pub response: DispatchResponse,
    pub rejection: Option<DispatchRejection>,
}

impl DispatchOutcome {
    fn handled(response: DispatchResponse) -> Self {
        let status = if response.is_success() {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        };
        Self {
            status,
            response,
            rejection: None,
        }
    }

    fn rejected(rejection: DispatchRejection) -> Self {
        Self {
            status: rejection.status(),
            response: rejection.response(),
            rejection: Some(rejection),
        }
    }
}

/// Event name → handler table.
///
/// Cloning shares the table, so the reconciliation engine and the HTTP
/// layer see the same bindings.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn EventHandler>>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `event`, replacing any previous binding
    pub fn bind(&self, event: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event = event.into();
        debug!(event = %event, "Binding handler");
        self.handlers.write().insert(event, handler);
    }

    pub fn unbind(&self, event: &str) -> bool {
        self.handlers.write().remove(event).is_some()
    }

    pub fn is_bound(&self, event: &str) -> bool {
        self.handlers.read().contains_key(event)
    }

    /// Bound event names, sorted
    pub fn bound_events(&self) -> Vec<String> {
        let mut events: Vec<String> = self.handlers.read().keys().cloned().collect();
        events.sort();
        events
    }

    /// Dispatch a callback received at `path` with a raw JSON `body`.
    pub async fn dispatch(&self, path: &str, body: &[u8]) -> DispatchOutcome {
        let Some(event) = event_from_path(path) else {
            return reject(DispatchRejection::NoEvent(path.to_string()));
        };

        let value: serde_json::Value = match serde_json::from_slice(body) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            _ => return reject(DispatchRejection::InvalidBody),
        };

        // Clone out of the table so the lock is not held across the await
        let handler = self.handlers.read().get(&event).cloned();
        let Some(handler) = handler else {
            return reject(DispatchRejection::Unregistered(event));
        };

        let payload = CallbackPayload::from_value(&value);
        info!(event = %event, kind = payload.kind(), "Dispatching webhook");

        match handler.handle(&event, &payload).await {
            Ok(response) => DispatchOutcome::handled(response),
            Err(source) => reject(DispatchRejection::HandlerFailed { event, source }),
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("events", &self.bound_events())
            .finish()
    }
}

fn reject(rejection: DispatchRejection) -> DispatchOutcome {
    match &rejection {
        DispatchRejection::HandlerFailed { .. } => {
            error!(error = %rejection, "Webhook handler failed")
        }
        _ => warn!(reason = %rejection, "Webhook rejected"),
    }
    DispatchOutcome::rejected(rejection)
}

/// Event name from the trailing path segment, dashes mapped to dots.
///
/// The `/webhook` route prefix is not an event. Segments with characters
/// outside `[a-z0-9_-]` are rejected.
pub fn event_from_path(path: &str) -> Option<String> {
    let rest = match path.strip_prefix(WEBHOOK_ROUTE) {
        // `/webhooks/...` and friends
        Some(rest) if !rest.is_empty() && !rest.starts_with('/') => return None,
        Some(rest) => rest,
        // Bare segment, as captured by the router
        None => path,
    };

    let segment = rest.split('/').rev().find(|s| !s.is_empty())?;
    let valid = segment
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if !valid {
        return None;
    }

    Some(segment.replace('-', "."))
}
