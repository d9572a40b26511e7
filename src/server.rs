//! HTTP surface
//!
//! - `POST /webhook/<event-with-dashes>`: verify, then dispatch
//! - `DELETE /webhook/<event-with-dashes>`: remove one registration (opt-in)
//! - `GET /health`

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use purgehook_webhooks::{
    DispatchResponse, EventDispatcher, ReconciliationEngine, SignatureVerifier, WebhookError,
    event_from_path, headers::SIGNATURE,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: EventDispatcher,
    /// `None` when signature checking is disabled
    pub verifier: Option<Arc<SignatureVerifier>>,
    pub engine: Arc<ReconciliationEngine>,
}

/// Build the router. `DELETE` is only routed when `enable_removal` is set.
pub fn router(state: AppState, enable_removal: bool) -> Router {
    let event_route = if enable_removal {
        post(receive).delete(remove)
    } else {
        post(receive)
    };

    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(receive))
        .route("/webhook/", post(receive))
        .route("/webhook/{*event}", event_route)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn receive(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(verifier) = &state.verifier {
        let signature = headers.get(SIGNATURE).and_then(|v| v.to_str().ok());
        if let Err(e) = verifier.verify(&body, signature) {
            warn!(path = %uri.path(), reason = %e, "Rejected webhook signature");
            return (
                StatusCode::UNAUTHORIZED,
                Json(DispatchResponse::error("Invalid webhook signature")),
            )
                .into_response();
        }
    }

    let outcome = state.dispatcher.dispatch(uri.path(), &body).await;
    (outcome.status, Json(outcome.response)).into_response()
}

async fn remove(State(state): State<AppState>, Path(event): Path<String>) -> Response {
    let Some(event) = event_from_path(&event) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(DispatchResponse::error("Invalid Webhook Endpoint")),
        )
            .into_response();
    };

    match state.engine.remove(&event).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(WebhookError::NotTracked(_)) => (
            StatusCode::NOT_FOUND,
            Json(DispatchResponse::warning(format!(
                "No webhook registered for event: {}",
                event
            ))),
        )
            .into_response(),
        Err(e) => {
            error!(event = %event, error = %e, "Failed to remove webhook");
            let status = match e {
                WebhookError::Registry(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(DispatchResponse::error("Failed to remove webhook")),
            )
                .into_response()
        }
    }
}
