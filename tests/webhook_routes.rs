//! Router tests: signature gate, dispatch status mapping, removal and health.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use purgehook::App;
use purgehook::config::{AppConfig, EnvVars};
use purgehook::webhooks::{
    CachePurgeHandler, PurgeClient, PurgeError, RegistryError, RemoteRegistry, RemoteWebhook,
    WebhookDescriptor, WebhookSigner,
};

// =============================================================================
// Test Helpers
// =============================================================================

const SECRET: &str = "test-secret";

#[derive(Default)]
struct FakeRegistry {
    next_id: Mutex<u32>,
    fail_deletes: bool,
}

#[async_trait]
impl RemoteRegistry for FakeRegistry {
    async fn create(&self, _: &WebhookDescriptor) -> Result<String, RegistryError> {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        Ok(format!("remote-{}", next))
    }

    async fn update(&self, id: &str, _: &WebhookDescriptor) -> Result<String, RegistryError> {
        Ok(id.to_string())
    }

    async fn delete(&self, _: &str) -> Result<(), RegistryError> {
        if self.fail_deletes {
            return Err(RegistryError::Status {
                status: 500,
                body: "down".into(),
            });
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RemoteWebhook>, RegistryError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct RecordingPurger {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl PurgeClient for RecordingPurger {
    async fn purge(&self, url: &str) -> Result<(), PurgeError> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

struct Harness {
    router: Router,
    purger: Arc<RecordingPurger>,
    _dir: tempfile::TempDir,
}

async fn harness(extra: &[(&str, &str)], registry: FakeRegistry) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("webhooks.json");
    let store_path = store_path.to_string_lossy().to_string();

    let mut vars = vec![
        ("GHOST_ADMIN_API_KEY", "6489a1b2:0a1b2c3d"),
        ("GHOST_WEBHOOK_TARGET", "https://hooks.example.com"),
        ("GHOST_WEBHOOK_SECRET", SECRET),
        ("GHOST_WEBHOOK_EVENTS", "post.published,page.published"),
        ("BUNNY_API_KEY", "bunny-key"),
        ("CDN_BASE_URL", "https://example.com"),
        ("WEBHOOK_STORE_PATH", store_path.as_str()),
    ];
    vars.extend_from_slice(extra);
    let config = AppConfig::from_vars(&EnvVars::from_pairs(vars)).unwrap();

    let purger = Arc::new(RecordingPurger::default());
    let handler = CachePurgeHandler::new(config.cdn.base_url.clone(), purger.clone());
    let app = App::with_components(Arc::new(registry), Arc::new(handler), &config);
    app.initialize().await.unwrap();

    Harness {
        router: app.router(),
        purger,
        _dir: dir,
    }
}

fn signed_post(uri: &str, body: &Value) -> Request<Body> {
    let signature = WebhookSigner::new(SECRET).sign(body);
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-ghost-signature", signature)
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn unsigned_post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_payload(slug: &str) -> Value {
    json!({"post": {"current": {"slug": slug, "status": "published"}, "previous": {}}})
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn test_signed_callback_purges() {
    let h = harness(&[], FakeRegistry::default()).await;

    let (status, body) = send(
        &h.router,
        signed_post("/webhook/post-published", &post_payload("cdn-tester")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Status"], "Success");

    let mut calls = h.purger.calls.lock().unwrap().clone();
    calls.sort();
    assert_eq!(
        calls,
        vec!["https://example.com", "https://example.com/cdn-tester*"]
    );
}

#[tokio::test]
async fn test_unbound_event_is_warning() {
    let h = harness(&[], FakeRegistry::default()).await;

    let (status, body) = send(
        &h.router,
        signed_post("/webhook/post-deleted", &post_payload("x")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Status"], "Warning");
    assert!(h.purger.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_event_segment() {
    let h = harness(&[], FakeRegistry::default()).await;

    for uri in ["/webhook/", "/webhook"] {
        let (status, body) = send(&h.router, signed_post(uri, &post_payload("x"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(
            body,
            json!({"Status": "Error", "Message": "Invalid Webhook Endpoint"})
        );
    }
}

#[tokio::test]
async fn test_payload_without_slug_is_500() {
    let h = harness(&[], FakeRegistry::default()).await;

    let (status, body) = send(
        &h.router,
        signed_post("/webhook/post-published", &json!({"post": {"current": {}}})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["Status"], "Error");
    assert!(!body["Message"].as_str().unwrap().contains("URL"));
}

#[tokio::test]
async fn test_non_object_body_is_400() {
    let h = harness(&[], FakeRegistry::default()).await;

    let (status, _) = send(&h.router, signed_post("/webhook/post-published", &json!([1, 2]))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.purger.calls.lock().unwrap().is_empty());
}

// =============================================================================
// Signature Gate
// =============================================================================

#[tokio::test]
async fn test_missing_signature_is_401() {
    let h = harness(&[], FakeRegistry::default()).await;

    let (status, body) = send(
        &h.router,
        unsigned_post("/webhook/post-published", &post_payload("x")),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body,
        json!({"Status": "Error", "Message": "Invalid webhook signature"})
    );
    assert!(h.purger.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_secret_is_401() {
    let h = harness(&[], FakeRegistry::default()).await;

    let body = post_payload("x");
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/post-published")
        .header("x-ghost-signature", WebhookSigner::new("other").sign(&body))
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verification_can_be_disabled() {
    let h = harness(
        &[("WEBHOOK_VERIFY_SIGNATURE", "false")],
        FakeRegistry::default(),
    )
    .await;

    let (status, _) = send(
        &h.router,
        unsigned_post("/webhook/page-published", &json!({"page": {"current": {"slug": "about"}}})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(
        h.purger
            .calls
            .lock()
            .unwrap()
            .contains(&"https://example.com/about*".to_string())
    );
}

// =============================================================================
// Removal and Health
// =============================================================================

#[tokio::test]
async fn test_removal_disabled_by_default() {
    let h = harness(&[], FakeRegistry::default()).await;

    let (status, _) = send(&h.router, delete("/webhook/post-published")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_removal() {
    let h = harness(&[("WEBHOOK_ENABLE_REMOVAL", "true")], FakeRegistry::default()).await;

    let (status, _) = send(&h.router, delete("/webhook/post-published")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&h.router, delete("/webhook/post-published")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The event is no longer dispatchable
    let (status, body) = send(
        &h.router,
        signed_post("/webhook/post-published", &post_payload("x")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["Status"], "Warning");
}

#[tokio::test]
async fn test_removal_registry_failure_is_502() {
    let registry = FakeRegistry {
        fail_deletes: true,
        ..Default::default()
    };
    let h = harness(&[("WEBHOOK_ENABLE_REMOVAL", "true")], registry).await;

    let (status, _) = send(&h.router, delete("/webhook/page-published")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_health() {
    let h = harness(&[], FakeRegistry::default()).await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&h.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}
