//! Remote webhook registry
//!
//! [`RemoteRegistry`] is the capability reconciliation runs against;
//! [`GhostAdminClient`] implements it over the Ghost Admin API.

use crate::{AdminApiKey, ClientConfig, RegistryError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Admin API version requested on every call
pub const ACCEPT_VERSION: &str = "v5.0";

/// Desired registration for one event.
///
/// Fully determined by configuration, so it is rebuilt on every pass rather
/// than persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookDescriptor {
    pub event: String,
    pub target_url: String,
    pub secret: String,
    pub name: String,
}

impl WebhookDescriptor {
    /// Build the descriptor for `event`.
    ///
    /// `{event}` in the template is replaced by the event name with dots
    /// turned into dashes, matching the inbound route.
    pub fn for_event(event: &str, target_template: &str, secret: &str, name_prefix: &str) -> Self {
        Self {
            event: event.to_string(),
            target_url: target_template.replace("{event}", &event.replace('.', "-")),
            secret: secret.to_string(),
            name: format!("{} {}", name_prefix, event),
        }
    }
}

/// A registration as reported by the remote side
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteWebhook {
    pub id: String,

    #[serde(default)]
    pub event: String,

    #[serde(default)]
    pub target_url: String,

    #[serde(default)]
    pub name: Option<String>,
}

/// Remote registry operations
#[async_trait]
pub trait RemoteRegistry: Send + Sync {
    /// Register a new webhook, returning its remote id
    async fn create(&self, webhook: &WebhookDescriptor) -> Result<String, RegistryError>;

    /// Overwrite an existing registration, returning the (possibly new) id
    async fn update(
        &self,
        remote_id: &str,
        webhook: &WebhookDescriptor,
    ) -> Result<String, RegistryError>;

    /// Remove a registration; an already missing one counts as removed
    async fn delete(&self, remote_id: &str) -> Result<(), RegistryError>;

    async fn list(&self) -> Result<Vec<RemoteWebhook>, RegistryError>;
}

#[derive(Serialize)]
struct Outgoing<'a> {
    webhooks: [&'a WebhookDescriptor; 1],
}

#[derive(Deserialize)]
struct Incoming {
    #[serde(default)]
    webhooks: Vec<RemoteWebhook>,
}

/// Ghost Admin API client
#[derive(Debug, Clone)]
pub struct GhostAdminClient {
    base: Url,
    key: AdminApiKey,
    http_client: Client,
    token_ttl: Duration,
}

impl GhostAdminClient {
    /// Create a client for the site at `site_url`
    pub fn new(
        site_url: &str,
        admin_api_key: &str,
        config: &ClientConfig,
    ) -> Result<Self, RegistryError> {
        let base = Url::parse(&format!(
            "{}/ghost/api/admin/",
            site_url.trim_end_matches('/')
        ))?;

        Ok(Self {
            base,
            key: AdminApiKey::parse(admin_api_key)?,
            http_client: config.http_client()?,
            token_ttl: config.token_ttl,
        })
    }

    fn collection_url(&self) -> Result<Url, RegistryError> {
        Ok(self.base.join("webhooks/")?)
    }

    fn item_url(&self, remote_id: &str) -> Result<Url, RegistryError> {
        Ok(self.base.join(&format!("webhooks/{}/", remote_id))?)
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, RegistryError> {
        let token = self.key.token(self.token_ttl)?;
        Ok(request
            .header(AUTHORIZATION, format!("Ghost {}", token))
            .header(ACCEPT, "application/json")
            .header("Accept-Version", ACCEPT_VERSION))
    }
}

#[async_trait]
impl RemoteRegistry for GhostAdminClient {
    async fn create(&self, webhook: &WebhookDescriptor) -> Result<String, RegistryError> {
        let url = self.collection_url()?;
        debug!(event = %webhook.event, url = %url, "Creating remote webhook");

        let request = self
            .http_client
            .post(url)
            .json(&Outgoing { webhooks: [webhook] });
        let response = self.authorize(request)?.send().await?;

        first_webhook(response).await.map(|w| w.id)
    }

    async fn update(
        &self,
        remote_id: &str,
        webhook: &WebhookDescriptor,
    ) -> Result<String, RegistryError> {
        let url = self.item_url(remote_id)?;
        debug!(event = %webhook.event, remote_id, "Updating remote webhook");

        let request = self
            .http_client
            .put(url)
            .json(&Outgoing { webhooks: [webhook] });
        let response = self.authorize(request)?.send().await?;

        first_webhook(response).await.map(|w| w.id)
    }

    async fn delete(&self, remote_id: &str) -> Result<(), RegistryError> {
        let url = self.item_url(remote_id)?;
        debug!(remote_id, "Deleting remote webhook");

        let response = self
            .authorize(self.http_client.delete(url))?
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(remote_id, "Remote webhook already gone");
            return Ok(());
        }
        ensure_success(response).await.map(|_| ())
    }

    async fn list(&self) -> Result<Vec<RemoteWebhook>, RegistryError> {
        let url = self.collection_url()?;
        let response = self.authorize(self.http_client.get(url))?.send().await?;
        let response = ensure_success(response).await?;

        let body: Incoming = response
            .json()
            .await
            .map_err(|e| RegistryError::MalformedResponse(e.to_string()))?;
        Ok(body.webhooks)
    }
}

async fn ensure_success(response: Response) -> Result<Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(RegistryError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn first_webhook(response: Response) -> Result<RemoteWebhook, RegistryError> {
    let response = ensure_success(response).await?;
    let body: Incoming = response
        .json()
        .await
        .map_err(|e| RegistryError::MalformedResponse(e.to_string()))?;

    body.webhooks
        .into_iter()
        .next()
        .filter(|w| !w.id.is_empty())
        .ok_or_else(|| {
            RegistryError::MalformedResponse("response carried no webhook id".to_string())
        })
}
