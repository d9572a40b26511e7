//! CDN cache purging
//!
//! [`CachePurgeHandler`] is bound to every subscribed event. It derives the
//! resource URL from the callback and purges it together with the site root.
//! Purging is best effort: outcomes are reported in a [`PurgeReport`] and
//! logged, never turned into handler errors.

use crate::{
    CallbackPayload, ClientConfig, DispatchResponse, EventHandler, HandlerError, PurgeError,
};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

/// Default bound on a single purge call
pub const DEFAULT_PURGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Purge API capability
#[async_trait]
pub trait PurgeClient: Send + Sync {
    async fn purge(&self, url: &str) -> Result<(), PurgeError>;
}

/// Bunny CDN purge API client
#[derive(Debug, Clone)]
pub struct BunnyPurgeClient {
    endpoint: Url,
    api_key: String,
    http_client: Client,
    timeout: Duration,
}

impl BunnyPurgeClient {
    pub fn new(
        purge_url: &str,
        api_key: impl Into<String>,
        config: &ClientConfig,
    ) -> Result<Self, PurgeError> {
        let endpoint =
            Url::parse(purge_url).map_err(|e| PurgeError::InvalidEndpoint(e.to_string()))?;
        let http_client = config
            .http_client()
            .map_err(|e| PurgeError::Transport(e.to_string()))?;

        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            http_client,
            timeout: config.timeout,
        })
    }

    fn request_url(&self, url: &str) -> Url {
        let mut endpoint = self.endpoint.clone();
        endpoint
            .query_pairs_mut()
            .append_pair("url", url)
            .append_pair("async", "false");
        endpoint
    }
}

#[async_trait]
impl PurgeClient for BunnyPurgeClient {
    async fn purge(&self, url: &str) -> Result<(), PurgeError> {
        let response = self
            .http_client
            .post(self.request_url(url))
            .header("AccessKey", &self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PurgeError::Timeout(self.timeout)
                } else {
                    PurgeError::Transport(e.to_string())
                }
            })?;

        classify_status(response.status())
    }
}

fn classify_status(status: StatusCode) -> Result<(), PurgeError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(PurgeError::Unauthorized(status.as_u16()))
        }
        s if s.is_server_error() => Err(PurgeError::Server(s.as_u16())),
        s => Err(PurgeError::Rejected(s.as_u16())),
    }
}

/// Outcome of one purge call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub url: String,
    pub result: Result<(), PurgeError>,
}

/// Outcomes of the purges issued for one callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub outcomes: Vec<PurgeOutcome>,
}

impl PurgeReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PurgeOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// Handler purging the CDN for the resource a callback describes
pub struct CachePurgeHandler {
    cdn_base_url: Option<String>,
    client: Arc<dyn PurgeClient>,
    timeout: Duration,
}

impl CachePurgeHandler {
    pub fn new(cdn_base_url: Option<String>, client: Arc<dyn PurgeClient>) -> Self {
        Self {
            cdn_base_url: cdn_base_url.map(|u| u.trim_end_matches('/').to_string()),
            client,
            timeout: DEFAULT_PURGE_TIMEOUT,
        }
    }

    /// Bound each purge call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The wildcarded resource URL and the bare base URL.
    pub fn purge_targets(&self, payload: &CallbackPayload) -> Result<[String; 2], HandlerError> {
        let base = self
            .cdn_base_url
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| HandlerError::Configuration("CDN base URL is not set".to_string()))?;
        let slug = payload.slug().ok_or(HandlerError::NoResourceUrl)?;

        Ok([
            format!("{}/{}*", base, slug.trim_matches('/')),
            base.to_string(),
        ])
    }

    /// Issue both purges concurrently, each under its own timeout.
    pub async fn purge(&self, payload: &CallbackPayload) -> Result<PurgeReport, HandlerError> {
        let [resource, base] = self.purge_targets(payload)?;

        let (resource_result, base_result) =
            tokio::join!(self.purge_one(&resource), self.purge_one(&base));

        Ok(PurgeReport {
            outcomes: vec![
                PurgeOutcome {
                    url: resource,
                    result: resource_result,
                },
                PurgeOutcome {
                    url: base,
                    result: base_result,
                },
            ],
        })
    }

    async fn purge_one(&self, url: &str) -> Result<(), PurgeError> {
        let result = match tokio::time::timeout(self.timeout, self.client.purge(url)).await {
            Ok(result) => result,
            Err(_) => Err(PurgeError::Timeout(self.timeout)),
        };

        match &result {
            Ok(()) => info!(url, "Cache purged"),
            Err(PurgeError::Timeout(after)) => {
                warn!(url, timeout = ?after, "Cache purge timed out")
            }
            Err(e) => error!(url, error = %e, "Cache purge failed"),
        }
        result
    }
}

#[async_trait]
impl EventHandler for CachePurgeHandler {
    async fn handle(
        &self,
        event: &str,
        payload: &CallbackPayload,
    ) -> Result<DispatchResponse, HandlerError> {
        let report = self.purge(payload).await?;
        let failed = report.failures().count();
        if failed > 0 {
            warn!(event, failed, "Some cache purges failed");
        }

        Ok(DispatchResponse::success(format!(
            "Webhook processed for event {}",
            event
        )))
    }
}
