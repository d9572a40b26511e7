//! Inbound callback payloads and outward dispatch responses

use serde::{Deserialize, Serialize};

/// State of a post or page at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceState {
    #[serde(default)]
    pub slug: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub status: Option<String>,
}

/// `{ current, previous }` pair carried by post and page callbacks
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResourceSnapshot {
    #[serde(default)]
    pub current: Option<ResourceState>,

    #[serde(default)]
    pub previous: Option<ResourceState>,
}

impl ResourceSnapshot {
    /// Non-empty slug of the current state
    pub fn slug(&self) -> Option<&str> {
        self.current
            .as_ref()
            .and_then(|c| c.slug.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

/// A callback body, classified by the resource it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackPayload {
    Post(ResourceSnapshot),
    Page(ResourceSnapshot),
    /// Site-level events and anything else without a post or page
    Unknown,
}

impl CallbackPayload {
    /// Classify a JSON body.
    ///
    /// A post with a slug wins; otherwise a page is used when present, then a
    /// slug-less post. Fields that fail to deserialize are treated as absent.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let post = snapshot(value, "post");
        let page = snapshot(value, "page");

        match (post, page) {
            (Some(post), _) if post.slug().is_some() => Self::Post(post),
            (_, Some(page)) => Self::Page(page),
            (Some(post), None) => Self::Post(post),
            (None, None) => Self::Unknown,
        }
    }

    /// Slug of the described resource, if any
    pub fn slug(&self) -> Option<&str> {
        match self {
            Self::Post(snapshot) | Self::Page(snapshot) => snapshot.slug(),
            Self::Unknown => None,
        }
    }

    /// Resource kind for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Post(_) => "post",
            Self::Page(_) => "page",
            Self::Unknown => "unknown",
        }
    }
}

fn snapshot(value: &serde_json::Value, key: &str) -> Option<ResourceSnapshot> {
    let raw = value.get(key).filter(|v| v.is_object())?;
    Some(ResourceSnapshot::deserialize(raw).unwrap_or_default())
}

/// Outcome class of a dispatched callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Warning,
    Error,
}

/// Body returned to the caller of `/webhook/*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResponse {
    #[serde(rename = "Status")]
    pub status: ResponseStatus,

    #[serde(rename = "Message")]
    pub message: String,
}

impl DispatchResponse {
    pub fn new(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Error, message)
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}
