//! Admin API credentials
//!
//! An admin key is `<id>:<hex-secret>`. Each request carries a short-lived
//! HS256 token signed with the decoded secret, with `kid` set to the key id.

use crate::RegistryError;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Audience claim expected by the admin API
pub const ADMIN_AUDIENCE: &str = "/admin/";

/// Token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminClaims {
    pub iat: i64,
    pub exp: i64,
    pub aud: String,
}

/// Parsed admin API key
#[derive(Clone)]
pub struct AdminApiKey {
    id: String,
    secret: Vec<u8>,
}

impl AdminApiKey {
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let (id, secret) = raw
            .trim()
            .split_once(':')
            .ok_or_else(|| RegistryError::Credential("expected '<id>:<secret>'".to_string()))?;
        if id.is_empty() {
            return Err(RegistryError::Credential("key id is empty".to_string()));
        }
        let secret = hex::decode(secret)
            .map_err(|e| RegistryError::Credential(format!("secret is not hex: {}", e)))?;
        if secret.is_empty() {
            return Err(RegistryError::Credential("secret is empty".to_string()));
        }

        Ok(Self {
            id: id.to_string(),
            secret,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Token issued now, valid for `ttl`
    pub fn token(&self, ttl: Duration) -> Result<String, RegistryError> {
        self.token_at(chrono::Utc::now().timestamp(), ttl)
    }

    pub fn token_at(&self, issued_at: i64, ttl: Duration) -> Result<String, RegistryError> {
        let claims = AdminClaims {
            iat: issued_at,
            exp: issued_at + ttl.as_secs() as i64,
            aud: ADMIN_AUDIENCE.to_string(),
        };
        let header = Header {
            kid: Some(self.id.clone()),
            ..Header::new(Algorithm::HS256)
        };

        encode(&header, &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|e| RegistryError::Credential(e.to_string()))
    }
}

// The secret never appears in logs
impl fmt::Debug for AdminApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminApiKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}
