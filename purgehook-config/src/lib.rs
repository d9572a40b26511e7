// Configuration for purgehook
//
// The whole configuration is read once at process start into an immutable
// `AppConfig`, validated at construction, and handed to each component.

pub mod env;
pub mod error;
pub mod validation;

pub use env::{EnvLoader, EnvVars};
pub use error::{ConfigError, Result};
pub use validation::{ConfigValidator, Validate};

use std::path::PathBuf;
use std::time::Duration;

/// Events subscribed when `GHOST_WEBHOOK_EVENTS` is not set.
pub const DEFAULT_EVENTS: &[&str] = &[
    "site.changed",
    "post.added",
    "post.deleted",
    "post.edited",
    "post.published",
    "post.published.edited",
    "post.unpublished",
    "page.added",
    "page.deleted",
    "page.edited",
    "page.published",
    "page.published.edited",
    "page.unpublished",
];

/// Remote platform settings.
#[derive(Debug, Clone)]
pub struct GhostConfig {
    /// Base URL of the platform, without trailing slash
    pub url: String,
    /// Admin API key, `<id>:<hex-secret>`
    pub admin_api_key: String,
    /// Shared secret registered with every webhook
    pub webhook_secret: String,
    /// True when `webhook_secret` was generated for this process
    pub secret_generated: bool,
    /// Public base URL this service is reachable at
    pub webhook_target: String,
    /// Prefix of the remote webhook names
    pub webhook_name: String,
    /// Desired event set, in declaration order, without duplicates
    pub events: Vec<String>,
}

/// Inbound signature checking.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    pub verify: bool,
    /// Maximum accepted age of the signed timestamp
    pub tolerance: Option<Duration>,
}

/// CDN purge settings.
#[derive(Debug, Clone)]
pub struct CdnConfig {
    /// Public base URL of the cached site; purges fail per invocation when unset
    pub base_url: Option<String>,
    pub api_key: String,
    pub purge_url: String,
    pub purge_timeout: Duration,
}

/// Listener and lifecycle settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout: Duration,
}

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ghost: GhostConfig,
    pub signature: SignatureConfig,
    pub cdn: CdnConfig,
    pub server: ServerConfig,
    /// Location of the persisted event → remote id mapping
    pub store_path: PathBuf,
    /// Expose `DELETE /webhook/<event>`
    pub enable_removal: bool,
}

impl AppConfig {
    /// Load `.env`, then the process environment.
    pub fn load() -> Result<Self> {
        let loader = EnvLoader::default();
        loader.load_dotenv(None)?;
        Self::from_vars(&loader.load())
    }

    /// Build and validate the configuration from a set of variables.
    pub fn from_vars(vars: &EnvVars) -> Result<Self> {
        let (webhook_secret, secret_generated) = match vars.get("GHOST_WEBHOOK_SECRET") {
            Some(secret) => (secret.to_string(), false),
            None => (generate_secret(), true),
        };

        let events = match vars.get("GHOST_WEBHOOK_EVENTS") {
            Some(list) => parse_event_list(list),
            None => DEFAULT_EVENTS.iter().map(|e| e.to_string()).collect(),
        };

        let port = vars.u64_or("PORT", 3000)?;
        ConfigValidator::is_port(port, "PORT")?;

        let config = Self {
            ghost: GhostConfig {
                url: trim_url(&vars.get_or("GHOST_URL", "http://localhost:2368")),
                admin_api_key: vars.required("GHOST_ADMIN_API_KEY")?,
                webhook_secret,
                secret_generated,
                webhook_target: trim_url(&vars.required("GHOST_WEBHOOK_TARGET")?),
                webhook_name: vars.get_or("GHOST_WEBHOOK_NAME", "purgehook"),
                events,
            },
            signature: SignatureConfig {
                verify: vars.bool_or("WEBHOOK_VERIFY_SIGNATURE", true)?,
                tolerance: vars
                    .u64_opt("WEBHOOK_SIGNATURE_TOLERANCE_SECS")?
                    .map(Duration::from_secs),
            },
            cdn: CdnConfig {
                base_url: vars.get("CDN_BASE_URL").map(trim_url),
                api_key: vars.required("BUNNY_API_KEY")?,
                purge_url: vars.get_or("BUNNY_PURGE_URL", "https://api.bunny.net/purge"),
                purge_timeout: Duration::from_secs(vars.u64_or("PURGE_TIMEOUT_SECS", 15)?),
            },
            server: ServerConfig {
                host: vars.get_or("HOST", "0.0.0.0"),
                port: port as u16,
                shutdown_timeout: Duration::from_secs(vars.u64_or("SHUTDOWN_TIMEOUT_SECS", 10)?),
            },
            store_path: PathBuf::from(vars.get_or("WEBHOOK_STORE_PATH", "data/webhooks.json")),
            enable_removal: vars.bool_or("WEBHOOK_ENABLE_REMOVAL", false)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Target URL template; `{event}` is replaced by the dashed event name.
    pub fn target_url_template(&self) -> String {
        format!("{}/webhook/{{event}}", self.ghost.webhook_target)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        ConfigValidator::is_url(&self.ghost.url, "GHOST_URL")?;
        ConfigValidator::is_admin_key(&self.ghost.admin_api_key, "GHOST_ADMIN_API_KEY")?;
        ConfigValidator::is_url(&self.ghost.webhook_target, "GHOST_WEBHOOK_TARGET")?;
        ConfigValidator::not_empty(&self.ghost.webhook_name, "GHOST_WEBHOOK_NAME")?;
        if self.ghost.events.is_empty() {
            return Err(ConfigError::invalid(
                "GHOST_WEBHOOK_EVENTS",
                "at least one event is required",
            ));
        }
        for event in &self.ghost.events {
            ConfigValidator::is_event_name(event, "GHOST_WEBHOOK_EVENTS")?;
        }
        if let Some(base) = &self.cdn.base_url {
            ConfigValidator::is_url(base, "CDN_BASE_URL")?;
        }
        ConfigValidator::is_url(&self.cdn.purge_url, "BUNNY_PURGE_URL")?;
        if self.cdn.purge_timeout.is_zero() {
            return Err(ConfigError::invalid("PURGE_TIMEOUT_SECS", "must be positive"));
        }
        if self.server.shutdown_timeout.is_zero() {
            return Err(ConfigError::invalid("SHUTDOWN_TIMEOUT_SECS", "must be positive"));
        }
        Ok(())
    }
}

/// Random 32-character hex secret.
///
/// Not persisted: a restart without `GHOST_WEBHOOK_SECRET` rotates it, and
/// the next reconciliation pass pushes the new value to the platform.
pub fn generate_secret() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn parse_event_list(list: &str) -> Vec<String> {
    let mut events: Vec<String> = Vec::new();
    for event in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if !events.iter().any(|e| e == event) {
            events.push(event.to_string());
        }
    }
    events
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GHOST_ADMIN_API_KEY", "6489a1b2:0a1b2c3d4e5f"),
            ("GHOST_WEBHOOK_TARGET", "https://hooks.example.com/"),
            ("BUNNY_API_KEY", "bunny-key"),
        ]
    }

    fn with(extra: &[(&'static str, &'static str)]) -> EnvVars {
        let mut vars = base_vars();
        vars.extend_from_slice(extra);
        EnvVars::from_pairs(vars)
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_vars(&with(&[])).unwrap();

        assert_eq!(config.ghost.url, "http://localhost:2368");
        assert_eq!(config.ghost.webhook_target, "https://hooks.example.com");
        assert_eq!(config.ghost.events.len(), DEFAULT_EVENTS.len());
        assert!(config.signature.verify);
        assert!(config.signature.tolerance.is_none());
        assert_eq!(config.cdn.base_url, None);
        assert_eq!(config.cdn.purge_timeout, Duration::from_secs(15));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.store_path, PathBuf::from("data/webhooks.json"));
        assert!(!config.enable_removal);
    }

    #[test]
    fn test_secret_generated_when_absent() {
        let config = AppConfig::from_vars(&with(&[])).unwrap();
        assert!(config.ghost.secret_generated);
        assert_eq!(config.ghost.webhook_secret.len(), 32);
        assert!(config.ghost.webhook_secret.bytes().all(|b| b.is_ascii_hexdigit()));

        let config = AppConfig::from_vars(&with(&[("GHOST_WEBHOOK_SECRET", "s3cret")])).unwrap();
        assert!(!config.ghost.secret_generated);
        assert_eq!(config.ghost.webhook_secret, "s3cret");
    }

    #[test]
    fn test_missing_required() {
        let vars = EnvVars::from_pairs([("GHOST_WEBHOOK_TARGET", "https://hooks.example.com")]);
        let err = AppConfig::from_vars(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GHOST_ADMIN_API_KEY")));
    }

    #[test]
    fn test_event_list_deduplicated_in_order() {
        let config = AppConfig::from_vars(&with(&[(
            "GHOST_WEBHOOK_EVENTS",
            "post.published, page.published,post.published,,",
        )]))
        .unwrap();
        assert_eq!(config.ghost.events, vec!["post.published", "page.published"]);
    }

    #[test]
    fn test_invalid_event_rejected() {
        let err = AppConfig::from_vars(&with(&[("GHOST_WEBHOOK_EVENTS", "post-published")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "GHOST_WEBHOOK_EVENTS",
                ..
            }
        ));
    }

    #[test]
    fn test_signature_flag_and_tolerance() {
        let config = AppConfig::from_vars(&with(&[
            ("WEBHOOK_VERIFY_SIGNATURE", "false"),
            ("WEBHOOK_SIGNATURE_TOLERANCE_SECS", "300"),
        ]))
        .unwrap();
        assert!(!config.signature.verify);
        assert_eq!(config.signature.tolerance, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_invalid_cdn_base_url() {
        let err = AppConfig::from_vars(&with(&[("CDN_BASE_URL", "example.com")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "CDN_BASE_URL", .. }));
    }

    #[test]
    fn test_target_url_template() {
        let config = AppConfig::from_vars(&with(&[])).unwrap();
        assert_eq!(
            config.target_url_template(),
            "https://hooks.example.com/webhook/{event}"
        );
    }

    #[test]
    fn test_zero_port_rejected() {
        let err = AppConfig::from_vars(&with(&[("PORT", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }
}
