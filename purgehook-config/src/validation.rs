// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Validation rules shared by the configuration sections
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &'static str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::invalid(field, "cannot be empty"));
        }
        Ok(())
    }

    /// Validate URL format
    pub fn is_url(value: &str, field: &'static str) -> Result<()> {
        let rest = value
            .strip_prefix("http://")
            .or_else(|| value.strip_prefix("https://"));
        match rest {
            Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
            _ => Err(ConfigError::invalid(
                field,
                format!("'{}' must be an http(s) URL", value),
            )),
        }
    }

    pub fn is_port(value: u64, field: &'static str) -> Result<()> {
        if value == 0 || value > u64::from(u16::MAX) {
            return Err(ConfigError::invalid(
                field,
                format!("{} is not a valid port number", value),
            ));
        }
        Ok(())
    }

    /// Admin credentials have the shape `<id>:<hex-secret>`.
    pub fn is_admin_key(value: &str, field: &'static str) -> Result<()> {
        let (id, secret) = value
            .split_once(':')
            .ok_or_else(|| ConfigError::invalid(field, "expected '<id>:<secret>'"))?;
        if id.is_empty() {
            return Err(ConfigError::invalid(field, "key id is empty"));
        }
        if secret.is_empty()
            || secret.len() % 2 != 0
            || !secret.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(ConfigError::invalid(field, "key secret must be hex encoded"));
        }
        Ok(())
    }

    /// Event names are dot separated lowercase words, e.g. `post.published.edited`.
    pub fn is_event_name(value: &str, field: &'static str) -> Result<()> {
        let valid = !value.is_empty()
            && value.split('.').all(|part| {
                !part.is_empty()
                    && part
                        .bytes()
                        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
            });
        if !valid {
            return Err(ConfigError::invalid(
                field,
                format!("'{}' is not a valid event name", value),
            ));
        }
        Ok(())
    }
}
