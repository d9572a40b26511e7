// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Environment variable loader
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Load `.env` into the process environment.
    ///
    /// A missing default `.env` is not an error; an explicitly named file
    /// that cannot be read is.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => dotenvy::from_path(path)
                .map(|_| ())
                .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e))),
            None => {
                dotenvy::dotenv().ok();
                Ok(())
            }
        }
    }

    /// Snapshot the process environment.
    pub fn load(&self) -> EnvVars {
        EnvVars::from_pairs(env::vars().filter_map(|(key, value)| match self.prefix {
            Some(ref prefix) => key
                .strip_prefix(prefix.as_str())
                .map(|rest| (rest.trim_start_matches('_').to_string(), value)),
            None => Some((key, value)),
        }))
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Case-insensitive view over a set of configuration variables.
///
/// Blank values are treated as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into().to_lowercase(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(&key.to_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn required(&self, key: &'static str) -> Result<String> {
        self.get(key)
            .map(str::to_string)
            .ok_or(ConfigError::Missing(key))
    }

    pub fn bool_or(&self, key: &'static str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => match v.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(ConfigError::invalid(
                    key,
                    format!("expected a boolean, got '{}'", other),
                )),
            },
        }
    }

    pub fn u64_opt(&self, key: &'static str) -> Result<Option<u64>> {
        self.get(key)
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|_| {
                        ConfigError::invalid(key, format!("expected a number, got '{}'", v))
                    })
            })
            .transpose()
    }

    pub fn u64_or(&self, key: &'static str, default: u64) -> Result<u64> {
        Ok(self.u64_opt(key)?.unwrap_or(default))
    }
}
