//! Errors that stop the process before it serves

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] purgehook_config::ConfigError),

    #[error("Logging error: {0}")]
    Log(#[from] purgehook_log::LogError),

    #[error("Registry client error: {0}")]
    Registry(#[from] purgehook_webhooks::RegistryError),

    #[error("Purge client error: {0}")]
    Purge(#[from] purgehook_webhooks::PurgeError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StartupError>;
