//! Logging lifecycle for purgehook.
//!
//! Logging is initialized exactly once at process start and flushed when the
//! returned [`LogGuard`] is dropped. Components never configure logging
//! themselves; they emit `tracing` events and the subscriber installed here
//! decides where those go.
//!
//! # Usage
//!
//! ```no_run
//! use purgehook_log::LogConfig;
//!
//! let _guard = LogConfig::from_env().init().expect("logging already initialized");
//! tracing::info!("service started");
//! // guard dropped here, buffered lines flushed
//! ```
//!
//! # Environment Variables
//!
//! - `PURGEHOOK_DEBUG=1` - Force debug level
//! - `PURGEHOOK_LOG_LEVEL=trace|debug|info|warn|error` - Set log level
//! - `PURGEHOOK_LOG_FORMAT=json|plain|pretty|compact` - Set output format
//! - `PURGEHOOK_LOG_OUTPUT=stdout|stderr` - Set output stream
//! - `RUST_LOG` - Full filter directive, overrides the level

use std::io;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LogError {
    /// A filter directive could not be parsed.
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    /// A global subscriber was already installed.
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Directive string for `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured, machine-readable (default)
    Json,
    Plain,
    /// Multi-line, for local development
    Pretty,
    Compact,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "plain" => Some(LogFormat::Plain),
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

/// Output stream for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
}

impl LogOutput {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stdout" => Some(LogOutput::Stdout),
            "stderr" => Some(LogOutput::Stderr),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Include target (module path)
    pub targets: bool,
    /// Enable ANSI colors (ignored for JSON)
    pub colors: bool,
    /// Full filter directive, overrides `level` when set
    pub env_filter: Option<String>,
}

impl Default for LogConfig {
    /// JSON to STDOUT at INFO level
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stdout,
            targets: true,
            colors: false,
            env_filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Unparsable values fall back to the defaults rather than failing, so a
    /// typo in a log variable never prevents the service from starting.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };

        let debug = flag("PURGEHOOK_DEBUG");
        let level = lookup("PURGEHOOK_LOG_LEVEL")
            .and_then(|s| LogLevel::parse(&s))
            .unwrap_or(if debug { LogLevel::Debug } else { LogLevel::Info });
        let format = lookup("PURGEHOOK_LOG_FORMAT")
            .and_then(|s| LogFormat::parse(&s))
            .unwrap_or(LogFormat::Json);
        let output = lookup("PURGEHOOK_LOG_OUTPUT")
            .and_then(|s| LogOutput::parse(&s))
            .unwrap_or(LogOutput::Stdout);
        let colors = format != LogFormat::Json && lookup("NO_COLOR").is_none();

        let config = Self::new()
            .level(level)
            .format(format)
            .output(output)
            .with_colors(colors);
        match lookup("RUST_LOG").filter(|s| !s.trim().is_empty()) {
            Some(filter) => config.with_env_filter(filter),
            None => config,
        }
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_colors(mut self, enable: bool) -> Self {
        self.colors = enable;
        self
    }

    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive that `init` will install.
    pub fn filter_directive(&self) -> String {
        self.env_filter
            .clone()
            .unwrap_or_else(|| self.level.as_str().to_string())
    }

    /// Install the global subscriber.
    ///
    /// The returned guard must be kept alive for the duration of the program;
    /// dropping it flushes any buffered log lines.
    pub fn init(self) -> Result<LogGuard, LogError> {
        let directive = self.filter_directive();
        let filter = EnvFilter::try_new(&directive).map_err(|e| LogError::InvalidFilter {
            filter: directive.clone(),
            message: e.to_string(),
        })?;

        let (writer, guard) = match self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
        };

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_target(self.targets),
                )
                .try_init(),
            LogFormat::Plain => registry
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_ansi(self.colors),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_ansi(self.colors),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_writer(writer)
                        .with_target(self.targets)
                        .with_ansi(self.colors),
                )
                .try_init(),
        };

        installed.map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;
        Ok(LogGuard { _worker: guard })
    }
}

/// Keeps the non-blocking writer alive; flushes on drop.
#[must_use = "dropping the guard immediately stops log output"]
pub struct LogGuard {
    _worker: WorkerGuard,
}

impl LogGuard {
    /// Flush buffered lines now. Equivalent to dropping the guard.
    pub fn flush(self) {
        drop(self);
    }
}

impl std::fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuard").finish_non_exhaustive()
    }
}
