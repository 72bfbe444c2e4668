//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! human-readable or a JSON `fmt` layer. `RUST_LOG` takes precedence over the
//! configured level.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowtrace_core::logging::LogConfig;
//!
//! LogConfig::production().init()?;
//! tracing::info!(accounts = 1200, "analysis complete");
//! ```

use serde::{Deserialize, Serialize};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    #[default]
    Info,
    /// Warning level
    Warn,
    /// Error level
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output
    pub structured: bool,
    /// Include caller location
    pub include_location: bool,
    /// Include thread IDs
    pub include_thread_ids: bool,
    /// Write to stderr instead of stdout
    pub stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            structured: false,
            include_location: false,
            include_thread_ids: false,
            stderr: true,
        }
    }
}

impl LogConfig {
    /// Development configuration
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            include_location: true,
            ..Default::default()
        }
    }

    /// Production configuration
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            structured: true,
            include_thread_ids: true,
            ..Default::default()
        }
    }

    /// Override the level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Initialize logging.
    ///
    /// Installing a second global subscriber is a no-op, so calling this
    /// from tests or from several entry points is safe.
    pub fn init(&self) -> crate::error::Result<()> {
        use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.to_string()));

        let subscriber = tracing_subscriber::registry().with(filter);

        match (self.structured, self.stderr) {
            (true, true) => {
                let layer = fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_thread_ids(self.include_thread_ids)
                    .with_file(self.include_location)
                    .with_line_number(self.include_location);
                subscriber.with(layer).try_init().ok();
            }
            (true, false) => {
                let layer = fmt::layer()
                    .json()
                    .with_thread_ids(self.include_thread_ids)
                    .with_file(self.include_location)
                    .with_line_number(self.include_location);
                subscriber.with(layer).try_init().ok();
            }
            (false, true) => {
                let layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_thread_ids(self.include_thread_ids)
                    .with_file(self.include_location)
                    .with_line_number(self.include_location);
                subscriber.with(layer).try_init().ok();
            }
            (false, false) => {
                let layer = fmt::layer()
                    .with_thread_ids(self.include_thread_ids)
                    .with_file(self.include_location)
                    .with_line_number(self.include_location);
                subscriber.with(layer).try_init().ok();
            }
        }

        Ok(())
    }
}
