//! Tracing setup for caddy.
//!
//! One place to install the global subscriber so every crate in the
//! workspace logs through the same filter and format.
//!
//! ```ignore
//! use caddy_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::menubar())?;
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Target prefix shared by every caddy crate.
const TARGET_PREFIX: &str = "caddy";

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingOutputFormat {
    /// Human-readable multi-line format
    Pretty,
    /// Compact single-line format (default)
    #[default]
    Compact,
    /// JSON lines
    Json,
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// The default log level when RUST_LOG is not set
    pub default_level: Level,
    /// Output format for log messages
    pub output_format: TracingOutputFormat,
    /// Whether to include file/line information in logs
    pub include_location: bool,
    /// Whether to include target (module path) in logs
    pub include_target: bool,
    /// Whether to include span events (enter/exit)
    pub include_span_events: bool,
    /// Custom env filter directive (overrides default_level if set)
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Compact,
            include_location: false,
            include_target: true,
            include_span_events: false,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Config for the menu-bar process in normal operation.
    #[must_use]
    pub fn menubar() -> Self {
        Self::default()
    }

    /// Verbose config used when `debug = true` in the config file.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            output_format: TracingOutputFormat::Pretty,
            include_location: true,
            include_target: true,
            include_span_events: true,
            env_filter: None,
        }
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set a custom env filter directive
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Directive used when neither `env_filter` nor `RUST_LOG` is set.
    fn default_directive(&self) -> String {
        format!("{}={}", TARGET_PREFIX, self.default_level)
    }
}

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` overrides the default level unless an explicit
/// `env_filter` is configured.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set or if
/// the env filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = match config.env_filter {
        Some(ref filter) => EnvFilter::try_new(filter)?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.default_directive())),
    };

    let span_events = if config.include_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(config.include_target)
        .with_span_events(span_events);

    let layer = match config.output_format {
        TracingOutputFormat::Pretty => layer.pretty().boxed(),
        TracingOutputFormat::Compact => layer.compact().boxed(),
        TracingOutputFormat::Json => layer.json().boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert_eq!(config.output_format, TracingOutputFormat::Compact);
        assert!(!config.include_location);
        assert!(config.include_target);
        assert!(!config.include_span_events);
        assert!(config.env_filter.is_none());
    }

    #[test]
    fn test_debug_config() {
        let config = TracingConfig::debug();
        assert_eq!(config.default_level, Level::DEBUG);
        assert_eq!(config.output_format, TracingOutputFormat::Pretty);
        assert!(config.include_location);
        assert_eq!(config.default_directive(), "caddy=DEBUG");
    }

    #[test]
    fn test_builder_methods() {
        let config = TracingConfig::menubar()
            .with_format(TracingOutputFormat::Json)
            .with_env_filter("caddy_scheduler=trace");

        assert_eq!(config.default_level, Level::INFO);
        assert_eq!(config.output_format, TracingOutputFormat::Json);
        assert_eq!(config.env_filter, Some("caddy_scheduler=trace".to_string()));
    }

    #[test]
    fn output_format_from_config_name() {
        let format: TracingOutputFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(format, TracingOutputFormat::Json);
        assert!(serde_json::from_str::<TracingOutputFormat>(r#""xml""#).is_err());
    }
}
