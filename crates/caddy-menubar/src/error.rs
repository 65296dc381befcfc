//! Application error types.

use thiserror::Error;

use caddy_core::TracingError;
use caddy_providers::ProviderError;

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Errors that stop the app from starting.
///
/// Once the event loop runs, failures are logged and never surface here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tracing(#[from] TracingError),

    #[error("tray error: {0}")]
    Tray(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            AppError::Config("missing client_id".to_string()).to_string(),
            "configuration error: missing client_id"
        );
        assert_eq!(
            AppError::from(ProviderError::network("offline")).to_string(),
            "provider error: network: offline"
        );
    }

    #[test]
    fn io_errors_keep_source() {
        use std::error::Error;
        let err = AppError::from(std::io::Error::other("disk full"));
        assert!(err.source().is_some());
    }
}
