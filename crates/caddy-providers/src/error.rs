//! Errors from the credential store and the calendar API.
//!
//! Every failure carries a [`ProviderErrorCode`] so the app loop can decide
//! between "try again next refresh", "sign in again" and "fix the config"
//! without matching on message text.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// The token was rejected (HTTP 401, bad grant).
    Unauthenticated,
    /// The token is valid but may not read this calendar (HTTP 403).
    Forbidden,
    Network,
    RateLimited,
    /// HTTP 5xx or any other unexpected status.
    Server,
    /// The body did not parse.
    BadResponse,
    /// Client credentials, token file or OAuth settings.
    Config,
    Internal,
}

impl ProviderErrorCode {
    /// Transient failures; the next refresh may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Server)
    }

    /// The stored credential is useless and has to be replaced by signing in.
    pub fn requires_login(self) -> bool {
        self == Self::Unauthenticated
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Unauthenticated => "not signed in",
            Self::Forbidden => "forbidden",
            Self::Network => "network",
            Self::RateLimited => "rate limited",
            Self::Server => "calendar server",
            Self::BadResponse => "bad response",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Unauthenticated, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Forbidden, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Network, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Server, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::BadResponse, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Config, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Internal, message)
    }

    /// Attaches the underlying error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn requires_login(&self) -> bool {
        self.code.requires_login()
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
