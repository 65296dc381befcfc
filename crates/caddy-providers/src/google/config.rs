//! Google OAuth client credentials and calendar settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// OAuth 2.0 client credentials registered in the Google Cloud Console.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Layout of the credentials JSON downloaded from the Cloud Console.
///
/// Either an `installed` / `web` section, or `client_id` and
/// `client_secret` at the root.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from a Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from a Cloud Console JSON string.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: CredentialsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse credentials JSON: {}", e))
                .with_source(e)
        })?;

        if let Some(creds) = file.installed.or(file.web) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }

        match (file.client_id, file.client_secret) {
            (Some(client_id), Some(client_secret)) => Ok(Self::new(client_id, client_secret)),
            _ => Err(ProviderError::configuration(
                "credentials file must contain an 'installed'/'web' section or 'client_id'/'client_secret' at the root",
            )),
        }
    }

    /// Checks the credentials look like a Google desktop client.
    pub fn validate(&self) -> ProviderResult<()> {
        if self.client_id.is_empty() {
            return Err(ProviderError::configuration("client_id is required"));
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err(ProviderError::configuration(
                "client_id should end with .apps.googleusercontent.com",
            ));
        }
        if self.client_secret.is_empty() {
            return Err(ProviderError::configuration("client_secret is required"));
        }
        Ok(())
    }
}

/// Settings shared by the credential store and the calendar source.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub credentials: OAuthCredentials,

    /// Where the token blob is persisted.
    pub token_path: PathBuf,

    /// Calendar to read events from.
    pub calendar_id: String,

    /// Request timeout for the OAuth and Calendar APIs.
    pub timeout: Duration,

    pub user_agent: String,

    /// Inclusive range of loopback ports tried for the OAuth redirect.
    pub loopback_port_range: (u16, u16),

    pub scopes: Vec<String>,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read-only calendar access.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";

    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            token_path: Self::default_token_path(),
            calendar_id: "primary".to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("caddy/{}", env!("CARGO_PKG_VERSION")),
            loopback_port_range: (8080, 8090),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
        }
    }

    /// `<config_dir>/caddy/token.json`, or `./caddy/token.json` when the
    /// platform has no config directory.
    pub fn default_token_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("caddy")
            .join("token.json")
    }

    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_loopback_port_range(mut self, start: u16, end: u16) -> Self {
        self.loopback_port_range = (start, end);
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn validate(&self) -> ProviderResult<()> {
        self.credentials.validate()?;

        if self.scopes.is_empty() {
            return Err(ProviderError::configuration(
                "at least one OAuth scope is required",
            ));
        }
        if self.calendar_id.is_empty() {
            return Err(ProviderError::configuration("calendar_id is required"));
        }
        if self.loopback_port_range.0 > self.loopback_port_range.1 {
            return Err(ProviderError::configuration("invalid loopback port range"));
        }
        Ok(())
    }
}
