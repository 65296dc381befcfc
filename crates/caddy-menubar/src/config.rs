//! Application configuration.
//!
//! All settings live in `config.toml` under `<config_dir>/caddy/`. Every
//! field has a default, so a missing file or a partial one is fine; only the
//! Google client credentials have to be provided before the app can sign in.
//!
//! ```toml
//! refresh_interval_secs = 300
//! log_format = "json"
//!
//! [google]
//! credentials_file = "~/Downloads/client_secret.json"
//!
//! [notifications]
//! timeout_secs = 15
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use caddy_core::{TracingConfig, TracingOutputFormat};
use caddy_providers::google::{GoogleConfig, OAuthCredentials};
use caddy_scheduler::NotifyConfig;

use crate::error::{AppError, AppResult};

/// Week view of the signed-in user's calendar.
pub const DEFAULT_CALENDAR_URL: &str = "https://calendar.google.com/calendar/r/week";

/// Configuration for the menu-bar app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Verbose logging.
    pub debug: bool,

    /// `compact`, `pretty` or `json`; the preset's format when unset.
    pub log_format: Option<TracingOutputFormat>,

    /// Filter directive such as `caddy_scheduler=trace`. Wins over `RUST_LOG`.
    pub log_filter: Option<String>,

    /// Seconds between calendar refreshes.
    pub refresh_interval_secs: u64,

    /// How many upcoming events to fetch and list.
    pub max_events: usize,

    /// Opened by the "Open Calendar" entry.
    pub calendar_url: String,

    pub google: GoogleSettings,

    pub notifications: NotificationSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_format: None,
            log_filter: None,
            refresh_interval_secs: 300,
            max_events: caddy_providers::DEFAULT_EVENT_LIMIT,
            calendar_url: DEFAULT_CALENDAR_URL.to_string(),
            google: GoogleSettings::default(),
            notifications: NotificationSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> AppResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("caddy")
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn tracing_config(&self) -> TracingConfig {
        let mut config = if self.debug {
            TracingConfig::debug()
        } else {
            TracingConfig::menubar()
        };
        if let Some(format) = self.log_format {
            config = config.with_format(format);
        }
        if let Some(ref filter) = self.log_filter {
            config = config.with_env_filter(filter);
        }
        config
    }
}

/// Google OAuth client and calendar selection.
///
/// The client ID and secret come either inline or from the JSON file
/// downloaded from the Google Cloud Console. Inline values win.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub calendar_id: String,
    /// Token file location; defaults to `<config_dir>/caddy/token.json`.
    pub token_path: Option<PathBuf>,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            credentials_file: None,
            calendar_id: "primary".to_string(),
            token_path: None,
        }
    }
}

impl GoogleSettings {
    pub fn resolve_credentials(&self) -> AppResult<OAuthCredentials> {
        match (&self.client_id, &self.client_secret, &self.credentials_file) {
            (Some(id), Some(secret), _) => Ok(OAuthCredentials::new(id, secret)),
            (_, _, Some(path)) => Ok(OAuthCredentials::from_file(expand_home(path))?),
            (Some(_), None, None) => Err(AppError::Config(
                "client_secret is missing from the [google] section".to_string(),
            )),
            _ => Err(AppError::Config(format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                 client_secret = \"YOUR_SECRET\"\n\n  \
                 or point credentials_file at the JSON from the Cloud Console",
                AppConfig::default_path().display()
            ))),
        }
    }

    pub fn to_provider_config(&self) -> AppResult<GoogleConfig> {
        let credentials = self.resolve_credentials()?;
        let mut config = GoogleConfig::new(credentials).with_calendar_id(&self.calendar_id);
        if let Some(ref path) = self.token_path {
            config = config.with_token_path(expand_home(path));
        }
        config.validate()?;
        Ok(config)
    }
}

/// Expands a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Desktop notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub app_name: String,
    pub timeout_secs: u32,
    pub icon_path: Option<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        let defaults = NotifyConfig::default();
        Self {
            enabled: defaults.enabled,
            app_name: defaults.app_name,
            timeout_secs: defaults.timeout_secs,
            icon_path: defaults.icon_path,
        }
    }
}

impl NotificationSettings {
    pub fn to_notify_config(&self) -> NotifyConfig {
        let config = NotifyConfig::default()
            .with_app_name(&self.app_name)
            .with_timeout(self.timeout_secs)
            .with_enabled(self.enabled);
        match self.icon_path {
            Some(ref icon) => config.with_icon_path(icon),
            None => config,
        }
    }
}
