//! The OAuth credential blob.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds shaved off the advertised lifetime so refresh happens before
/// the server starts rejecting the token.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Information about an OAuth token set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the tokens were last refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Creates a new token info from OAuth response data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(|secs| expiry_from(now, secs)),
            scopes,
            last_refresh: now,
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns true if the access token is expired at `now`.
    ///
    /// Tokens without an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Returns true if the token has the required scopes.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Updates the access token after a refresh.
    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        let now = Utc::now();
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs.map(|secs| expiry_from(now, secs));
        self.last_refresh = now;
    }
}

fn expiry_from(now: DateTime<Utc>, expires_in_secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(expires_in_secs) - Duration::seconds(EXPIRY_MARGIN_SECS)
}
