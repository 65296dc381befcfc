//! Google credential store: token file, refresh and interactive login.

use tracing::{debug, info, warn};

use crate::credential::TokenInfo;
use crate::error::ProviderResult;
use crate::source::{BoxFuture, CredentialSource};

use super::config::GoogleConfig;
use super::oauth::OAuthClient;
use super::tokens::TokenStorage;

/// Owns the persisted Google credential.
#[derive(Debug)]
pub struct GoogleCredentialStore {
    scopes: Vec<String>,
    loopback_port_range: (u16, u16),
    storage: TokenStorage,
    oauth: OAuthClient,
}

impl GoogleCredentialStore {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        config.validate()?;

        Ok(Self {
            scopes: config.scopes.clone(),
            loopback_port_range: config.loopback_port_range,
            storage: TokenStorage::new(&config.token_path),
            oauth: OAuthClient::new(config.credentials.clone(), config.timeout, &config.user_agent)?,
        })
    }

    /// Path of the token file.
    pub fn token_path(&self) -> &std::path::Path {
        self.storage.path()
    }

    async fn load_valid(&self) -> Option<TokenInfo> {
        match self.storage.load() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(error = %e, path = %self.storage.path().display(), "ignoring unreadable token file");
                return None;
            }
        }

        let token = self.storage.get()?;
        if !token.has_scopes(&self.scopes) {
            info!("stored credential lacks required scopes, sign-in needed");
            return None;
        }
        if !token.is_expired() {
            return Some(token);
        }

        let refresh_token = match token.refresh_token.as_deref() {
            Some(refresh_token) => refresh_token,
            None => {
                info!("access token expired and no refresh token stored");
                return None;
            }
        };

        debug!("access token expired, refreshing");
        let refreshed = match self.oauth.refresh(refresh_token).await {
            Ok((access_token, expires_in)) => {
                self.storage.update_access_token(access_token, expires_in)
            }
            Err(e) => Err(e),
        };

        refreshed
            .map_err(|e| warn!(error = %e, "token refresh failed"))
            .ok()
    }

    async fn sign_in(&self) -> ProviderResult<TokenInfo> {
        let token = self
            .oauth
            .authorize(&self.scopes, self.loopback_port_range)
            .await?;
        self.storage.set(token.clone())?;
        info!(path = %self.storage.path().display(), "signed in");
        Ok(token)
    }
}

impl CredentialSource for GoogleCredentialStore {
    fn get(&self) -> BoxFuture<'_, Option<TokenInfo>> {
        Box::pin(self.load_valid())
    }

    fn login(&self) -> BoxFuture<'_, ProviderResult<TokenInfo>> {
        Box::pin(self.sign_in())
    }

    fn invalidate(&self) -> ProviderResult<()> {
        self.storage.clear()
    }
}
