//! Sources used when the Google client cannot be set up.
//!
//! The app still starts and shows the signed-out menu; clicking the sign-in
//! entry reports why it cannot work instead of the process exiting early.

use caddy_core::Event;
use caddy_providers::{
    BoxFuture, CalendarSource, CredentialSource, ProviderError, ProviderResult, TokenInfo,
};

#[derive(Debug, Clone)]
pub struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn error(&self) -> ProviderError {
        ProviderError::configuration(self.reason.clone())
    }
}

impl CredentialSource for Unconfigured {
    fn get(&self) -> BoxFuture<'_, Option<TokenInfo>> {
        Box::pin(async { None })
    }

    fn login(&self) -> BoxFuture<'_, ProviderResult<TokenInfo>> {
        Box::pin(async move { Err(self.error()) })
    }

    fn invalidate(&self) -> ProviderResult<()> {
        Ok(())
    }
}

impl CalendarSource for Unconfigured {
    fn list_upcoming<'a>(
        &'a self,
        _credential: &'a TokenInfo,
        _limit: usize,
    ) -> BoxFuture<'a, ProviderResult<Vec<Event>>> {
        Box::pin(async move { Err(self.error()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caddy_providers::ProviderErrorCode;

    #[tokio::test]
    async fn never_signed_in_and_login_explains_why() {
        let source = Unconfigured::new("Google credentials not found");

        assert!(source.get().await.is_none());
        assert!(source.invalidate().is_ok());

        let err = source.login().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::Config);
        assert_eq!(err.message(), "Google credentials not found");
    }
}
