//! The two seams the refresh cycle talks to.
//!
//! - [`CredentialSource`] hands out a usable credential (or none)
//! - [`CalendarSource`] turns a credential into the next few events
//!
//! Both return boxed futures so they can be used as trait objects.

use std::future::Future;
use std::pin::Pin;

use caddy_core::Event;

use crate::credential::TokenInfo;
use crate::error::ProviderResult;

/// A boxed future, used by object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default number of upcoming events fetched per refresh.
pub const DEFAULT_EVENT_LIMIT: usize = 10;

/// Persists and refreshes the OAuth credential.
pub trait CredentialSource: Send + Sync {
    /// Returns a valid credential, refreshing and persisting it if expired.
    ///
    /// Returns `None` when no credential is stored, the stored blob cannot
    /// be read, or refresh is impossible. Failures are logged, never raised.
    fn get(&self) -> BoxFuture<'_, Option<TokenInfo>>;

    /// Runs the interactive sign-in and persists the result.
    fn login(&self) -> BoxFuture<'_, ProviderResult<TokenInfo>>;

    /// Forgets the stored credential.
    fn invalidate(&self) -> ProviderResult<()>;
}

/// Lists upcoming events for a signed-in user.
pub trait CalendarSource: Send + Sync {
    /// Returns at most `limit` events starting at or after now,
    /// ordered by start time ascending.
    fn list_upcoming<'a>(
        &'a self,
        credential: &'a TokenInfo,
        limit: usize,
    ) -> BoxFuture<'a, ProviderResult<Vec<Event>>>;
}
