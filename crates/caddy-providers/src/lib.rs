//! Credential and calendar sources.
//!
//! The refresh cycle only sees two traits:
//!
//! - [`CredentialSource`] - hands out a usable [`TokenInfo`] or nothing
//! - [`CalendarSource`] - lists the next few [`caddy_core::Event`]s
//!
//! The `google` feature (on by default) provides both on top of the Google
//! OAuth and Calendar v3 APIs.
//!
//! ```text
//! ┌───────────────────────┐         ┌────────────────┐
//! │ GoogleCredentialStore │         │ GoogleCalendar │
//! └───────────┬───────────┘         └───────┬────────┘
//!             │ get()                       │ list_upcoming()
//!             ▼                             ▼
//!       ┌───────────┐               ┌──────────────┐
//!       │ TokenInfo │ ────────────▶ │  Vec<Event>  │
//!       └───────────┘               └──────────────┘
//! ```

pub mod credential;
pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod source;

pub use credential::TokenInfo;
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use source::{BoxFuture, CalendarSource, CredentialSource, DEFAULT_EVENT_LIMIT};
