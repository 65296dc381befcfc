//! Google Calendar backend.
//!
//! [`GoogleCredentialStore`] owns the OAuth token blob: it signs the user in
//! with an authorization-code + PKCE flow over a loopback redirect, persists
//! the result, and refreshes the access token when it expires.
//! [`GoogleCalendar`] lists the next few timed events of one calendar.
//!
//! Users bring their own OAuth client ID and secret, as Google requires a
//! registered desktop client for Calendar API access.

mod client;
mod config;
mod credentials;
mod oauth;
mod tokens;

pub use client::GoogleCalendar;
pub use config::{GoogleConfig, OAuthCredentials};
pub use credentials::GoogleCredentialStore;
pub use oauth::{AuthorizationGrant, OAuthClient, PkceFlow};
pub use tokens::TokenStorage;
