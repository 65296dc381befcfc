//! Authorization-code flow with PKCE and a loopback redirect.
//!
//! The browser is sent to Google's consent page; Google redirects back to
//! `http://127.0.0.1:<port>/callback` where a one-shot listener picks up the
//! code. The code and PKCE verifier are then exchanged for a token set.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::credential::TokenInfo;
use crate::error::{ProviderError, ProviderResult};

use super::config::OAuthCredentials;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Verifier entropy in bytes, before base64url encoding.
const CODE_VERIFIER_LENGTH: usize = 32;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Signed in to Caddy</h1>\
    <p>You can close this window.</p></body></html>";

const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
    <html><body><h1>Sign-in failed</h1>\
    <p>You can close this window and try again from the menu.</p></body></html>";

/// Talks to Google's OAuth endpoints.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(
        credentials: OAuthCredentials,
        timeout: Duration,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            credentials,
            http_client,
        })
    }

    /// Runs the interactive sign-in and returns a fresh token set.
    ///
    /// Blocks (off the async runtime) for up to five minutes waiting for the
    /// browser to come back.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> ProviderResult<TokenInfo> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback(port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);
        let auth_url = pkce.build_auth_url(&self.credentials.client_id, &redirect_uri, scopes);

        info!(port, "starting OAuth sign-in, opening browser");
        debug!(url = %auth_url, "authorization URL");

        if let Err(e) = open::that(&auth_url) {
            warn!(error = %e, url = %auth_url, "failed to open browser, open the URL manually");
        }

        let grant = tokio::task::spawn_blocking(move || wait_for_callback(listener))
            .await
            .map_err(|e| ProviderError::internal(format!("callback listener panicked: {}", e)))??;

        if grant.state != pkce.state {
            return Err(ProviderError::authentication(
                "OAuth state mismatch, ignoring callback",
            ));
        }

        info!("received authorization code, exchanging for tokens");
        let response = self
            .post_token_form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", grant.code.as_str()),
                ("code_verifier", pkce.verifier.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .await?;

        Ok(TokenInfo::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
            scopes.to_vec(),
        ))
    }

    /// Trades a refresh token for a new access token and its lifetime.
    pub async fn refresh(&self, refresh_token: &str) -> ProviderResult<(String, Option<i64>)> {
        let response = self
            .post_token_form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        debug!("refreshed access token");
        Ok((response.access_token, response.expires_in))
    }

    async fn post_token_form(&self, params: &[(&str, &str)]) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("token request failed: {}", e)).with_source(e)
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read token response: {}", e)).with_source(e)
        })?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e)).with_source(e)
        })
    }
}

/// Code and state returned by the consent page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub state: String,
}

fn bind_loopback(port_range: (u16, u16)) -> ProviderResult<(TcpListener, u16)> {
    (port_range.0..=port_range.1)
        .find_map(|port| {
            TcpListener::bind(("127.0.0.1", port))
                .ok()
                .map(|listener| (listener, port))
        })
        .ok_or_else(|| {
            ProviderError::configuration(format!(
                "no free loopback port in {}-{}",
                port_range.0, port_range.1
            ))
        })
}

/// Accepts connections until one carries the callback, or times out.
fn wait_for_callback(listener: TcpListener) -> ProviderResult<AuthorizationGrant> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = answer_callback(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "failed to accept callback connection"),
            }
        }
    });

    match rx.recv_timeout(CALLBACK_TIMEOUT) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ProviderError::authentication(
            "timed out waiting for the browser sign-in",
        )),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(ProviderError::internal("callback listener stopped"))
        }
    }
}

fn answer_callback(mut stream: TcpStream) -> Option<ProviderResult<AuthorizationGrant>> {
    let mut request_line = String::new();
    BufReader::new(&stream).read_line(&mut request_line).ok()?;

    let result = parse_callback(&request_line)?;
    let page = if result.is_ok() {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };
    let _ = stream.write_all(page.as_bytes());
    let _ = stream.flush();
    Some(result)
}

/// Parses `GET /callback?code=..&state=.. HTTP/1.1`.
///
/// Returns `None` for requests that are not the callback (favicon fetches
/// and the like), so the listener keeps waiting.
fn parse_callback(request_line: &str) -> Option<ProviderResult<AuthorizationGrant>> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != "/callback" {
        return None;
    }

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_default();
        match key {
            "code" => code = Some(value),
            "state" => state = Some(value),
            "error" => error = Some(value),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(Err(ProviderError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    Some(match code {
        Some(code) => Ok(AuthorizationGrant {
            code,
            state: state.unwrap_or_default(),
        }),
        None => Err(ProviderError::authentication(
            "callback carried no authorization code",
        )),
    })
}

/// RFC 7636 verifier, challenge and CSRF state for one sign-in attempt.
#[derive(Debug)]
pub struct PkceFlow {
    pub verifier: String,
    pub challenge: String,
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_43_chars() {
        assert_eq!(PkceFlow::new().verifier.len(), 43);
    }

    #[test]
    fn challenge_matches_rfc7636_vector() {
        // Appendix B of RFC 7636.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            challenge_for(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn flows_are_random() {
        let a = PkceFlow::new();
        let b = PkceFlow::new();
        assert_ne!(a.verifier, b.verifier);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn auth_url_carries_pkce_and_offline_access() {
        let flow = PkceFlow::new();
        let url = flow.build_auth_url(
            "test-client.apps.googleusercontent.com",
            "http://127.0.0.1:8080/callback",
            &["https://www.googleapis.com/auth/calendar.readonly".to_string()],
        );

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8080%2Fcallback"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={}", flow.state)));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn parses_callback_code_and_state() {
        let grant = parse_callback("GET /callback?state=abc&code=4%2F0Ab HTTP/1.1\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(
            grant,
            AuthorizationGrant {
                code: "4/0Ab".to_string(),
                state: "abc".to_string(),
            }
        );
    }

    #[test]
    fn callback_error_is_authentication_failure() {
        let err = parse_callback("GET /callback?error=access_denied HTTP/1.1")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::Unauthenticated);
        assert!(err.message().contains("access_denied"));
    }

    #[test]
    fn callback_without_code_fails() {
        assert!(
            parse_callback("GET /callback?state=abc HTTP/1.1")
                .unwrap()
                .is_err()
        );
    }

    #[test]
    fn unrelated_requests_are_ignored() {
        assert!(parse_callback("GET /favicon.ico HTTP/1.1").is_none());
        assert!(parse_callback("POST /callback?code=x HTTP/1.1").is_none());
        assert!(parse_callback("").is_none());
    }

    #[test]
    fn empty_port_range_is_a_configuration_error() {
        let err = bind_loopback((9001, 9000)).unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::Config);
    }
}
