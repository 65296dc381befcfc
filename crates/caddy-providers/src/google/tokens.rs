//! File-backed token storage.
//!
//! The credential is a single JSON blob under the app's config directory,
//! written atomically (temp file + rename) with owner-only permissions.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::credential::TokenInfo;
use crate::error::{ProviderError, ProviderResult};

/// Persisted token storage with an in-memory copy.
#[derive(Debug)]
pub struct TokenStorage {
    /// Path to the token file.
    path: PathBuf,

    /// In-memory cache of the current tokens.
    tokens: RwLock<Option<TokenInfo>>,
}

impl TokenStorage {
    /// Creates a new token storage at the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tokens: RwLock::new(None),
        }
    }

    /// Loads tokens from disk into memory.
    ///
    /// Returns `Ok(true)` if tokens were loaded, `Ok(false)` if no token
    /// file exists. A corrupt file is an error and leaves memory empty.
    pub fn load(&self) -> ProviderResult<bool> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token file");
            self.replace(None);
            return Ok(false);
        }

        let loaded = fs::read_to_string(&self.path)
            .map_err(|e| {
                ProviderError::configuration(format!("failed to read token file: {}", e))
                    .with_source(e)
            })
            .and_then(|content| {
                serde_json::from_str::<TokenInfo>(&content).map_err(|e| {
                    ProviderError::configuration(format!("failed to parse token file: {}", e))
                        .with_source(e)
                })
            });

        match loaded {
            Ok(tokens) => {
                debug!(path = %self.path.display(), "loaded tokens");
                self.replace(Some(tokens));
                Ok(true)
            }
            Err(e) => {
                self.replace(None);
                Err(e)
            }
        }
    }

    /// Returns a clone of the current tokens, if any.
    pub fn get(&self) -> Option<TokenInfo> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sets new tokens and saves them to disk.
    pub fn set(&self, tokens: TokenInfo) -> ProviderResult<()> {
        self.write_file(&tokens)?;
        self.replace(Some(tokens));
        Ok(())
    }

    /// Updates the access token and saves to disk.
    pub fn update_access_token(
        &self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) -> ProviderResult<TokenInfo> {
        let mut tokens = self
            .get()
            .ok_or_else(|| ProviderError::internal("no tokens to update"))?;
        tokens.update_access_token(access_token, expires_in_secs);
        self.set(tokens.clone())?;
        Ok(tokens)
    }

    /// Clears the stored tokens (both in memory and on disk).
    pub fn clear(&self) -> ProviderResult<()> {
        self.replace(None);
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                ProviderError::configuration(format!("failed to remove token file: {}", e))
                    .with_source(e)
            })?;
            info!(path = %self.path.display(), "cleared tokens");
        }
        Ok(())
    }

    /// Returns the token storage path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replace(&self, tokens: Option<TokenInfo>) {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = tokens;
    }

    fn write_file(&self, tokens: &TokenInfo) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {}", e))
                    .with_source(e)
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(tokens)
            .map_err(|e| ProviderError::internal(format!("failed to serialize tokens: {}", e)))?;

        write_private(&temp_path, content.as_bytes()).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {}", e))
                .with_source(e)
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to rename token file: {}", e))
                .with_source(e)
        })?;

        debug!(path = %self.path.display(), "saved tokens");
        Ok(())
    }
}

/// Writes `content` to a file only the owner can read.
///
/// The mode is set when the file is created, and tightened again in case a
/// stale temp file with looser permissions was left behind. Nothing is
/// written if that fails.
#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;

    file.set_permissions(fs::Permissions::from_mode(0o600))
        .inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "failed to restrict token file permissions");
        })?;

    file.write_all(content)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    fs::write(path, content)
}
