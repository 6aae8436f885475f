//! OAuth2 token sets and their persistence.
//!
//! The [`TokenStore`] trait is the seam between the credential state machine and
//! wherever tokens live. [`FileTokenStore`] keeps them in a JSON file and replaces
//! it atomically; [`MemoryTokenStore`] keeps them in memory for tests and for
//! deployments that inject tokens from elsewhere.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, instrument};

/// An access token, its optional refresh token and the access token's expiry.
///
/// Serialized as `{"access_token", "refresh_token"?, "expiry_date", ...}` where
/// `expiry_date` is milliseconds since the Unix epoch.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Short-lived bearer token for API calls.
    pub access_token: String,
    /// Long-lived token used to obtain new access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry of `access_token` in milliseconds since the Unix epoch.
    /// `None` is treated as already expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
    /// Space-separated scopes granted by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Token type, normally `Bearer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl TokenSet {
    /// Creates a token set expiring at `expires_at`.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expiry_date: Some(expires_at.timestamp_millis()),
            scope: None,
            token_type: None,
        }
    }

    /// Returns the expiry as a timestamp, if known.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_date
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Returns the time left before the access token expires.
    ///
    /// An unknown expiry counts as zero time left.
    #[must_use]
    pub fn time_left(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at()
            .map_or_else(Duration::zero, |expiry| expiry - now)
    }

    /// Returns `true` if the access token is no longer usable at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.time_left(now) <= Duration::zero()
    }

    /// Fills in a missing refresh token from a previously known one.
    ///
    /// Providers usually omit the refresh token from refresh responses.
    #[must_use]
    pub fn inherit_refresh_token(mut self, previous: Option<&str>) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.map(str::to_owned);
        }
        self
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &mask_token(&self.access_token))
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(mask_token),
            )
            .field("expires_at", &self.expires_at())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Masks a token for log output: the first 4 characters, then `***`.
#[must_use]
pub fn mask_token(token: &str) -> String {
    match token.char_indices().nth(4) {
        Some((idx, _)) => format!("{}***", &token[..idx]),
        None => "***".to_string(),
    }
}

/// Durable storage for the token set.
///
/// Implementations must make `save` atomic with respect to concurrent readers.
/// They do not need to provide inter-process locking.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Loads the stored token set, or `None` if nothing has been stored yet.
    async fn load(&self) -> Result<Option<TokenSet>>;

    /// Replaces the stored token set.
    async fn save(&self, tokens: &TokenSet) -> Result<()>;
}

/// Token store backed by a JSON file.
///
/// Writes go to a sibling temporary file which is then renamed over the target,
/// so readers never observe a partially written token set.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Creates a store at `path`. Nothing is read or written until used.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the store file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::TokenStoreWrite {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    #[instrument(name = "FileTokenStore::load", skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<TokenSet>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored tokens");
                return Ok(None);
            }
            Err(source) => {
                return Err(Error::TokenStoreRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let tokens: TokenSet =
            serde_json::from_str(&raw).map_err(|source| Error::TokenStoreParse {
                path: self.path.clone(),
                source,
            })?;

        debug!(expires_at = ?tokens.expires_at(), "Loaded stored tokens");
        Ok(Some(tokens))
    }

    #[instrument(name = "FileTokenStore::save", skip_all, fields(path = %self.path.display()))]
    async fn save(&self, tokens: &TokenSet) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(e))?;
        }

        let content = serde_json::to_vec_pretty(tokens)
            .map_err(|e| self.write_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| self.write_error(e))?;
        restrict_permissions(&temp_path)
            .await
            .map_err(|e| self.write_error(e))?;

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(self.write_error(e));
        }

        debug!("Saved tokens");
        Ok(())
    }
}

/// Owner read/write only; tokens grant mailbox access.
#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// In-memory token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenSet>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `tokens`.
    #[must_use]
    pub fn with_tokens(tokens: TokenSet) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    /// Returns a copy of the currently stored tokens.
    #[must_use]
    pub fn snapshot(&self) -> Option<TokenSet> {
        self.tokens
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<TokenSet>> {
        Ok(self.snapshot())
    }

    async fn save(&self, tokens: &TokenSet) -> Result<()> {
        *self
            .tokens
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(tokens.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TokenSet {
        TokenSet {
            access_token: "ya29.access".into(),
            refresh_token: Some("1//refresh".into()),
            expiry_date: Some(1_700_000_000_000),
            scope: Some("https://www.googleapis.com/auth/gmail.modify".into()),
            token_type: Some("Bearer".into()),
        }
    }

    #[test]
    fn test_expiry_arithmetic() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let fresh = TokenSet::new("a", None, now + Duration::minutes(30));
        assert!(!fresh.is_expired_at(now));
        assert_eq!(fresh.time_left(now).num_minutes(), 30);

        let stale = TokenSet::new("a", None, now - Duration::seconds(1));
        assert!(stale.is_expired_at(now));

        // Expiring exactly now counts as expired
        let edge = TokenSet::new("a", None, now);
        assert!(edge.is_expired_at(now));

        let unknown = TokenSet {
            expiry_date: None,
            ..sample()
        };
        assert!(unknown.is_expired_at(now));
    }

    #[test]
    fn test_inherit_refresh_token() {
        let refreshed = TokenSet::new("new", None, Utc::now());
        let merged = refreshed.inherit_refresh_token(Some("old-refresh"));
        assert_eq!(merged.refresh_token.as_deref(), Some("old-refresh"));

        // A rotated refresh token wins over the previous one
        let rotated = TokenSet::new("new", Some("rotated".into()), Utc::now());
        let merged = rotated.inherit_refresh_token(Some("old-refresh"));
        assert_eq!(merged.refresh_token.as_deref(), Some("rotated"));
    }

    #[test]
    fn test_wire_format() {
        let tokens: TokenSet = serde_json::from_str(
            r#"{"access_token":"abc","refresh_token":"def","expiry_date":1700000000000,"id_token":"ignored"}"#,
        )
        .unwrap();
        assert_eq!(tokens.access_token, "abc");
        assert_eq!(tokens.refresh_token.as_deref(), Some("def"));
        assert_eq!(tokens.expiry_date, Some(1_700_000_000_000));

        let json = serde_json::to_value(TokenSet::new("abc", None, Utc::now())).unwrap();
        assert!(json.get("refresh_token").is_none());
        assert!(json.get("expiry_date").is_some());
    }

    #[test]
    fn test_debug_masks_tokens() {
        let debug_str = format!("{:?}", sample());
        assert!(!debug_str.contains("ya29.access"));
        assert!(!debug_str.contains("1//refresh"));
        assert!(debug_str.contains("ya29***"));
        assert_eq!(mask_token("abc"), "***");
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("token.json"));

        assert_eq!(store.load().await.unwrap(), None);

        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample()));
        assert!(!store.temp_path().exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileTokenStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, Error::TokenStoreParse { .. }));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryTokenStore::new();
        assert!(store.load().await.unwrap().is_none());
        store.save(&sample()).await.unwrap();
        assert_eq!(store.snapshot(), Some(sample()));
    }
}
