//! Credential lifecycle: load the client identity, then reuse, refresh or
//! interactively bootstrap the token set.
//!
//! The lifecycle is an explicit state machine ([`AuthState`]) driven by
//! [`CredentialManager::resolve`]:
//!
//! ```text
//! Loading ──► Inspecting ──► Ready                 (stored token still valid)
//!    │            ├────────► Refreshing ──► Ready  (stored token expired)
//!    │            └────────► Bootstrapping ──► Ready (nothing stored)
//!    └─ any failure ──► Failed
//! ```
//!
//! `Ready` and `Failed` are terminal. The token store is written only while
//! refreshing or bootstrapping, and only after the provider accepted the grant.

use crate::error::{Error, Result};
use crate::identity::ClientIdentity;
use crate::oauth::OAuthProvider;
use crate::prompt::CodeProvider;
use crate::token::{TokenSet, TokenStore};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A time-bounded capability to call the mail API.
///
/// Only [`CredentialManager`] constructs handles.
#[derive(Clone)]
pub struct AuthorizationHandle {
    tokens: TokenSet,
    identity: Arc<ClientIdentity>,
}

impl AuthorizationHandle {
    fn new(tokens: TokenSet, identity: Arc<ClientIdentity>) -> Self {
        Self { tokens, identity }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(access_token: &str) -> Self {
        Self::new(
            TokenSet::new(
                access_token,
                None,
                Utc::now() + chrono::Duration::hours(1),
            ),
            Arc::new(ClientIdentity::new(
                "client-123",
                "secret-456",
                "urn:ietf:wg:oauth:2.0:oob",
            )),
        )
    }

    /// Returns the bearer token for API requests.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }

    /// Returns when the handle stops being valid.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.expires_at()
    }

    /// Returns `true` until the access token expires.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.tokens.is_expired_at(Utc::now())
    }

    /// Returns the client identity the tokens were issued to.
    #[must_use]
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }
}

impl std::fmt::Debug for AuthorizationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationHandle")
            .field("client_id", &self.identity.client_id())
            .field("tokens", &self.tokens)
            .finish()
    }
}

/// Names of the credential lifecycle states, for logging and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthPhase {
    /// Reading the client identity.
    Loading,
    /// Reading the token store and checking expiry.
    Inspecting,
    /// Exchanging the refresh token.
    Refreshing,
    /// Running the interactive authorization code flow.
    Bootstrapping,
    /// A valid handle is available.
    Ready,
    /// The lifecycle ended with an error.
    Failed,
}

impl std::fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthPhase::Loading => "loading",
            AuthPhase::Inspecting => "inspecting",
            AuthPhase::Refreshing => "refreshing",
            AuthPhase::Bootstrapping => "bootstrapping",
            AuthPhase::Ready => "ready",
            AuthPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A credential lifecycle state together with the data it carries.
#[derive(Debug)]
pub enum AuthState {
    /// Reading the client identity.
    Loading,
    /// Identity loaded; the token store has not been read yet.
    Inspecting(Arc<ClientIdentity>),
    /// The stored access token expired.
    Refreshing {
        /// The client to refresh as.
        identity: Arc<ClientIdentity>,
        /// The expired token set.
        tokens: TokenSet,
    },
    /// Nothing is stored yet.
    Bootstrapping(Arc<ClientIdentity>),
    /// Terminal success.
    Ready(AuthorizationHandle),
    /// Terminal failure carrying the originating error.
    Failed(Error),
}

impl AuthState {
    /// Returns the name of this state.
    #[must_use]
    pub fn phase(&self) -> AuthPhase {
        match self {
            AuthState::Loading => AuthPhase::Loading,
            AuthState::Inspecting(_) => AuthPhase::Inspecting,
            AuthState::Refreshing { .. } => AuthPhase::Refreshing,
            AuthState::Bootstrapping(_) => AuthPhase::Bootstrapping,
            AuthState::Ready(_) => AuthPhase::Ready,
            AuthState::Failed(_) => AuthPhase::Failed,
        }
    }

    /// Returns `true` for `Ready` and `Failed`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Ready(_) | AuthState::Failed(_))
    }

    fn from_result(result: Result<AuthorizationHandle>) -> Self {
        result.map_or_else(AuthState::Failed, AuthState::Ready)
    }
}

/// Produces a valid [`AuthorizationHandle`], refreshing or bootstrapping as needed.
///
/// Concurrent resolutions against the same store are not coordinated; callers
/// that share a store across processes must serialize them.
pub struct CredentialManager {
    descriptor_path: PathBuf,
    scopes: Vec<String>,
    store: Arc<dyn TokenStore>,
    oauth: Arc<dyn OAuthProvider>,
    prompt: Arc<dyn CodeProvider>,
}

impl CredentialManager {
    /// Creates a manager for the descriptor at `descriptor_path`.
    #[must_use]
    pub fn new(
        descriptor_path: impl AsRef<Path>,
        scopes: Vec<String>,
        store: Arc<dyn TokenStore>,
        oauth: Arc<dyn OAuthProvider>,
        prompt: Arc<dyn CodeProvider>,
    ) -> Self {
        Self {
            descriptor_path: descriptor_path.as_ref().to_path_buf(),
            scopes,
            store,
            oauth,
            prompt,
        }
    }

    /// Runs the lifecycle to a terminal state.
    ///
    /// # Errors
    ///
    /// - Configuration errors if the descriptor is missing or malformed (before any
    ///   network call)
    /// - Storage errors if the token store cannot be read or written
    /// - Authentication errors if the provider rejects the refresh token or code
    #[instrument(
        name = "CredentialManager::resolve",
        skip(self),
        fields(descriptor = %self.descriptor_path.display())
    )]
    pub async fn resolve(&self) -> Result<AuthorizationHandle> {
        let mut state = AuthState::Loading;
        loop {
            match state {
                AuthState::Ready(handle) => return Ok(handle),
                AuthState::Failed(error) => {
                    debug!(error = %error, "Credential resolution failed");
                    return Err(error);
                }
                current => {
                    let from = current.phase();
                    state = self.step(current).await;
                    debug!(%from, to = %state.phase(), "Credential state transition");
                }
            }
        }
    }

    /// Performs a single transition. Terminal states are returned unchanged.
    pub async fn step(&self, state: AuthState) -> AuthState {
        match state {
            AuthState::Loading => match ClientIdentity::load(&self.descriptor_path).await {
                Ok(identity) => AuthState::Inspecting(Arc::new(identity)),
                Err(error) => AuthState::Failed(error),
            },
            AuthState::Inspecting(identity) => self.inspect(identity).await,
            AuthState::Refreshing { identity, tokens } => {
                AuthState::from_result(self.refresh(identity, tokens).await)
            }
            AuthState::Bootstrapping(identity) => {
                AuthState::from_result(self.bootstrap(identity).await)
            }
            terminal @ (AuthState::Ready(_) | AuthState::Failed(_)) => terminal,
        }
    }

    async fn inspect(&self, identity: Arc<ClientIdentity>) -> AuthState {
        let tokens = match self.store.load().await {
            Ok(Some(tokens)) => tokens,
            Ok(None) => return AuthState::Bootstrapping(identity),
            Err(error) => return AuthState::Failed(error),
        };

        let time_left = tokens.time_left(Utc::now());
        if time_left <= chrono::Duration::zero() {
            debug!("Stored access token has expired");
            AuthState::Refreshing { identity, tokens }
        } else {
            debug!(
                minutes_left = time_left.num_minutes(),
                "Stored access token is still valid"
            );
            AuthState::Ready(AuthorizationHandle::new(tokens, identity))
        }
    }

    #[instrument(name = "CredentialManager::refresh", skip_all)]
    async fn refresh(
        &self,
        identity: Arc<ClientIdentity>,
        expired: TokenSet,
    ) -> Result<AuthorizationHandle> {
        let previous = expired.refresh_token.ok_or(Error::MissingRefreshToken)?;

        let refreshed = self
            .oauth
            .refresh(&identity, &previous)
            .await?
            .inherit_refresh_token(Some(&previous));

        self.store.save(&refreshed).await?;
        info!(expires_at = ?refreshed.expires_at(), "Access token refreshed and saved");

        Ok(AuthorizationHandle::new(refreshed, identity))
    }

    #[instrument(name = "CredentialManager::bootstrap", skip_all)]
    async fn bootstrap(&self, identity: Arc<ClientIdentity>) -> Result<AuthorizationHandle> {
        let url = self
            .oauth
            .authorization_url(&identity, &self.scopes, true)?;

        let code = self.prompt.authorization_code(&url).await?;
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::EmptyAuthorizationCode);
        }

        let tokens = self.oauth.exchange_code(&identity, code).await?;
        self.store.save(&tokens).await?;
        info!(
            refresh_token_issued = tokens.refresh_token.is_some(),
            "Authorization completed and tokens saved"
        );

        Ok(AuthorizationHandle::new(tokens, identity))
    }
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("descriptor_path", &self.descriptor_path)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, Grant};
    use crate::token::MemoryTokenStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const DESCRIPTOR: &str = r#"{"installed": {
        "client_id": "client-123",
        "client_secret": "secret-456",
        "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob"]
    }}"#;

    /// Scripted provider that counts every call.
    #[derive(Default)]
    struct FakeOAuth {
        refresh_response: Mutex<Option<Result<TokenSet>>>,
        exchange_response: Mutex<Option<Result<TokenSet>>>,
        refresh_calls: AtomicUsize,
        exchange_calls: AtomicUsize,
        url_calls: AtomicUsize,
        refreshed_with: Mutex<Option<String>>,
    }

    impl FakeOAuth {
        fn network_calls(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst) + self.exchange_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OAuthProvider for FakeOAuth {
        fn authorization_url(
            &self,
            identity: &ClientIdentity,
            _scopes: &[String],
            offline: bool,
        ) -> Result<String> {
            assert!(offline);
            self.url_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://consent.example/?client_id={}", identity.client_id()))
        }

        async fn exchange_code(&self, _identity: &ClientIdentity, code: &str) -> Result<TokenSet> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(code, "4/code");
            self.exchange_response
                .lock()
                .unwrap()
                .take()
                .expect("unexpected exchange")
        }

        async fn refresh(&self, _identity: &ClientIdentity, refresh_token: &str) -> Result<TokenSet> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            *self.refreshed_with.lock().unwrap() = Some(refresh_token.to_string());
            self.refresh_response
                .lock()
                .unwrap()
                .take()
                .expect("unexpected refresh")
        }
    }

    /// Store that counts saves.
    struct CountingStore {
        inner: MemoryTokenStore,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl TokenStore for CountingStore {
        async fn load(&self) -> Result<Option<TokenSet>> {
            self.inner.load().await
        }

        async fn save(&self, tokens: &TokenSet) -> Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(tokens).await
        }
    }

    struct FixedCode {
        calls: AtomicUsize,
        code: &'static str,
    }

    #[async_trait]
    impl CodeProvider for FixedCode {
        async fn authorization_code(&self, authorization_url: &str) -> Result<String> {
            assert!(authorization_url.contains("client-123"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.code.to_string())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        manager: CredentialManager,
        oauth: Arc<FakeOAuth>,
        store: Arc<CountingStore>,
        prompt: Arc<FixedCode>,
    }

    fn fixture(descriptor: &str, stored: Option<TokenSet>, oauth: FakeOAuth) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(&path, descriptor).unwrap();

        let store = Arc::new(CountingStore {
            inner: stored.map_or_else(MemoryTokenStore::new, MemoryTokenStore::with_tokens),
            saves: AtomicUsize::new(0),
        });
        let oauth = Arc::new(oauth);
        let prompt = Arc::new(FixedCode {
            calls: AtomicUsize::new(0),
            code: " 4/code\n",
        });

        let manager = CredentialManager::new(
            &path,
            vec!["scope".into()],
            store.clone(),
            oauth.clone(),
            prompt.clone(),
        );

        Fixture {
            _dir: dir,
            manager,
            oauth,
            store,
            prompt,
        }
    }

    fn tokens(access: &str, refresh: Option<&str>, expires_in: Duration) -> TokenSet {
        TokenSet::new(access, refresh.map(str::to_owned), Utc::now() + expires_in)
    }

    #[tokio::test]
    async fn test_valid_token_needs_no_network() {
        let stored = tokens("ya29.valid", Some("1//r"), Duration::minutes(30));
        let f = fixture(DESCRIPTOR, Some(stored), FakeOAuth::default());

        let handle = f.manager.resolve().await.unwrap();

        assert_eq!(handle.access_token(), "ya29.valid");
        assert!(handle.is_valid());
        assert_eq!(handle.identity().client_id(), "client-123");
        assert_eq!(f.oauth.network_calls(), 0);
        assert_eq!(f.store.saves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_once_and_keeps_refresh_token() {
        let stored = tokens("ya29.old", Some("1//keep-me"), -Duration::minutes(5));
        let oauth = FakeOAuth::default();
        *oauth.refresh_response.lock().unwrap() =
            Some(Ok(tokens("ya29.new", None, Duration::hours(1))));
        let f = fixture(DESCRIPTOR, Some(stored), oauth);

        let handle = f.manager.resolve().await.unwrap();

        assert_eq!(handle.access_token(), "ya29.new");
        assert_eq!(f.oauth.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.oauth.exchange_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            f.oauth.refreshed_with.lock().unwrap().as_deref(),
            Some("1//keep-me")
        );
        assert_eq!(f.store.saves.load(Ordering::SeqCst), 1);

        let persisted = f.store.inner.snapshot().unwrap();
        assert_eq!(persisted.access_token, "ya29.new");
        assert_eq!(persisted.refresh_token.as_deref(), Some("1//keep-me"));
    }

    #[tokio::test]
    async fn test_rejected_refresh_leaves_store_untouched() {
        let stored = tokens("ya29.old", Some("1//revoked"), -Duration::minutes(5));
        let oauth = FakeOAuth::default();
        *oauth.refresh_response.lock().unwrap() = Some(Err(Error::AuthorizationRejected {
            grant: Grant::RefreshToken,
            status: 400,
            reason: "invalid_grant".into(),
        }));
        let f = fixture(DESCRIPTOR, Some(stored.clone()), oauth);

        let err = f.manager.resolve().await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(f.store.saves.load(Ordering::SeqCst), 0);
        assert_eq!(f.store.inner.snapshot(), Some(stored));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_fails() {
        let stored = tokens("ya29.old", None, -Duration::minutes(5));
        let f = fixture(DESCRIPTOR, Some(stored), FakeOAuth::default());

        let err = f.manager.resolve().await.unwrap_err();

        assert!(matches!(err, Error::MissingRefreshToken));
        assert_eq!(f.oauth.network_calls(), 0);
        assert_eq!(f.prompt.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_when_nothing_stored() {
        let oauth = FakeOAuth::default();
        *oauth.exchange_response.lock().unwrap() =
            Some(Ok(tokens("ya29.first", Some("1//first"), Duration::hours(1))));
        let f = fixture(DESCRIPTOR, None, oauth);

        let handle = f.manager.resolve().await.unwrap();

        assert_eq!(handle.access_token(), "ya29.first");
        assert_eq!(f.oauth.url_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.prompt.calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.oauth.exchange_calls.load(Ordering::SeqCst), 1);
        assert_eq!(f.store.saves.load(Ordering::SeqCst), 1);
        assert_eq!(
            f.store.inner.snapshot().unwrap().refresh_token.as_deref(),
            Some("1//first")
        );
    }

    #[tokio::test]
    async fn test_rejected_code_does_not_persist() {
        let oauth = FakeOAuth::default();
        *oauth.exchange_response.lock().unwrap() = Some(Err(Error::AuthorizationRejected {
            grant: Grant::AuthorizationCode,
            status: 400,
            reason: "invalid_grant".into(),
        }));
        let f = fixture(DESCRIPTOR, None, oauth);

        let err = f.manager.resolve().await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Authentication);
        assert_eq!(f.store.saves.load(Ordering::SeqCst), 0);
        assert!(f.store.inner.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_bad_descriptor_fails_before_network() {
        let descriptors = [
            "not json",
            r#"{"installed": {"client_secret": "s", "redirect_uris": ["r"]}}"#,
            r#"{"installed": {"client_id": "i", "redirect_uris": ["r"]}}"#,
            r#"{"installed": {"client_id": "i", "client_secret": "s"}}"#,
        ];

        for descriptor in descriptors {
            let stored = tokens("ya29.old", Some("1//r"), -Duration::minutes(5));
            let f = fixture(descriptor, Some(stored), FakeOAuth::default());

            let err = f.manager.resolve().await.unwrap_err();

            assert_eq!(err.category(), ErrorCategory::Configuration, "{descriptor}");
            assert_eq!(f.oauth.network_calls(), 0);
            assert_eq!(f.oauth.url_calls.load(Ordering::SeqCst), 0);
            assert_eq!(f.store.saves.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_step_walks_expected_phases() {
        let stored = tokens("ya29.old", Some("1//r"), -Duration::minutes(5));
        let oauth = FakeOAuth::default();
        *oauth.refresh_response.lock().unwrap() =
            Some(Ok(tokens("ya29.new", None, Duration::hours(1))));
        let f = fixture(DESCRIPTOR, Some(stored), oauth);

        let mut state = AuthState::Loading;
        let mut phases = vec![state.phase()];
        while !state.is_terminal() {
            state = f.manager.step(state).await;
            phases.push(state.phase());
        }

        assert_eq!(
            phases,
            vec![
                AuthPhase::Loading,
                AuthPhase::Inspecting,
                AuthPhase::Refreshing,
                AuthPhase::Ready
            ]
        );
    }

    #[tokio::test]
    async fn test_terminal_states_do_not_transition() {
        let f = fixture(DESCRIPTOR, None, FakeOAuth::default());

        let failed = f.manager.step(AuthState::Failed(Error::MissingRefreshToken)).await;
        assert_eq!(failed.phase(), AuthPhase::Failed);

        let handle = AuthorizationHandle::new(
            tokens("ya29", None, Duration::hours(1)),
            Arc::new(ClientIdentity::new("i", "s", "r")),
        );
        let ready = f.manager.step(AuthState::Ready(handle)).await;
        assert_eq!(ready.phase(), AuthPhase::Ready);
        assert_eq!(f.oauth.network_calls(), 0);
    }
}
