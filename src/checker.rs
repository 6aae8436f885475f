//! One-shot inbox check: resolve credentials, then scan.
//!
//! [`InboxChecker`] wires the credential manager and the mailbox scanner
//! together. Every collaborator can be swapped through [`InboxCheckerBuilder`];
//! the defaults talk to Google over HTTPS, keep tokens in a file and prompt on
//! the terminal.
//!
//! # Example
//!
//! ```no_run
//! use email_check::{CheckerConfig, InboxChecker};
//!
//! # async fn example() -> email_check::Result<()> {
//! let config = CheckerConfig::builder()
//!     .client_secret_path("client_secret.json")
//!     .verbose(true)
//!     .build()?;
//!
//! let checker = InboxChecker::new(config)?;
//! match checker.check("Shop <orders@shop.example>", r"/order id: (\d+)/").await? {
//!     Some(order) => println!("order {order}"),
//!     None => println!("nothing yet"),
//! }
//! # Ok(())
//! # }
//! ```

use crate::auth::CredentialManager;
use crate::config::CheckerConfig;
use crate::error::{Error, Result};
use crate::gmail::{GmailClient, MailApi};
use crate::matcher::Matcher;
use crate::oauth::{GoogleOAuth, OAuthProvider};
use crate::pattern::compile_pattern;
use crate::prompt::{CodeProvider, StdinPrompt};
use crate::scanner::MailboxScanner;
use crate::token::{FileTokenStore, TokenStore};
use std::sync::Arc;
use tracing::instrument;

/// Checks a Gmail inbox for the first unread message from a sender.
///
/// Create using [`InboxChecker::new`] or [`InboxChecker::builder`].
pub struct InboxChecker {
    config: CheckerConfig,
    credentials: CredentialManager,
    scanner: MailboxScanner,
}

impl InboxChecker {
    /// Creates a checker with the default collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HttpClient`] or [`Error::InvalidConfig`] if the HTTP
    /// transport (including the proxy) cannot be built.
    pub fn new(config: CheckerConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Starts a builder for overriding collaborators.
    #[must_use]
    pub fn builder(config: CheckerConfig) -> InboxCheckerBuilder {
        InboxCheckerBuilder {
            config,
            token_store: None,
            oauth: None,
            mail_api: None,
            code_provider: None,
        }
    }

    /// Returns the extracted content of the first unread message from `sender`.
    ///
    /// `pattern` is either `/body/flags` or a bare regex; see
    /// [`compile_pattern`](crate::pattern::compile_pattern). Inputs are validated
    /// and the pattern compiled before any file or network access.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingInput`] if `sender` or `pattern` is empty
    /// - pattern errors if `pattern` does not compile
    /// - credential errors from loading, refreshing or authorizing
    /// - API errors from the scan
    #[instrument(name = "InboxChecker::check", skip_all, fields(sender = %sender))]
    pub async fn check(&self, sender: &str, pattern: &str) -> Result<Option<String>> {
        validate_inputs(sender, pattern)?;
        let compiled = compile_pattern(pattern)?;
        self.run(sender, &compiled).await
    }

    /// Like [`check`](Self::check), with a caller-supplied matcher.
    ///
    /// # Errors
    ///
    /// Same as [`check`](Self::check), minus pattern errors.
    #[instrument(
        name = "InboxChecker::check_with_matcher",
        skip_all,
        fields(sender = %sender, matcher = %matcher.description())
    )]
    pub async fn check_with_matcher(
        &self,
        sender: &str,
        matcher: &dyn Matcher,
    ) -> Result<Option<String>> {
        require("sender", sender)?;
        self.run(sender, matcher).await
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    async fn run(&self, sender: &str, matcher: &dyn Matcher) -> Result<Option<String>> {
        let auth = self.credentials.resolve().await?;
        self.scanner.scan(&auth, sender, matcher).await
    }
}

impl std::fmt::Debug for InboxChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboxChecker")
            .field("client_secret_path", &self.config.client_secret_path)
            .field("token_path", &self.config.token_path)
            .field("proxy_enabled", &self.config.proxy.is_some())
            .field("verbose", &self.config.verbose)
            .finish_non_exhaustive()
    }
}

/// Builder for [`InboxChecker`].
pub struct InboxCheckerBuilder {
    config: CheckerConfig,
    token_store: Option<Arc<dyn TokenStore>>,
    oauth: Option<Arc<dyn OAuthProvider>>,
    mail_api: Option<Arc<dyn MailApi>>,
    code_provider: Option<Arc<dyn CodeProvider>>,
}

impl InboxCheckerBuilder {
    /// Replaces the file token store at `config.token_path`.
    #[must_use]
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Replaces the Google OAuth client.
    #[must_use]
    pub fn oauth(mut self, oauth: Arc<dyn OAuthProvider>) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Replaces the Gmail REST client.
    #[must_use]
    pub fn mail_api(mut self, api: Arc<dyn MailApi>) -> Self {
        self.mail_api = Some(api);
        self
    }

    /// Replaces the terminal prompt used during first-time authorization.
    #[must_use]
    pub fn code_provider(mut self, provider: Arc<dyn CodeProvider>) -> Self {
        self.code_provider = Some(provider);
        self
    }

    /// Builds the checker.
    ///
    /// The HTTP transport is only built when a default Google client is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built.
    pub fn build(self) -> Result<InboxChecker> {
        let config = self.config;

        let mut http: Option<reqwest::Client> = None;
        let mut shared_http = || -> Result<reqwest::Client> {
            if let Some(client) = &http {
                return Ok(client.clone());
            }
            let client = config.http_client()?;
            http = Some(client.clone());
            Ok(client)
        };

        let oauth: Arc<dyn OAuthProvider> = match self.oauth {
            Some(oauth) => oauth,
            None => Arc::new(GoogleOAuth::new(shared_http()?, &config.endpoints)),
        };
        let mail_api: Arc<dyn MailApi> = match self.mail_api {
            Some(api) => api,
            None => Arc::new(GmailClient::new(shared_http()?, &config)),
        };
        let token_store = self
            .token_store
            .unwrap_or_else(|| Arc::new(FileTokenStore::new(&config.token_path)));
        let code_provider = self
            .code_provider
            .unwrap_or_else(|| Arc::new(StdinPrompt));

        let credentials = CredentialManager::new(
            &config.client_secret_path,
            config.scopes.clone(),
            token_store,
            oauth,
            code_provider,
        );
        let scanner = MailboxScanner::new(mail_api, config.verbose);

        Ok(InboxChecker {
            config,
            credentials,
            scanner,
        })
    }
}

impl std::fmt::Debug for InboxCheckerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboxCheckerBuilder")
            .field("config", &self.config)
            .field("custom_token_store", &self.token_store.is_some())
            .field("custom_oauth", &self.oauth.is_some())
            .field("custom_mail_api", &self.mail_api.is_some())
            .field("custom_code_provider", &self.code_provider.is_some())
            .finish()
    }
}

/// Rejects empty sender or pattern before any I/O.
pub(crate) fn validate_inputs(sender: &str, pattern: &str) -> Result<()> {
    require("sender", sender)?;
    require("pattern", pattern)
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::MissingInput { field });
    }
    Ok(())
}
