//! Configuration for the inbox checker.
//!
//! Use [`CheckerConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use email_check::CheckerConfig;
//!
//! let config = CheckerConfig::builder()
//!     .client_secret_path("secrets/client_secret.json")
//!     .token_path("secrets/token.json")
//!     .verbose(true)
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{Error, Result};
use crate::proxy::Socks5Proxy;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the OAuth2 client credential descriptor.
pub const DEFAULT_CLIENT_SECRET_PATH: &str = "client_secret.json";

/// Default location of the persisted token set.
pub const DEFAULT_TOKEN_PATH: &str = "token.json";

/// Read-only Gmail scope.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// Gmail scope allowing label changes (needed to mark messages read).
pub const GMAIL_MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";

/// Configuration for checking a Gmail inbox.
///
/// Create using [`CheckerConfig::builder()`].
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Path of the OAuth2 client credential descriptor (`{"installed": {...}}`).
    pub client_secret_path: PathBuf,
    /// Path of the persisted token set.
    pub token_path: PathBuf,
    /// OAuth scopes requested during interactive authorization.
    pub scopes: Vec<String>,
    /// Provider endpoints.
    pub endpoints: Endpoints,
    /// Mailbox query selecting the messages to scan.
    pub query: String,
    /// Upper bound on the number of unread messages listed per check.
    pub max_results: u32,
    /// Optional SOCKS5 proxy for every HTTP request.
    pub proxy: Option<Socks5Proxy>,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
    /// Emit progress messages at `info` level instead of `debug`.
    pub verbose: bool,
}

/// OAuth and Gmail API endpoints.
///
/// The defaults point at Google; tests point them at a local mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Authorization page the user visits during bootstrap.
    pub auth_url: String,
    /// Token endpoint for code exchange and refresh.
    pub token_url: String,
    /// Gmail REST API base, without a trailing slash.
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            api_base: "https://gmail.googleapis.com/gmail/v1".into(),
        }
    }
}

impl Endpoints {
    /// Points every endpoint at `base`, using Google's relative paths.
    ///
    /// Mostly useful for tests against a mock server.
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_url: format!("{base}/o/oauth2/v2/auth"),
            token_url: format!("{base}/token"),
            api_base: format!("{base}/gmail/v1"),
        }
    }
}

/// Timeout configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing a connection.
    pub connect: Duration,
    /// Timeout for a complete request, response body included.
    pub request: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: Duration::from_secs(60),
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            client_secret_path: PathBuf::from(DEFAULT_CLIENT_SECRET_PATH),
            token_path: PathBuf::from(DEFAULT_TOKEN_PATH),
            scopes: default_scopes(),
            endpoints: Endpoints::default(),
            query: "is:unread".into(),
            max_results: 100,
            proxy: None,
            timeouts: TimeoutConfig::default(),
            verbose: false,
        }
    }
}

fn default_scopes() -> Vec<String> {
    vec![GMAIL_READONLY_SCOPE.into(), GMAIL_MODIFY_SCOPE.into()]
}

impl CheckerConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> CheckerConfigBuilder {
        CheckerConfigBuilder::default()
    }

    /// Builds the shared HTTP client used by the OAuth and Gmail clients.
    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.timeouts.connect)
            .timeout(self.timeouts.request);

        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        builder.build().map_err(|source| Error::HttpClient { source })
    }
}

/// Builder for [`CheckerConfig`].
#[derive(Debug, Default)]
pub struct CheckerConfigBuilder {
    client_secret_path: Option<PathBuf>,
    token_path: Option<PathBuf>,
    scopes: Option<Vec<String>>,
    endpoints: Option<Endpoints>,
    query: Option<String>,
    max_results: Option<u32>,
    proxy: Option<Socks5Proxy>,
    timeouts: Option<TimeoutConfig>,
    verbose: bool,
}

impl CheckerConfigBuilder {
    /// Sets the path of the OAuth2 client credential descriptor.
    ///
    /// Defaults to `client_secret.json` in the working directory.
    #[must_use]
    pub fn client_secret_path(mut self, path: impl AsRef<Path>) -> Self {
        self.client_secret_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the path of the persisted token set.
    ///
    /// Defaults to `token.json` in the working directory.
    #[must_use]
    pub fn token_path(mut self, path: impl AsRef<Path>) -> Self {
        self.token_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replaces the requested OAuth scopes.
    #[must_use]
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    /// Overrides the provider endpoints.
    #[must_use]
    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    /// Overrides the mailbox query (default `is:unread`).
    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets how many unread messages are listed per check (1-500).
    #[must_use]
    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Sets a SOCKS5 proxy for every HTTP request.
    #[must_use]
    pub fn proxy(mut self, proxy: Socks5Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets the whole-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .request = timeout;
        self
    }

    /// Reports progress at `info` level.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a path or the query is empty, no scope is
    /// requested, or `max_results` is outside 1-500.
    pub fn build(self) -> Result<CheckerConfig> {
        let defaults = CheckerConfig::default();

        let client_secret_path = self
            .client_secret_path
            .unwrap_or(defaults.client_secret_path);
        if client_secret_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig {
                message: "client secret path must not be empty".into(),
            });
        }

        let token_path = self.token_path.unwrap_or(defaults.token_path);
        if token_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig {
                message: "token path must not be empty".into(),
            });
        }

        let scopes = self.scopes.unwrap_or(defaults.scopes);
        if scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(Error::InvalidConfig {
                message: "at least one OAuth scope is required".into(),
            });
        }

        let query = self.query.unwrap_or(defaults.query);
        if query.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "mailbox query must not be empty".into(),
            });
        }

        let max_results = self.max_results.unwrap_or(defaults.max_results);
        if !(1..=500).contains(&max_results) {
            return Err(Error::InvalidConfig {
                message: format!("max_results must be within 1-500, got {max_results}"),
            });
        }

        Ok(CheckerConfig {
            client_secret_path,
            token_path,
            scopes,
            endpoints: self.endpoints.unwrap_or(defaults.endpoints),
            query,
            max_results,
            proxy: self.proxy,
            timeouts: self.timeouts.unwrap_or(defaults.timeouts),
            verbose: self.verbose,
        })
    }
}
