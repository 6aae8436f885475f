//! SOCKS5 proxy configuration for the HTTPS transport.
//!
//! Both the OAuth token endpoint and the Gmail API are reached through the same
//! HTTP client, so a single proxy setting covers every network call the crate makes.
//!
//! # Example
//!
//! ```
//! use email_check::Socks5Proxy;
//!
//! // Without authentication
//! let proxy = Socks5Proxy::new("proxy.example.com", 1080);
//!
//! // With authentication
//! let proxy = Socks5Proxy::with_auth("proxy.example.com", 1080, "username", "password");
//! ```

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// SOCKS5 proxy configuration.
///
/// Host names are resolved by the proxy (`socks5h`), so DNS lookups for Google
/// endpoints do not leak from the local machine.
#[derive(Debug, Clone)]
pub struct Socks5Proxy {
    /// Proxy server hostname or IP address.
    pub host: String,
    /// Proxy server port.
    pub port: u16,
    /// Optional authentication credentials.
    pub auth: Option<ProxyAuth>,
}

/// Authentication credentials for SOCKS5 proxy.
#[derive(Debug, Clone)]
pub struct ProxyAuth {
    /// Username for proxy authentication.
    pub username: String,
    /// Password for proxy authentication.
    pub password: SecretString,
}

impl Socks5Proxy {
    /// Creates a new SOCKS5 proxy configuration without authentication.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            auth: None,
        }
    }

    /// Creates a new SOCKS5 proxy configuration with authentication.
    #[must_use]
    pub fn with_auth(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            auth: Some(ProxyAuth {
                username: username.into(),
                password: SecretString::from(password.into()),
            }),
        }
    }

    /// Returns the proxy address as "host:port".
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns `true` if this proxy requires authentication.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.auth.is_some()
    }

    /// Builds the proxy URL, credentials included and percent-encoded.
    pub(crate) fn url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!("socks5h://{}", self.address())).map_err(|e| {
            Error::InvalidConfig {
                message: format!("invalid proxy address {}: {e}", self.address()),
            }
        })?;

        if let Some(auth) = &self.auth {
            let rejected = || Error::InvalidConfig {
                message: format!("proxy {} does not accept credentials", self.address()),
            };
            url.set_username(&auth.username).map_err(|()| rejected())?;
            url.set_password(Some(auth.password.expose_secret()))
                .map_err(|()| rejected())?;
        }

        Ok(url)
    }

    /// Converts this configuration into a proxy for the HTTP client.
    pub(crate) fn to_reqwest(&self) -> Result<reqwest::Proxy> {
        reqwest::Proxy::all(self.url()?.as_str()).map_err(|source| Error::HttpClient { source })
    }
}

impl std::fmt::Display for Socks5Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.auth {
            Some(auth) => write!(
                f,
                "socks5h://{}:***@{}:{}",
                auth.username, self.host, self.port
            ),
            None => write!(f, "socks5h://{}:{}", self.host, self.port),
        }
    }
}
