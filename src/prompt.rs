//! Sources of the one-time OAuth2 authorization code.
//!
//! Bootstrap suspends on a single [`CodeProvider::authorization_code`] call. The
//! default [`StdinPrompt`] prints the consent URL and reads one line from standard
//! input; [`StaticCode`] supplies a code obtained out of band and [`NoPrompt`]
//! fails fast in unattended deployments.

use crate::error::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Supplies the authorization code for a consent URL.
#[async_trait]
pub trait CodeProvider: Send + Sync {
    /// Presents `authorization_url` and waits for the resulting code.
    async fn authorization_code(&self, authorization_url: &str) -> Result<String>;
}

/// Prompts on the terminal: prints the URL, reads one line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

#[async_trait]
impl CodeProvider for StdinPrompt {
    async fn authorization_code(&self, authorization_url: &str) -> Result<String> {
        let prompt_error = |source| Error::CodePrompt { source };

        let mut stdout = tokio::io::stdout();
        let banner = format!(
            "Authorize this app by visiting this url: {authorization_url}\n\
             Enter the code from that page here: "
        );
        stdout
            .write_all(banner.as_bytes())
            .await
            .map_err(prompt_error)?;
        stdout.flush().await.map_err(prompt_error)?;

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(prompt_error)?;
        if read == 0 {
            return Err(Error::CodePrompt {
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "stdin closed before a code was entered",
                ),
            });
        }

        Ok(line.trim().to_string())
    }
}

/// A code obtained out of band, e.g. from an environment variable.
#[derive(Debug, Clone)]
pub struct StaticCode {
    code: SecretString,
}

impl StaticCode {
    /// Wraps a pre-supplied authorization code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: SecretString::from(code.into()),
        }
    }
}

#[async_trait]
impl CodeProvider for StaticCode {
    async fn authorization_code(&self, _authorization_url: &str) -> Result<String> {
        Ok(self.code.expose_secret().trim().to_string())
    }
}

/// Refuses to prompt; bootstrap fails with [`Error::InteractionRequired`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait]
impl CodeProvider for NoPrompt {
    async fn authorization_code(&self, authorization_url: &str) -> Result<String> {
        Err(Error::InteractionRequired {
            url: authorization_url.to_string(),
        })
    }
}
