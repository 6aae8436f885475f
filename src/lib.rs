//! # email-check
//!
//! One-shot Gmail inbox check: authorize with OAuth2, find the first unread
//! message from a sender, extract content from its plain-text body with a
//! pattern and mark the message read.
//!
//! The crate has two moving parts:
//! - a credential lifecycle ([`CredentialManager`]) that reuses a stored token,
//!   refreshes an expired one, or runs the interactive authorization code flow
//!   once and persists the result
//! - a mailbox scanner ([`MailboxScanner`]) that lists unread messages, filters
//!   on the `From` header, decodes the body, matches and marks read
//!
//! [`InboxChecker`] ties them together; [`check`] is the shortest path.
//!
//! ## Quick Start
//!
//! ```no_run
//! use email_check::config::DEFAULT_CLIENT_SECRET_PATH;
//!
//! # async fn example() -> email_check::Result<()> {
//! let order = email_check::check(
//!     "Shop <orders@shop.example>",
//!     r"/order id: (\d+)/",
//!     DEFAULT_CLIENT_SECRET_PATH,
//!     true,
//! )
//! .await?;
//!
//! match order {
//!     Some(id) => println!("Order {id}"),
//!     None => println!("No matching message"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Patterns
//!
//! Patterns are written `/body/flags` (flags from `gimsuy`) or as a bare regex.
//! If the pattern has a capture group the first group is returned, otherwise
//! the whole match:
//!
//! ```
//! use email_check::matcher::Matcher;
//! use email_check::pattern::compile_pattern;
//!
//! let pattern = compile_pattern(r"/ID: (\d+)/i").unwrap();
//! assert_eq!(pattern.find_match("order id: 7788").as_deref(), Some("7788"));
//! ```
//!
//! ## Custom Collaborators
//!
//! Token storage, the OAuth client, the mail API and the code prompt are traits.
//! Unattended deployments typically supply the one-time code up front:
//!
//! ```no_run
//! use email_check::prompt::StaticCode;
//! use email_check::{CheckerConfig, InboxChecker};
//! use std::sync::Arc;
//!
//! # async fn example() -> email_check::Result<()> {
//! let checker = InboxChecker::builder(CheckerConfig::default())
//!     .code_provider(Arc::new(StaticCode::new("4/0Aabc...")))
//!     .build()?;
//! let result = checker.check("alerts@bank.example", "/code: (\\d{6})/").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using a SOCKS5 Proxy
//!
//! ```no_run
//! use email_check::{CheckerConfig, InboxChecker, Socks5Proxy};
//!
//! # async fn example() -> email_check::Result<()> {
//! let config = CheckerConfig::builder()
//!     .proxy(Socks5Proxy::with_auth("proxy.example.com", 1080, "user", "pass"))
//!     .build()?;
//! let checker = InboxChecker::new(config)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is an [`Error`] variant with structured context. "Nothing
//! found" is `Ok(None)`, never an error. Nothing is retried internally; use
//! [`Error::is_retryable`] to drive your own policy:
//!
//! ```
//! use email_check::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_retryable() {
//!         println!("Transient {} error, can retry: {}", error.category(), error);
//!     } else {
//!         println!("Permanent error: {}", error);
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! The crate emits `tracing` spans and events and installs no subscriber.
//!
//! ### Span Naming Convention
//!
//! - `InboxChecker::check` - One full check
//! - `CredentialManager::resolve` - Credential lifecycle
//! - `CredentialManager::refresh` / `CredentialManager::bootstrap` - Token grants
//! - `MailboxScanner::scan` - Mailbox pipeline
//! - `GmailClient::list_unread` / `GmailClient::get_message` / `GmailClient::modify_labels`
//!
//! ### Standard Fields
//!
//! - `sender` - Expected `From` header
//! - `matcher` - Matcher description
//! - `message_id` - Gmail message id
//! - `grant` - OAuth grant being exchanged
//!
//! Secrets (client secret, tokens, proxy password) are never logged in clear.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod auth;
pub mod checker;
pub mod config;
pub mod error;
pub mod gmail;
pub mod identity;
pub mod matcher;
pub mod oauth;
pub mod pattern;
pub mod prompt;
pub mod proxy;
pub mod scanner;
pub mod token;

// Internal modules
mod parser;

use std::path::Path;

// Re-exports for ergonomic API
pub use auth::{AuthPhase, AuthState, AuthorizationHandle, CredentialManager};
pub use checker::{InboxChecker, InboxCheckerBuilder};
pub use config::{CheckerConfig, CheckerConfigBuilder, Endpoints, TimeoutConfig};
pub use error::{Error, ErrorCategory, Result};
pub use gmail::{GmailClient, MailApi};
pub use identity::ClientIdentity;
pub use matcher::{MatchRule, Matcher};
pub use pattern::{compile_pattern, CompiledPattern};
pub use proxy::{ProxyAuth, Socks5Proxy};
pub use scanner::MailboxScanner;
pub use token::{FileTokenStore, TokenSet, TokenStore};

/// Checks the inbox once with default settings.
///
/// Tokens live in [`DEFAULT_TOKEN_PATH`](config::DEFAULT_TOKEN_PATH), the code
/// prompt reads stdin, and `verbose` raises outcome logging to `info`.
///
/// # Errors
///
/// - [`Error::MissingInput`] if `sender` or `pattern` is empty, before any I/O
/// - see [`InboxChecker::check`] for the rest
pub async fn check(
    sender: &str,
    pattern: &str,
    client_secret_path: impl AsRef<Path>,
    verbose: bool,
) -> Result<Option<String>> {
    checker::validate_inputs(sender, pattern)?;

    let config = CheckerConfig::builder()
        .client_secret_path(client_secret_path)
        .verbose(verbose)
        .build()?;

    InboxChecker::new(config)?.check(sender, pattern).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        // Ensure all public types are accessible
        let _ = CheckerConfig::builder();
        let _ = Socks5Proxy::new("localhost", 1080);
        let _ = compile_pattern("/code: (\\d+)/").unwrap();
        let _ = MatchRule::default();
        let _ = prompt::NoPrompt;
    }

    #[tokio::test]
    async fn test_check_validates_before_io() {
        let err = check("", "/x/", "/nonexistent/client_secret.json", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingInput { field: "sender" }));

        let err = check("a@b.example", "", "/nonexistent/client_secret.json", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingInput { field: "pattern" }));
    }
}
