//! Example: Proper error handling with retries.
//!
//! The crate never retries on its own. This example wraps a check in a retry
//! loop driven by `Error::is_retryable` and reacts to each error category.
//!
//! # Usage
//!
//! ```bash
//! export SENDER="Shop <orders@shop.example>"
//! export PATTERN='/order id: (\d+)/'
//! cargo run --example error_handling
//! ```

use email_check::prompt::NoPrompt;
use email_check::{CheckerConfig, Error, ErrorCategory, InboxChecker};
use std::env;
use std::sync::Arc;
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Check with automatic retry for transient failures
async fn check_with_retry(
    checker: &InboxChecker,
    sender: &str,
    pattern: &str,
) -> Result<Option<String>, Error> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        println!("Attempt {attempt}/{MAX_RETRIES}...");

        match checker.check(sender, pattern).await {
            Ok(found) => return Ok(found),
            Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                println!("  Transient {} error: {e}", e.category());
                println!("  Retrying in {backoff:?}...");
                tokio::time::sleep(backoff).await;
                backoff *= 2; // Exponential backoff
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn explain(error: &Error) {
    match error.category() {
        ErrorCategory::Validation => println!("Fix the arguments: {error}"),
        ErrorCategory::Configuration => {
            println!("Check client_secret.json and the pattern: {error}");
        }
        ErrorCategory::Authentication => match error {
            Error::InteractionRequired { url } => {
                println!("Authorize once interactively by visiting:\n  {url}");
            }
            Error::AuthorizationRejected { .. } | Error::MissingRefreshToken => {
                println!("Stored credentials are no longer usable; delete token.json and re-authorize");
            }
            _ => println!("Authentication failed: {error}"),
        },
        ErrorCategory::Storage => println!("Token file problem: {error}"),
        ErrorCategory::Api => println!("Gmail API error: {error}"),
    }

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        println!("  caused by: {cause}");
        source = cause.source();
    }
}

#[tokio::main]
async fn main() {
    let sender = env::var("SENDER").expect("SENDER environment variable required");
    let pattern = env::var("PATTERN").expect("PATTERN environment variable required");

    println!("Email Check - Error Handling Example\n");
    println!("====================================\n");

    let config = match CheckerConfig::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Unattended: never block on the terminal
    let checker = match InboxChecker::builder(config)
        .code_provider(Arc::new(NoPrompt))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            explain(&e);
            std::process::exit(1);
        }
    };

    match check_with_retry(&checker, &sender, &pattern).await {
        Ok(Some(content)) => println!("Found content: {content}"),
        Ok(None) => println!("Nothing found (this is normal)"),
        Err(e) => {
            explain(&e);
            std::process::exit(1);
        }
    }
}
