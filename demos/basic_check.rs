//! Example: One-shot inbox check.
//!
//! Looks for the first unread message from a sender, extracts content from its
//! body and marks it read. On the first run the consent URL is printed and the
//! authorization code is read from the terminal; later runs reuse `token.json`.
//!
//! # Usage
//!
//! ```bash
//! # OAuth client of type "Desktop app" downloaded from the Google Cloud console
//! export CLIENT_SECRET_PATH="client_secret.json"
//! export SENDER="Shop <orders@shop.example>"
//! export PATTERN='/order id: (\d+)/i'
//!
//! cargo run --example basic_check
//! ```

use email_check::config::DEFAULT_CLIENT_SECRET_PATH;
use std::env;

#[tokio::main]
async fn main() -> email_check::Result<()> {
    let client_secret =
        env::var("CLIENT_SECRET_PATH").unwrap_or_else(|_| DEFAULT_CLIENT_SECRET_PATH.to_string());
    let sender = env::var("SENDER").expect("SENDER environment variable required");
    let pattern = env::var("PATTERN").expect("PATTERN environment variable required");

    println!("Checking unread mail from {sender}...");

    match email_check::check(&sender, &pattern, &client_secret, true).await? {
        Some(content) => println!("Found content: {content}"),
        None => println!("Nothing found"),
    }

    Ok(())
}
