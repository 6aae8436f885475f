//! Example: Route OAuth and Gmail traffic through a SOCKS5 proxy.
//!
//! Host names are resolved by the proxy.
//!
//! # Usage
//!
//! ```bash
//! export SENDER="Shop <orders@shop.example>"
//! export PATTERN='/order id: (\d+)/'
//! export PROXY_HOST="proxy.example.com"
//! export PROXY_PORT="1080"
//! # Optional: for authenticated proxies
//! export PROXY_USER="username"
//! export PROXY_PASS="password"
//!
//! cargo run --example with_proxy
//! ```

use email_check::{CheckerConfig, InboxChecker, Socks5Proxy};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> email_check::Result<()> {
    let sender = env::var("SENDER").expect("SENDER environment variable required");
    let pattern = env::var("PATTERN").expect("PATTERN environment variable required");

    // Proxy configuration
    let proxy_host = env::var("PROXY_HOST").expect("PROXY_HOST environment variable required");
    let proxy_port: u16 = env::var("PROXY_PORT")
        .expect("PROXY_PORT environment variable required")
        .parse()
        .expect("PROXY_PORT must be a valid port number");

    // Create proxy (with optional authentication)
    let proxy = match (env::var("PROXY_USER").ok(), env::var("PROXY_PASS").ok()) {
        (Some(user), Some(pass)) => Socks5Proxy::with_auth(&proxy_host, proxy_port, user, pass),
        _ => Socks5Proxy::new(&proxy_host, proxy_port),
    };
    println!("Using proxy {proxy}");

    let config = CheckerConfig::builder()
        .proxy(proxy)
        // Proxies add latency
        .connect_timeout(Duration::from_secs(60))
        .request_timeout(Duration::from_secs(120))
        .verbose(true)
        .build()?;

    let checker = InboxChecker::new(config)?;
    match checker.check(&sender, &pattern).await? {
        Some(content) => println!("Found content: {content}"),
        None => println!("Nothing found"),
    }

    Ok(())
}
