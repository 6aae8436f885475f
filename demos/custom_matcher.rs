//! Example: Using custom matchers for complex extraction.
//!
//! This example demonstrates the ways to describe what to extract:
//! - a pattern string compiled with `compile_pattern`, with a `MatchRule`
//! - `RegexMatcher` for a bare regex with a description
//! - `ClosureMatcher` for arbitrary logic
//!
//! # Usage
//!
//! ```bash
//! export SENDER="Shop <orders@shop.example>"
//! cargo run --example custom_matcher
//! ```

use email_check::matcher::{ClosureMatcher, MatchRule, Matcher, RegexMatcher};
use email_check::pattern::compile_pattern;
use email_check::{CheckerConfig, InboxChecker};
use std::borrow::Cow;
use std::env;

/// Extracts order IDs in the format "ORD-XXXXX"
fn order_id_matcher() -> RegexMatcher {
    RegexMatcher::with_description(r"(ORD-\d{5,})", "Order ID (ORD-XXXXX format)")
        .expect("valid regex")
}

/// Extracts the first line mentioning a tracking number
fn tracking_line_matcher() -> impl Matcher {
    ClosureMatcher::new(
        |text| {
            text.lines()
                .map(str::trim)
                .find(|line| line.to_lowercase().contains("tracking"))
                .map(Cow::Borrowed)
        },
        "Tracking line",
    )
}

#[tokio::main]
async fn main() -> email_check::Result<()> {
    let sender = env::var("SENDER").expect("SENDER environment variable required");

    // Offline demonstration against a sample body
    let sample = "Thanks for your order ORD-123456!\nTotal: $42.50\nTracking: 1Z999AA10123456784";

    let amount = compile_pattern(r"/total: \$(\d+(?:\.\d{2})?)/i")?;
    let whole = compile_pattern(r"/total: \$\d+/i")?.with_rule(MatchRule::WholeMatch);

    println!("Sample body results:");
    for matcher in [
        &order_id_matcher() as &dyn Matcher,
        &amount,
        &whole,
        &tracking_line_matcher(),
    ] {
        println!(
            "  {:<40} -> {:?}",
            matcher.description(),
            matcher.find_match(sample)
        );
    }

    // The same matchers work against the live inbox
    let checker = InboxChecker::new(CheckerConfig::builder().verbose(true).build()?)?;
    match checker.check_with_matcher(&sender, &order_id_matcher()).await? {
        Some(order) => println!("\nLatest order: {order}"),
        None => println!("\nNo order email found"),
    }

    Ok(())
}
