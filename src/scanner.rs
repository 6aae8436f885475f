//! The list → fetch → filter → decode → match → mutate pipeline.
//!
//! [`MailboxScanner::scan`] walks the unread messages in the order the provider
//! returns them and stops at the first message from the expected sender:
//!
//! - sender differs, or no `From` header: skip, keep scanning
//! - no plain-text body: stop, nothing found
//! - body does not match: stop, nothing found
//! - body matches: mark the message read, return the extracted content
//!
//! Everything runs sequentially and nothing is retried.

use crate::auth::AuthorizationHandle;
use crate::error::Result;
use crate::gmail::MailApi;
use crate::matcher::Matcher;
use crate::parser::{self, ExtractResult};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Logs at `info` when verbose, `debug` otherwise.
macro_rules! report {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

/// Scans unread mail for the first message from a sender and extracts content from it.
#[derive(Clone)]
pub struct MailboxScanner {
    api: Arc<dyn MailApi>,
    verbose: bool,
}

impl MailboxScanner {
    /// Creates a scanner over `api`.
    ///
    /// With `verbose`, outcomes ("no new messages", "content not found", ...) are
    /// logged at `info` instead of `debug`.
    #[must_use]
    pub fn new(api: Arc<dyn MailApi>, verbose: bool) -> Self {
        Self { api, verbose }
    }

    /// Returns the extracted content of the first unread message from `sender`,
    /// marking that message read.
    ///
    /// `sender` is compared for exact equality with the message's `From` header.
    /// `Ok(None)` covers every "not found" outcome.
    ///
    /// # Errors
    ///
    /// - API errors from listing, fetching or marking read, with the cause attached
    /// - [`Error::DecodeBody`](crate::Error::DecodeBody) if the body is not valid base64
    ///
    /// A failure to mark the message read is returned as an error even though the
    /// content was already extracted.
    #[instrument(
        name = "MailboxScanner::scan",
        skip(self, auth, matcher),
        fields(matcher = %matcher.description())
    )]
    pub async fn scan(
        &self,
        auth: &AuthorizationHandle,
        sender: &str,
        matcher: &dyn Matcher,
    ) -> Result<Option<String>> {
        let summaries = self.api.list_unread(auth).await?;
        if summaries.is_empty() {
            report!(self.verbose, "No new messages.");
            return Ok(None);
        }

        debug!(count = summaries.len(), "Scanning unread messages");

        for summary in &summaries {
            let message = self.api.get_message(auth, &summary.id).await?;

            if message.sender() != Some(sender) {
                debug!(
                    message_id = %message.id,
                    from = ?message.sender(),
                    "Sender does not match, skipping message"
                );
                continue;
            }

            match parser::extract_match_from_message(&message, matcher)? {
                ExtractResult::Match(content) => {
                    self.api.mark_read(auth, &message.id).await?;
                    report!(self.verbose, message_id = %message.id, content = %content, "Found content:");
                    return Ok(Some(content));
                }
                ExtractResult::NoBody | ExtractResult::NoMatch => {
                    report!(self.verbose, message_id = %message.id, "Content not found in the email body.");
                    return Ok(None);
                }
            }
        }

        report!(self.verbose, "No messages from the specified sender");
        Ok(None)
    }
}

impl std::fmt::Debug for MailboxScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxScanner")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}
