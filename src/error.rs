//! Error types for the email-check crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are grouped into categories (see [`Error::category`]) and classified by their
//! retryability (see [`Error::is_retryable`]). Nothing in this crate retries on its own;
//! that policy belongs to the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The OAuth2 grant that was being exercised when an authorization error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Exchanging an interactive authorization code for tokens.
    AuthorizationCode,
    /// Exchanging a stored refresh token for a new access token.
    RefreshToken,
}

impl std::fmt::Display for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grant::AuthorizationCode => write!(f, "authorization code exchange"),
            Grant::RefreshToken => write!(f, "token refresh"),
        }
    }
}

/// The mail API call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    /// Listing unread message ids.
    ListUnread,
    /// Fetching a full message.
    GetMessage,
    /// Adding or removing the unread label.
    ModifyLabels,
}

impl std::fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiOperation::ListUnread => write!(f, "list unread messages"),
            ApiOperation::GetMessage => write!(f, "get message"),
            ApiOperation::ModifyLabels => write!(f, "modify message labels"),
        }
    }
}

/// Errors that can occur while checking a mailbox.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Validation errors (NOT retryable, raised before any I/O)
    // ─────────────────────────────────────────────────────────────────────────
    /// A required caller-supplied parameter was empty or absent.
    #[error("invalid input: {field} is required")]
    MissingInput {
        /// Name of the missing parameter.
        field: &'static str,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// The client credential descriptor could not be read.
    #[error("failed to read credential descriptor {}", path.display())]
    DescriptorRead {
        /// Path of the descriptor.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The client credential descriptor is not valid JSON.
    #[error("credential descriptor {} is not valid JSON", path.display())]
    DescriptorParse {
        /// Path of the descriptor.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The client credential descriptor lacks a required field.
    #[error("credential descriptor {} is missing `{field}`", path.display())]
    DescriptorField {
        /// Path of the descriptor.
        path: PathBuf,
        /// Dotted name of the missing field.
        field: &'static str,
    },

    /// The extraction pattern does not compile.
    #[error("invalid extraction pattern '{pattern}'")]
    InvalidPattern {
        /// The pattern body that failed to compile.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// The extraction pattern repeats a flag.
    #[error("duplicate flag '{flag}' in extraction pattern '{pattern}'")]
    DuplicatePatternFlag {
        /// The full pattern as supplied.
        pattern: String,
        /// The repeated flag.
        flag: char,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client")]
    HttpClient {
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication errors (mixed retryability)
    // ─────────────────────────────────────────────────────────────────────────
    /// The OAuth provider rejected a token request.
    #[error("{grant} rejected by provider (HTTP {status}): {reason}")]
    AuthorizationRejected {
        /// The grant that was attempted.
        grant: Grant,
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Provider-supplied reason, if any.
        reason: String,
    },

    /// The token endpoint could not be reached or returned an unreadable body.
    #[error("{grant} request failed")]
    AuthorizationTransport {
        /// The grant that was attempted.
        grant: Grant,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The stored tokens are expired and carry no refresh token.
    #[error("stored access token is expired and no refresh token is available")]
    MissingRefreshToken,

    /// Reading the authorization code from the prompt failed.
    #[error("failed to read authorization code")]
    CodePrompt {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The prompt returned an empty authorization code.
    #[error("no authorization code was entered")]
    EmptyAuthorizationCode,

    /// Interactive authorization is required but the code provider cannot prompt.
    #[error("interactive authorization required; visit {url}")]
    InteractionRequired {
        /// The authorization URL the user must visit.
        url: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Token store errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// The token store could not be read.
    #[error("failed to read token store {}", path.display())]
    TokenStoreRead {
        /// Path of the token store.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The token store holds data that is not a token set.
    #[error("token store {} is corrupt", path.display())]
    TokenStoreParse {
        /// Path of the token store.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The token store could not be written.
    #[error("failed to write token store {}", path.display())]
    TokenStoreWrite {
        /// Path of the token store.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Mail API errors (mixed retryability)
    // ─────────────────────────────────────────────────────────────────────────
    /// The mail API request did not complete.
    #[error("mail API request failed: {operation}")]
    ApiTransport {
        /// The operation that failed.
        operation: ApiOperation,
        /// Message the operation targeted, if any.
        message_id: Option<String>,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The mail API answered with an error status.
    #[error("mail API returned HTTP {status} for {operation}: {message}")]
    ApiStatus {
        /// The operation that failed.
        operation: ApiOperation,
        /// Message the operation targeted, if any.
        message_id: Option<String>,
        /// HTTP status code.
        status: u16,
        /// Provider-supplied error message.
        message: String,
    },

    /// A message body was not valid base64.
    #[error("failed to decode body of message {message_id}")]
    DecodeBody {
        /// The message whose body failed to decode.
        message_id: String,
        /// The underlying base64 error.
        #[source]
        source: base64::DecodeError,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// ```ignore
    /// if error.is_retryable() {
    ///     // Backoff and call check() again
    /// } else {
    ///     // Fail permanently
    /// }
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::AuthorizationTransport { .. } | Error::ApiTransport { .. } => true,

            Error::AuthorizationRejected { status, .. } | Error::ApiStatus { status, .. } => {
                is_transient_status(*status)
            }

            Error::MissingInput { .. }
            | Error::InvalidConfig { .. }
            | Error::DescriptorRead { .. }
            | Error::DescriptorParse { .. }
            | Error::DescriptorField { .. }
            | Error::InvalidPattern { .. }
            | Error::DuplicatePatternFlag { .. }
            | Error::HttpClient { .. }
            | Error::MissingRefreshToken
            | Error::CodePrompt { .. }
            | Error::EmptyAuthorizationCode
            | Error::InteractionRequired { .. }
            | Error::TokenStoreRead { .. }
            | Error::TokenStoreParse { .. }
            | Error::TokenStoreWrite { .. }
            | Error::DecodeBody { .. } => false,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingInput { .. } => ErrorCategory::Validation,

            Error::InvalidConfig { .. }
            | Error::DescriptorRead { .. }
            | Error::DescriptorParse { .. }
            | Error::DescriptorField { .. }
            | Error::InvalidPattern { .. }
            | Error::DuplicatePatternFlag { .. }
            | Error::HttpClient { .. } => ErrorCategory::Configuration,

            Error::AuthorizationRejected { .. }
            | Error::AuthorizationTransport { .. }
            | Error::MissingRefreshToken
            | Error::CodePrompt { .. }
            | Error::EmptyAuthorizationCode
            | Error::InteractionRequired { .. } => ErrorCategory::Authentication,

            Error::TokenStoreRead { .. }
            | Error::TokenStoreParse { .. }
            | Error::TokenStoreWrite { .. } => ErrorCategory::Storage,

            Error::ApiTransport { .. } | Error::ApiStatus { .. } | Error::DecodeBody { .. } => {
                ErrorCategory::Api
            }
        }
    }
}

/// Server-side and rate-limit statuses are worth another attempt.
fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller-supplied parameters were missing.
    Validation,
    /// Configuration, descriptor or pattern errors.
    Configuration,
    /// OAuth token exchange, refresh or prompt errors.
    Authentication,
    /// Token store I/O errors.
    Storage,
    /// Mail API transport or provider errors.
    Api,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Authentication => write!(f, "authentication"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Api => write!(f, "api"),
        }
    }
}
