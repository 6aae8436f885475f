//! Gmail REST API client.
//!
//! [`MailApi`] is the seam the mailbox scanner drives: list unread messages,
//! fetch one in full, mark one read. [`GmailClient`] implements it over HTTPS
//! against `users/me` with the bearer token of an [`AuthorizationHandle`].

use crate::auth::AuthorizationHandle;
use crate::config::CheckerConfig;
use crate::error::{ApiOperation, Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// Gmail system label carried by unread messages.
pub const UNREAD_LABEL: &str = "UNREAD";

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

/// Response of `users.messages.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    /// Message references; omitted by the API when nothing matched.
    #[serde(default)]
    pub messages: Vec<MessageSummary>,
    /// Token for the next page, if any.
    pub next_page_token: Option<String>,
    /// Estimated total number of results.
    pub result_size_estimate: Option<u32>,
}

/// A message reference as returned by the list call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    /// Immutable message id.
    pub id: String,
    /// Thread the message belongs to.
    pub thread_id: Option<String>,
}

/// A fully fetched message (`format=full`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Immutable message id.
    pub id: String,
    /// Labels currently applied.
    #[serde(default)]
    pub label_ids: Vec<String>,
    /// Short plain-text excerpt.
    pub snippet: Option<String>,
    /// Parsed MIME tree.
    pub payload: Option<MessagePart>,
}

/// One node of a message's MIME tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// Part id within the message.
    pub part_id: Option<String>,
    /// MIME type, e.g. `text/plain`.
    #[serde(default)]
    pub mime_type: String,
    /// Headers in the order they appear.
    #[serde(default)]
    pub headers: Vec<Header>,
    /// Inline body of this part.
    pub body: Option<MessagePartBody>,
    /// Child parts of a multipart container.
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// Body of a MIME part.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    /// Body size in bytes.
    pub size: Option<u64>,
    /// Base64url-encoded content, absent for attachments and containers.
    pub data: Option<String>,
    /// Attachment id when the content must be fetched separately.
    pub attachment_id: Option<String>,
}

/// A single message header.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

impl MessagePart {
    /// Returns the inline body data if present and non-empty.
    #[must_use]
    pub fn data(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| body.data.as_deref())
            .filter(|data| !data.is_empty())
    }
}

impl Message {
    /// Returns the value of the first header named `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Returns the `From` header.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.header("from")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    #[serde(skip_serializing_if = "no_labels")]
    add_label_ids: &'a [&'a str],
    #[serde(skip_serializing_if = "no_labels")]
    remove_label_ids: &'a [&'a str],
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn no_labels(labels: &&[&str]) -> bool {
    labels.is_empty()
}

/// Google API error body (`{"error": {"code", "message", "status"}}`).
#[derive(Debug, Default, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

impl ApiErrorResponse {
    fn message(self) -> String {
        match self.error {
            Some(ApiErrorDetail {
                message: Some(message),
                ..
            }) => message,
            Some(ApiErrorDetail {
                status: Some(status),
                ..
            }) => status,
            _ => "unknown error".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// The mail provider operations the scanner needs.
#[async_trait]
pub trait MailApi: Send + Sync {
    /// Lists unread messages, in provider order.
    async fn list_unread(&self, auth: &AuthorizationHandle) -> Result<Vec<MessageSummary>>;

    /// Fetches a message with headers and MIME tree.
    async fn get_message(&self, auth: &AuthorizationHandle, id: &str) -> Result<Message>;

    /// Removes the unread label from a message.
    async fn mark_read(&self, auth: &AuthorizationHandle, id: &str) -> Result<()>;
}

/// Gmail REST v1 client.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: reqwest::Client,
    api_base: String,
    query: String,
    max_results: u32,
}

impl GmailClient {
    /// Creates a client for the API base, query and page size in `config`.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &CheckerConfig) -> Self {
        Self {
            http,
            api_base: config.endpoints.api_base.trim_end_matches('/').to_string(),
            query: config.query.clone(),
            max_results: config.max_results,
        }
    }

    /// Adds and removes labels on a message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ApiTransport`] or [`Error::ApiStatus`] if the call fails.
    #[instrument(name = "GmailClient::modify_labels", skip(self, auth))]
    pub async fn modify_labels(
        &self,
        auth: &AuthorizationHandle,
        id: &str,
        add: &[&str],
        remove: &[&str],
    ) -> Result<()> {
        let request = self
            .http
            .post(format!("{}/users/me/messages/{id}/modify", self.api_base))
            .bearer_auth(auth.access_token())
            .json(&ModifyRequest {
                add_label_ids: add,
                remove_label_ids: remove,
            });

        let _: Message = self
            .execute(ApiOperation::ModifyLabels, Some(id), request)
            .await?;
        Ok(())
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: ApiOperation,
        message_id: Option<&str>,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let transport = |source| Error::ApiTransport {
            operation,
            message_id: message_id.map(str::to_string),
            source,
        };

        let response = request.send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorResponse>()
                .await
                .unwrap_or_default()
                .message();
            warn!(%operation, ?message_id, status = status.as_u16(), %message, "Mail API call failed");
            return Err(Error::ApiStatus {
                operation,
                message_id: message_id.map(str::to_string),
                status: status.as_u16(),
                message,
            });
        }

        response.json::<T>().await.map_err(transport)
    }
}

#[async_trait]
impl MailApi for GmailClient {
    #[instrument(name = "GmailClient::list_unread", skip_all, fields(query = %self.query))]
    async fn list_unread(&self, auth: &AuthorizationHandle) -> Result<Vec<MessageSummary>> {
        let max_results = self.max_results.to_string();
        let request = self
            .http
            .get(format!("{}/users/me/messages", self.api_base))
            .bearer_auth(auth.access_token())
            .query(&[("q", self.query.as_str()), ("maxResults", max_results.as_str())]);

        let page: ListMessagesResponse =
            self.execute(ApiOperation::ListUnread, None, request).await?;

        debug!(
            count = page.messages.len(),
            more_pages = page.next_page_token.is_some(),
            "Listed unread messages"
        );
        Ok(page.messages)
    }

    #[instrument(name = "GmailClient::get_message", skip(self, auth))]
    async fn get_message(&self, auth: &AuthorizationHandle, id: &str) -> Result<Message> {
        let request = self
            .http
            .get(format!("{}/users/me/messages/{id}", self.api_base))
            .bearer_auth(auth.access_token())
            .query(&[("format", "full")]);

        self.execute(ApiOperation::GetMessage, Some(id), request)
            .await
    }

    async fn mark_read(&self, auth: &AuthorizationHandle, id: &str) -> Result<()> {
        self.modify_labels(auth, id, &[], &[UNREAD_LABEL]).await
    }
}
