//! OAuth2 endpoint client.
//!
//! [`OAuthProvider`] abstracts the three provider interactions the credential state
//! machine needs: building the consent URL, exchanging an authorization code and
//! refreshing an access token. [`GoogleOAuth`] implements them against Google's
//! endpoints with form-encoded POSTs.

use crate::config::Endpoints;
use crate::error::{Error, Grant, Result};
use crate::identity::ClientIdentity;
use crate::token::TokenSet;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// The provider side of the OAuth2 authorization code flow.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Builds the URL the user visits to grant access.
    ///
    /// `offline` requests a refresh token alongside the access token.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the authorization endpoint is not a valid URL.
    fn authorization_url(
        &self,
        identity: &ClientIdentity,
        scopes: &[String],
        offline: bool,
    ) -> Result<String>;

    /// Exchanges an authorization code for a token set.
    async fn exchange_code(&self, identity: &ClientIdentity, code: &str) -> Result<TokenSet>;

    /// Exchanges a refresh token for a new token set.
    ///
    /// The returned set may lack a refresh token; merging is the caller's job.
    async fn refresh(&self, identity: &ClientIdentity, refresh_token: &str) -> Result<TokenSet>;
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token_set(self) -> TokenSet {
        let fallback = Duration::seconds(DEFAULT_EXPIRES_IN_SECS);
        let lifetime = self
            .expires_in
            .and_then(Duration::try_seconds)
            .unwrap_or(fallback);
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(lifetime)
            .unwrap_or_else(|| now + fallback);

        let mut tokens = TokenSet::new(self.access_token, self.refresh_token, expires_at);
        tokens.scope = self.scope;
        tokens.token_type = self.token_type;
        tokens
    }
}

/// Token endpoint error body (`{"error": "...", "error_description": "..."}`).
#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenErrorResponse {
    fn reason(self) -> String {
        match (self.error, self.error_description) {
            (Some(error), Some(description)) => format!("{error}: {description}"),
            (Some(reason), None) | (None, Some(reason)) => reason,
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// Google OAuth2 endpoints over HTTPS.
#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    http: reqwest::Client,
    auth_url: String,
    token_url: String,
}

impl GoogleOAuth {
    /// Creates a client using `http` for token requests.
    #[must_use]
    pub fn new(http: reqwest::Client, endpoints: &Endpoints) -> Self {
        Self {
            http,
            auth_url: endpoints.auth_url.clone(),
            token_url: endpoints.token_url.clone(),
        }
    }

    async fn request_tokens(&self, grant: Grant, form: &[(&str, &str)]) -> Result<TokenSet> {
        let transport = |source| Error::AuthorizationTransport { grant, source };

        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<TokenErrorResponse>()
                .await
                .unwrap_or_default()
                .reason();
            warn!(%grant, status = status.as_u16(), %reason, "Token request rejected");
            return Err(Error::AuthorizationRejected {
                grant,
                status: status.as_u16(),
                reason,
            });
        }

        let tokens = response
            .json::<TokenResponse>()
            .await
            .map_err(transport)?
            .into_token_set();

        debug!(
            %grant,
            refresh_token_issued = tokens.refresh_token.is_some(),
            expires_at = ?tokens.expires_at(),
            "Token request succeeded"
        );
        Ok(tokens)
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn authorization_url(
        &self,
        identity: &ClientIdentity,
        scopes: &[String],
        offline: bool,
    ) -> Result<String> {
        let scope = scopes.join(" ");
        let access_type = if offline { "offline" } else { "online" };

        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("access_type", access_type),
                ("scope", scope.as_str()),
                ("response_type", "code"),
                ("client_id", identity.client_id()),
                ("redirect_uri", identity.redirect_uri()),
            ],
        )
        .map_err(|e| Error::InvalidConfig {
            message: format!("invalid authorization endpoint {}: {e}", self.auth_url),
        })?;

        Ok(url.into())
    }

    #[instrument(name = "GoogleOAuth::exchange_code", skip_all, fields(client_id = %identity.client_id()))]
    async fn exchange_code(&self, identity: &ClientIdentity, code: &str) -> Result<TokenSet> {
        self.request_tokens(
            Grant::AuthorizationCode,
            &[
                ("code", code),
                ("client_id", identity.client_id()),
                ("client_secret", identity.client_secret()),
                ("redirect_uri", identity.redirect_uri()),
                ("grant_type", "authorization_code"),
            ],
        )
        .await
    }

    #[instrument(name = "GoogleOAuth::refresh", skip_all, fields(client_id = %identity.client_id()))]
    async fn refresh(&self, identity: &ClientIdentity, refresh_token: &str) -> Result<TokenSet> {
        self.request_tokens(
            Grant::RefreshToken,
            &[
                ("refresh_token", refresh_token),
                ("client_id", identity.client_id()),
                ("client_secret", identity.client_secret()),
                ("grant_type", "refresh_token"),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity() -> ClientIdentity {
        ClientIdentity::new("client-123", "secret-456", "urn:ietf:wg:oauth:2.0:oob")
    }

    fn oauth(server: &MockServer) -> GoogleOAuth {
        GoogleOAuth::new(reqwest::Client::new(), &Endpoints::with_base(&server.uri()))
    }

    #[test]
    fn test_authorization_url() {
        let oauth = GoogleOAuth::new(reqwest::Client::new(), &Endpoints::default());
        let scopes = vec![
            "https://www.googleapis.com/auth/gmail.readonly".to_string(),
            "https://www.googleapis.com/auth/gmail.modify".to_string(),
        ];
        let url = Url::parse(&oauth.authorization_url(&identity(), &scopes, true).unwrap()).unwrap();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "client-123");
        assert_eq!(params["redirect_uri"], "urn:ietf:wg:oauth:2.0:oob");
        assert_eq!(
            params["scope"],
            "https://www.googleapis.com/auth/gmail.readonly https://www.googleapis.com/auth/gmail.modify"
        );
        assert!(!url.as_str().contains("secret-456"));
    }

    #[test]
    fn test_token_error_reason() {
        let body = TokenErrorResponse {
            error: Some("invalid_grant".into()),
            error_description: Some("Bad Request".into()),
        };
        assert_eq!(body.reason(), "invalid_grant: Bad Request");
        assert_eq!(TokenErrorResponse::default().reason(), "unknown error");
    }

    #[test]
    fn test_out_of_range_expires_in_uses_default() {
        for expires_in in [None, Some(i64::MAX), Some(i64::MAX / 1000)] {
            let tokens = TokenResponse {
                access_token: "ya29".into(),
                refresh_token: None,
                expires_in,
                scope: None,
                token_type: None,
            }
            .into_token_set();
            let minutes_left = tokens.time_left(Utc::now()).num_minutes();
            assert!((59..=60).contains(&minutes_left), "{expires_in:?}");
        }
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=4%2Fabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new",
                "refresh_token": "1//refresh",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/gmail.modify",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = oauth(&server).exchange_code(&identity(), "4/abc").await.unwrap();
        assert_eq!(tokens.access_token, "ya29.new");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(tokens.token_type.as_deref(), Some("Bearer"));
        let minutes_left = tokens.time_left(Utc::now()).num_minutes();
        assert!((58..=60).contains(&minutes_left));
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_in_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = oauth(&server).refresh(&identity(), "1//refresh").await.unwrap();
        assert_eq!(tokens.access_token, "ya29.refreshed");
        assert!(tokens.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_rejected_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let err = oauth(&server).refresh(&identity(), "revoked").await.unwrap_err();
        match err {
            Error::AuthorizationRejected {
                grant,
                status,
                reason,
            } => {
                assert_eq!(grant, Grant::RefreshToken);
                assert_eq!(status, 400);
                assert!(reason.starts_with("invalid_grant"));
            }
            other => panic!("expected AuthorizationRejected, got {other:?}"),
        }
    }
}
