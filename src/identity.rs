//! OAuth2 client identity loaded from the Google credential descriptor.

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// The OAuth2 client this application authenticates as.
///
/// Immutable for the lifetime of the process. The client secret is held as a
/// [`SecretString`] and never appears in `Debug` output.
#[derive(Clone)]
pub struct ClientIdentity {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
}

#[derive(Deserialize)]
struct Descriptor {
    installed: Option<InstalledSection>,
}

#[derive(Deserialize)]
struct InstalledSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uris: Option<Vec<String>>,
}

impl ClientIdentity {
    /// Creates an identity from its parts.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Loads the identity from a descriptor of the form
    /// `{"installed": {"client_id", "client_secret", "redirect_uris": [..]}}`.
    ///
    /// Only the first redirect URI is used.
    ///
    /// # Errors
    ///
    /// - [`Error::DescriptorRead`] if the file cannot be read
    /// - [`Error::DescriptorParse`] if it is not JSON
    /// - [`Error::DescriptorField`] if a required field is missing or empty
    #[instrument(name = "ClientIdentity::load", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::DescriptorRead {
                path: path.to_path_buf(),
                source,
            })?;

        let identity = Self::from_json(&raw, path)?;
        debug!(client_id = %identity.client_id, "Loaded client identity");
        Ok(identity)
    }

    fn from_json(raw: &str, path: &Path) -> Result<Self> {
        let descriptor: Descriptor =
            serde_json::from_str(raw).map_err(|source| Error::DescriptorParse {
                path: path.to_path_buf(),
                source,
            })?;

        let missing = |field| Error::DescriptorField {
            path: PathBuf::from(path),
            field,
        };

        let installed = descriptor.installed.ok_or_else(|| missing("installed"))?;
        let client_id =
            non_empty(installed.client_id).ok_or_else(|| missing("installed.client_id"))?;
        let client_secret =
            non_empty(installed.client_secret).ok_or_else(|| missing("installed.client_secret"))?;
        let redirect_uri = installed
            .redirect_uris
            .and_then(|uris| uris.into_iter().next())
            .and_then(|uri| non_empty(Some(uri)))
            .ok_or_else(|| missing("installed.redirect_uris"))?;

        Ok(Self::new(client_id, client_secret, redirect_uri))
    }

    /// Returns the OAuth2 client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    ///
    /// Only the token endpoint client should need this.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        self.client_secret.expose_secret()
    }

    /// Returns the redirect URI registered for this client.
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    fn parse(raw: &str) -> Result<ClientIdentity> {
        ClientIdentity::from_json(raw, Path::new("client_secret.json"))
    }

    fn missing_field(raw: &str) -> &'static str {
        match parse(raw) {
            Err(Error::DescriptorField { field, .. }) => field,
            other => panic!("expected DescriptorField, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_installed_descriptor() {
        let identity = parse(
            r#"{"installed": {
                "client_id": "id.apps.googleusercontent.com",
                "client_secret": "shh",
                "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob", "http://localhost"]
            }}"#,
        )
        .unwrap();

        assert_eq!(identity.client_id(), "id.apps.googleusercontent.com");
        assert_eq!(identity.client_secret(), "shh");
        assert_eq!(identity.redirect_uri(), "urn:ietf:wg:oauth:2.0:oob");
    }

    #[test]
    fn test_missing_fields_are_reported() {
        assert_eq!(missing_field(r#"{"web": {}}"#), "installed");
        assert_eq!(
            missing_field(r#"{"installed": {"client_secret": "s", "redirect_uris": ["r"]}}"#),
            "installed.client_id"
        );
        assert_eq!(
            missing_field(r#"{"installed": {"client_id": "i", "redirect_uris": ["r"]}}"#),
            "installed.client_secret"
        );
        assert_eq!(
            missing_field(r#"{"installed": {"client_id": "i", "client_secret": "s"}}"#),
            "installed.redirect_uris"
        );
        assert_eq!(
            missing_field(
                r#"{"installed": {"client_id": "i", "client_secret": "s", "redirect_uris": []}}"#
            ),
            "installed.redirect_uris"
        );
        assert_eq!(
            missing_field(
                r#"{"installed": {"client_id": "", "client_secret": "s", "redirect_uris": ["r"]}}"#
            ),
            "installed.client_id"
        );
    }

    #[test]
    fn test_invalid_json_is_a_configuration_error() {
        let err = parse("{not json").unwrap_err();
        assert!(matches!(err, Error::DescriptorParse { .. }));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secret.json");
        std::fs::write(
            &path,
            r#"{"installed": {"client_id": "id", "client_secret": "s", "redirect_uris": ["r"]}}"#,
        )
        .unwrap();

        let identity = ClientIdentity::load(&path).await.unwrap();
        assert_eq!(identity.client_id(), "id");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = ClientIdentity::load(Path::new("/definitely/not/here.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DescriptorRead { .. }));
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_secret_not_in_debug() {
        let identity = ClientIdentity::new("id", "super-secret-value", "http://localhost");
        let debug_str = format!("{identity:?}");
        assert!(!debug_str.contains("super-secret-value"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
