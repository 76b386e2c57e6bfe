//! Core domain types for play-publisher.
//!
//! This crate provides the types shared by the credential resolver, the
//! publishing API client and the edit session: the account configuration,
//! edit identifiers, endpoint settings and the error taxonomy.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

mod error;

pub use error::{APPLICATION_NOT_FOUND_REASON, ApiError, PublishError};

/// OAuth2 scope granting access to the Google Play Developer API.
pub const ANDROID_PUBLISHER_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";

/// Default base URL of the publishing API.
pub const DEFAULT_API_BASE: &str = "https://androidpublisher.googleapis.com";

/// Default OAuth2 token endpoint.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Service account settings supplied by the user.
///
/// Exactly one shape is valid: a JSON key file, or a PKCS12 file together
/// with the service account email. When both are present the JSON key wins.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Path to a service account JSON key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_file: Option<PathBuf>,
    /// Path to a PKCS12 (`.p12`) key archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk12_file: Option<PathBuf>,
    /// Service account email, required alongside `pk12_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_email: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("json_file", &self.json_file.as_ref().map(|_| "[REDACTED]"))
            .field("pk12_file", &self.pk12_file.as_ref().map(|_| "[REDACTED]"))
            .field(
                "service_account_email",
                &self.service_account_email.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl AccountConfig {
    /// Account backed by a JSON key file.
    pub fn json(path: impl Into<PathBuf>) -> Self {
        Self {
            json_file: Some(path.into()),
            ..Self::default()
        }
    }

    /// Account backed by a PKCS12 archive and service account email.
    pub fn pk12(path: impl Into<PathBuf>, email: impl Into<String>) -> Self {
        Self {
            json_file: None,
            pk12_file: Some(path.into()),
            service_account_email: Some(email.into()),
        }
    }

    /// Set the JSON key file.
    #[must_use]
    pub fn with_json_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_file = Some(path.into());
        self
    }

    /// Set the PKCS12 archive.
    #[must_use]
    pub fn with_pk12_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pk12_file = Some(path.into());
        self
    }

    /// Set the service account email.
    #[must_use]
    pub fn with_service_account_email(mut self, email: impl Into<String>) -> Self {
        self.service_account_email = Some(email.into());
        self
    }

    /// Whether any credential setting is present.
    pub fn is_empty(&self) -> bool {
        self.json_file.is_none() && self.pk12_file.is_none() && self.service_account_email.is_none()
    }
}

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Service account JSON key
    JsonKey,
    /// PKCS12 archive plus service account email
    Pkcs12,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::JsonKey => write!(f, "json key"),
            CredentialSource::Pkcs12 => write!(f, "pkcs12"),
        }
    }
}

/// Opaque identifier of a remote edit transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditId(String);

impl EditId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EditId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An edit as returned by `edits.insert`, `edits.get` and `edits.commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppEdit {
    /// Edit identifier
    pub id: EditId,
    /// Expiry as seconds since the epoch, encoded as a string by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time_seconds: Option<String>,
}

/// Remote endpoints used by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Base URL of the publishing API
    pub api_base: String,
    /// Token endpoint override. When unset a JSON key's `token_uri` is used,
    /// falling back to [`DEFAULT_TOKEN_URI`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token_uri: None,
        }
    }
}

/// What happens to an edit that is dropped without being committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonPolicy {
    /// Best-effort `edits.delete`; failures are logged and ignored
    #[default]
    Discard,
    /// Leave the edit for the server to expire
    Leave,
}

impl std::fmt::Display for AbandonPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbandonPolicy::Discard => write!(f, "discard"),
            AbandonPolicy::Leave => write!(f, "leave"),
        }
    }
}
