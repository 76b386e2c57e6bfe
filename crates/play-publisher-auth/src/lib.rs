//! Service account credential resolution for play-publisher.
//!
//! Two mutually exclusive account shapes are supported, checked in order:
//! 1. a service account JSON key file
//! 2. a PKCS12 (`.p12`) archive plus the service account email
//!
//! The resolved [`ServiceAccountCredential`] is always scoped to the Google
//! Play publishing scope. Resolution only touches the local filesystem; the
//! OAuth2 token exchange happens lazily on the first authenticated request.
//!
//! # Example
//!
//! ```no_run
//! use play_publisher_auth::resolve_credential;
//! use play_publisher_types::AccountConfig;
//!
//! let account = AccountConfig::json("keys/service-account.json");
//! let credential = resolve_credential(&account).expect("credential");
//! println!("signing in as {}", credential.client_email());
//! ```

use std::path::Path;

use play_publisher_types::{ANDROID_PUBLISHER_SCOPE, AccountConfig, CredentialSource, PublishError};
use tracing::info;

mod credential;
mod key;

pub use credential::{AccessToken, JWT_BEARER_GRANT, ServiceAccountCredential, StaticToken, TokenProvider};
pub use key::PKCS12_PASSWORD;

/// Message used when no usable account shape is configured.
pub const NO_CREDENTIALS_MESSAGE: &str = "No credentials provided.";

/// Resolve a publishing credential from the account configuration.
///
/// A JSON key takes precedence over a PKCS12 archive; the PKCS12 branch
/// requires both the archive and the service account email.
///
/// # Errors
///
/// - [`PublishError::Configuration`] when neither shape is complete
/// - [`PublishError::Io`] when a key file cannot be read
/// - [`PublishError::InvalidKey`] when key material cannot be parsed
pub fn resolve_credential(config: &AccountConfig) -> Result<ServiceAccountCredential, PublishError> {
    if let Some(json_file) = &config.json_file {
        info!("loading service account credentials from JSON key");
        let content = read_key_file(json_file)?;
        let credential = key::credential_from_json(&content)?;
        return Ok(credential.with_scopes([ANDROID_PUBLISHER_SCOPE]));
    }

    if let (Some(pk12_file), Some(email)) = (&config.pk12_file, &config.service_account_email) {
        info!("loading service account credentials from PKCS12 archive");
        let archive = read_key_file(pk12_file)?;
        let signing_key = key::signing_key_from_pkcs12(&archive)?;
        return Ok(ServiceAccountCredential::new(
            email.clone(),
            signing_key,
            CredentialSource::Pkcs12,
        )
        .with_scopes([ANDROID_PUBLISHER_SCOPE]));
    }

    Err(PublishError::configuration(NO_CREDENTIALS_MESSAGE))
}

/// Which branch [`resolve_credential`] would take, without reading any file.
pub fn credential_source(config: &AccountConfig) -> Option<CredentialSource> {
    if config.json_file.is_some() {
        Some(CredentialSource::JsonKey)
    } else if config.pk12_file.is_some() && config.service_account_email.is_some() {
        Some(CredentialSource::Pkcs12)
    } else {
        None
    }
}

/// Mask a token for safe display (show first 4 and last 4 chars).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 8 {
        return "*".repeat(token.len());
    }
    format!("{}****{}", &token[..4], &token[token.len() - 4..])
}

fn read_key_file(path: &Path) -> Result<Vec<u8>, PublishError> {
    std::fs::read(path).map_err(|source| PublishError::Io {
        path: path.to_path_buf(),
        source,
    })
}
