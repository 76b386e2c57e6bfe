use std::cell::RefCell;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use play_publisher_types::{ApiError, CredentialSource, DEFAULT_TOKEN_URI, PublishError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mask_token;

/// OAuth2 grant type for the signed-JWT service account flow.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion.
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Supplies bearer tokens to the API client.
pub trait TokenProvider {
    /// Return a valid access token, fetching one over `http` if needed.
    fn access_token(&self, http: &Client) -> Result<String, PublishError>;
}

/// A fixed bearer token. Useful against emulators and in tests.
#[derive(Clone)]
pub struct StaticToken(pub String);

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticToken").field(&mask_token(&self.0)).finish()
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self, _http: &Client) -> Result<String, PublishError> {
        Ok(self.0.clone())
    }
}

/// An access token together with its local expiry instant.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    expires_at: Instant,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Instant::now() + expires_in,
        }
    }

    pub fn secret(&self) -> &str {
        &self.token
    }

    /// Whether the token is still usable, keeping a refresh margin.
    pub fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &mask_token(&self.token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Service account principal that signs its own OAuth2 assertions.
///
/// The access token cache is a plain `RefCell`: a credential is owned by one
/// client and used from one thread at a time.
pub struct ServiceAccountCredential {
    client_email: String,
    key_id: Option<String>,
    signing_key: EncodingKey,
    token_uri: String,
    scopes: Vec<String>,
    source: CredentialSource,
    cached: RefCell<Option<AccessToken>>,
}

impl std::fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("client_email", &self.client_email)
            .field("key_id", &self.key_id)
            .field("signing_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .field("scopes", &self.scopes)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AssertionClaims {
    pub(crate) iss: String,
    pub(crate) scope: String,
    pub(crate) aud: String,
    pub(crate) iat: u64,
    pub(crate) exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

impl ServiceAccountCredential {
    /// Create an unscoped credential using the default token endpoint.
    pub fn new(client_email: impl Into<String>, signing_key: EncodingKey, source: CredentialSource) -> Self {
        Self {
            client_email: client_email.into(),
            key_id: None,
            signing_key,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            scopes: Vec::new(),
            source,
            cached: RefCell::new(None),
        }
    }

    /// Replace the requested scopes. Any cached token is dropped.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self.cached = RefCell::new(None);
        self
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self.cached = RefCell::new(None);
        self
    }

    /// Set the key id advertised in the assertion header.
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Forget the cached access token so the next request re-authenticates.
    pub fn invalidate(&self) {
        self.cached.borrow_mut().take();
    }

    /// Build the RS256 assertion exchanged for an access token.
    pub fn signed_assertion(&self, issued_at: u64) -> Result<String, PublishError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.token_uri.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };

        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| PublishError::InvalidKey(format!("failed to sign assertion: {e}")))
    }

    fn fetch_token(&self, http: &Client) -> Result<AccessToken, PublishError> {
        let assertion = self.signed_assertion(jsonwebtoken::get_current_timestamp())?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", &assertion)
            .finish();

        debug!(token_uri = %self.token_uri, "exchanging service account assertion");
        let response = http
            .post(&self.token_uri)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .map_err(|source| ApiError::Transport {
                url: self.token_uri.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("error").to_string();
            let (error, description) = match response.text() {
                Ok(text) => match serde_json::from_str::<TokenErrorResponse>(&text) {
                    Ok(parsed) => (parsed.error, parsed.error_description),
                    Err(_) => (fallback, Some(text.trim().to_string()).filter(|t| !t.is_empty())),
                },
                Err(e) => (fallback, Some(format!("failed to read error body: {e}"))),
            };
            return Err(ApiError::Token {
                status: status.as_u16(),
                error,
                description,
            }
            .into());
        }

        let parsed: TokenResponse = response.json().map_err(|e| ApiError::Decode {
            url: self.token_uri.clone(),
            message: e.to_string(),
        })?;

        Ok(AccessToken::new(
            parsed.access_token,
            Duration::from_secs(parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS)),
        ))
    }
}

impl TokenProvider for ServiceAccountCredential {
    fn access_token(&self, http: &Client) -> Result<String, PublishError> {
        if let Some(token) = self.cached.borrow().as_ref()
            && token.is_fresh()
        {
            return Ok(token.secret().to_string());
        }

        let token = self.fetch_token(http)?;
        let secret = token.secret().to_string();
        *self.cached.borrow_mut() = Some(token);
        Ok(secret)
    }
}
