//! Google Play Developer API client for play-publisher.
//!
//! This crate provides an authenticated, blocking client for the
//! `androidpublisher/v3` edit endpoints and the [`EditsApi`] seam used by the
//! edit session.
//!
//! # Example
//!
//! ```no_run
//! use play_publisher_api::{EditsApi, PublisherClient};
//! use play_publisher_auth::StaticToken;
//!
//! let client = PublisherClient::new(StaticToken("ya29.token".to_string())).expect("client");
//! let edit = client.insert_edit("com.example.app").expect("insert");
//! client.delete_edit("com.example.app", &edit.id).expect("delete");
//! ```

use std::time::Duration;

use play_publisher_auth::{ServiceAccountCredential, TokenProvider};
use play_publisher_types::{ApiError, AppEdit, DEFAULT_API_BASE, EditId, PublishError};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Application name sent with every request.
pub const APPLICATION_NAME: &str = concat!("play-publisher/", env!("CARGO_PKG_VERSION"));

/// Connect timeout for API requests
pub const CONNECT_TIMEOUT_SECS: u64 = 100;

/// Read timeout for API requests
pub const READ_TIMEOUT_SECS: u64 = 100;

const API_PATH: [&str; 3] = ["androidpublisher", "v3", "applications"];

/// The edit lifecycle calls an edit session needs.
pub trait EditsApi {
    /// `edits.insert`: open a new edit for `package_name`.
    fn insert_edit(&self, package_name: &str) -> Result<AppEdit, PublishError>;

    /// `edits.commit`: publish everything staged in the edit.
    fn commit_edit(&self, package_name: &str, edit_id: &EditId) -> Result<AppEdit, PublishError>;

    /// `edits.delete`: throw the edit away.
    fn delete_edit(&self, package_name: &str, edit_id: &EditId) -> Result<(), PublishError>;
}

impl<A: EditsApi + ?Sized> EditsApi for &A {
    fn insert_edit(&self, package_name: &str) -> Result<AppEdit, PublishError> {
        (**self).insert_edit(package_name)
    }

    fn commit_edit(&self, package_name: &str, edit_id: &EditId) -> Result<AppEdit, PublishError> {
        (**self).commit_edit(package_name, edit_id)
    }

    fn delete_edit(&self, package_name: &str, edit_id: &EditId) -> Result<(), PublishError> {
        (**self).delete_edit(package_name, edit_id)
    }
}

/// Authenticated client for the publishing API.
#[derive(Debug)]
pub struct PublisherClient<T = ServiceAccountCredential> {
    base_url: String,
    root: Url,
    http: Client,
    tokens: T,
}

impl<T: TokenProvider> PublisherClient<T> {
    /// Create a client against the public API endpoint.
    pub fn new(tokens: T) -> Result<Self, PublishError> {
        Self::with_base_url(tokens, DEFAULT_API_BASE)
    }

    /// Create a client against a custom endpoint (emulators, tests).
    pub fn with_base_url(tokens: T, base_url: &str) -> Result<Self, PublishError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let root = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| PublishError::configuration(format!("Invalid API base URL: {base_url}")))?;
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .user_agent(APPLICATION_NAME)
            .build()
            .map_err(|source| ApiError::Transport {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            base_url,
            root,
            http,
            tokens,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token provider backing this client.
    pub fn credential(&self) -> &T {
        &self.tokens
    }

    /// `edits.get`
    pub fn get_edit(&self, package_name: &str, edit_id: &EditId) -> Result<AppEdit, PublishError> {
        let url = self.edit_url(package_name, &[edit_id.as_str()]);
        self.call_json(Method::GET, &url, None)
    }

    /// `edits.validate`: ask the server to check the staged changes.
    pub fn validate_edit(&self, package_name: &str, edit_id: &EditId) -> Result<AppEdit, PublishError> {
        let url = self.edit_url(package_name, &[&format!("{edit_id}:validate")]);
        self.call_json(Method::POST, &url, Some(&EmptyBody {}))
    }

    /// `edits.tracks.list`
    pub fn list_tracks(&self, package_name: &str, edit_id: &EditId) -> Result<Vec<Track>, PublishError> {
        let url = self.edit_url(package_name, &[edit_id.as_str(), "tracks"]);
        let response: TracksListResponse = self.call_json(Method::GET, &url, None)?;
        Ok(response.tracks)
    }

    fn edits_url(&self, package_name: &str) -> String {
        self.edit_url(package_name, &[])
    }

    /// `{base}/androidpublisher/v3/applications/{package}/edits/{segments..}`,
    /// each segment percent-encoded.
    fn edit_url(&self, package_name: &str, segments: &[&str]) -> String {
        let mut url = self.root.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(API_PATH)
                .push(package_name)
                .push("edits")
                .extend(segments);
        }
        url.into()
    }

    fn request(&self, method: Method, url: &str, body: Option<&EmptyBody>) -> Result<Response, PublishError> {
        let token = self.tokens.access_token(&self.http)?;
        let mut request: RequestBuilder = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, url, "publishing API request");
        let response = request.send().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .unwrap_or_else(|e| format!("<failed to read error body: {e}>"));
            return Err(parse_error_body(method.as_str(), url, status.as_u16(), &text).into());
        }

        Ok(response)
    }

    fn call_json<R: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&EmptyBody>,
    ) -> Result<R, PublishError> {
        let response = self.request(method, url, body)?;
        response.json().map_err(|e| {
            ApiError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }
}

impl<T: TokenProvider> EditsApi for PublisherClient<T> {
    fn insert_edit(&self, package_name: &str) -> Result<AppEdit, PublishError> {
        let url = self.edits_url(package_name);
        self.call_json(Method::POST, &url, Some(&EmptyBody {}))
    }

    fn commit_edit(&self, package_name: &str, edit_id: &EditId) -> Result<AppEdit, PublishError> {
        let url = self.edit_url(package_name, &[&format!("{edit_id}:commit")]);
        self.call_json(Method::POST, &url, Some(&EmptyBody {}))
    }

    fn delete_edit(&self, package_name: &str, edit_id: &EditId) -> Result<(), PublishError> {
        let url = self.edit_url(package_name, &[edit_id.as_str()]);
        self.request(Method::DELETE, &url, None).map(|_| ())
    }
}

/// A release track and its releases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Track name, e.g. `production` or `internal`
    pub track: String,
    #[serde(default)]
    pub releases: Vec<TrackRelease>,
}

/// A release within a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRelease {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub version_codes: Vec<String>,
    /// `draft`, `inProgress`, `halted` or `completed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_fraction: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct TracksListResponse {
    #[serde(default)]
    tracks: Vec<Track>,
}

#[derive(Debug, Serialize)]
struct EmptyBody {}

/// Error payload returned by Google APIs
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    reason: Option<String>,
}

/// Turn a non-success response body into an [`ApiError::Status`].
///
/// Bodies that are not Google error envelopes keep their raw text as the
/// message and carry no reasons.
pub fn parse_error_body(method: &str, url: &str, status: u16, body: &str) -> ApiError {
    let (message, reasons) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (
            envelope.error.message.unwrap_or_default(),
            envelope
                .error
                .errors
                .into_iter()
                .filter_map(|item| item.reason)
                .collect(),
        ),
        Err(_) => (body.trim().to_string(), Vec::new()),
    };

    ApiError::Status {
        method: method.to_string(),
        url: url.to_string(),
        status,
        message,
        reasons,
    }
}
