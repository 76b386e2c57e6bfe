use std::path::PathBuf;

use thiserror::Error;

/// Reason code reported when the package has never been uploaded.
pub const APPLICATION_NOT_FOUND_REASON: &str = "applicationNotFound";

/// Failures raised by the remote side: HTTP transport, the publishing API
/// itself, or the OAuth2 token endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered with a non-success status.
    #[error("{method} {url} failed with status {status}: {message}")]
    Status {
        method: String,
        url: String,
        status: u16,
        message: String,
        /// `reason` values from the error payload's `errors` list
        reasons: Vec<String>,
    },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A success response whose body could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The token endpoint rejected the signed assertion.
    #[error("token exchange failed with status {status}: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Token {
        status: u16,
        error: String,
        description: Option<String>,
    },
}

impl ApiError {
    /// HTTP status of the failure, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::Token { status, .. } => Some(*status),
            ApiError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            ApiError::Decode { .. } => None,
        }
    }

    /// Whether the error payload lists `reason`.
    pub fn has_reason(&self, reason: &str) -> bool {
        match self {
            ApiError::Status { reasons, .. } => reasons.iter().any(|r| r == reason),
            _ => false,
        }
    }
}

/// Errors surfaced to callers of play-publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Operator action is required: fix the configuration, upload the first
    /// release manually, or regenerate credentials.
    #[error("{message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<Box<ApiError>>,
    },

    /// A key file could not be read.
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key material was read but is not a usable service account key.
    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    /// Any other remote failure, passed through untouched.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl PublishError {
    /// Configuration error without an underlying cause.
    pub fn configuration(message: impl Into<String>) -> Self {
        PublishError::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Configuration error caused by a remote failure.
    pub fn configuration_from(message: impl Into<String>, source: ApiError) -> Self {
        PublishError::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, PublishError::Configuration { .. })
    }

    /// The wrapped remote error, if this is a pass-through failure.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            PublishError::Api(err) => Some(err),
            _ => None,
        }
    }
}
