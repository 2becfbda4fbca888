//! Google OAuth access tokens for the Firebase REST APIs.
//!
//! # Credential sources
//!
//! Resolved once at startup, in this order:
//!
//! 1. Local emulator - a fixed `owner` bearer token, no network call
//! 2. Service account file - RS256-signed JWT assertion exchanged at the
//!    key's `token_uri`
//! 3. Application Default Credentials - the GCE / Cloud Run metadata server
//!
//! Tokens are cached in memory and re-fetched shortly before they expire.

pub mod auth;
pub mod service_account;

pub use auth::{AccessToken, CLOUD_PLATFORM_SCOPE, CredentialSource, GoogleAuth};
pub use service_account::ServiceAccountKey;

use thiserror::Error;

/// Errors that can occur while obtaining an access token.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service account file could not be read.
    #[error("Failed to read service account file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Service account file is not valid JSON or lacks required fields.
    #[error("Invalid service account file: {0}")]
    InvalidKey(#[from] serde_json::Error),

    /// The JWT assertion could not be signed (bad private key).
    #[error("Failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// The token endpoint rejected the request.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
}

/// Error envelope shared by Google REST APIs.
///
/// `{"error": {"code": 404, "message": "...", "status": "NOT_FOUND"}}`
#[derive(Debug, serde::Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// A decoded Google API error: canonical status name (if any) and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ApiError {
    pub status: Option<String>,
    pub message: String,
}

/// Decode a Google API error body, falling back to the raw text.
pub(crate) fn parse_api_error(body: &str) -> ApiError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => ApiError {
            status: envelope.error.status,
            message: envelope
                .error
                .message
                .unwrap_or_else(|| "Unknown error".to_string()),
        },
        Err(_) if body.trim().is_empty() => ApiError {
            status: None,
            message: "Unknown error".to_string(),
        },
        Err(_) => ApiError {
            status: None,
            message: body.trim().to_string(),
        },
    }
}
