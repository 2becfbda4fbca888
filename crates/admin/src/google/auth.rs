//! Access token acquisition and caching.

use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::{CredentialsError, ServiceAccountKey};
use crate::config::FirebaseConfig;

/// OAuth scope covering both Firestore and Identity Toolkit.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Firebase emulators accept this bearer token as an admin credential.
const EMULATOR_TOKEN: &str = "owner";

/// A short-lived OAuth access token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// Bearer token for API requests.
    pub token: SecretString,
    /// Unix timestamp when the token expires.
    pub expires_at: i64,
}

impl AccessToken {
    /// Check if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 60 seconds remaining
        self.expires_within(60)
    }

    /// Check if the token will expire within the given number of seconds.
    #[must_use]
    pub fn expires_within(&self, seconds: i64) -> bool {
        let now = chrono::Utc::now().timestamp();
        now >= self.expires_at - seconds
    }
}

/// Successful response from a token endpoint or the metadata server.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

/// OAuth error body (`{"error": "...", "error_description": "..."}`).
#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Local Firebase emulator; no real token needed.
    Emulator,
    /// Service account key file.
    ServiceAccount(ServiceAccountKey),
    /// Application Default Credentials via the metadata server at `host`.
    MetadataServer {
        /// `host[:port]` of the metadata server.
        host: String,
    },
}

/// Access token provider shared by the REST clients.
#[derive(Debug)]
pub struct GoogleAuth {
    http: reqwest::Client,
    source: CredentialSource,
    /// In-memory token cache
    token: RwLock<Option<AccessToken>>,
}

impl GoogleAuth {
    /// Create a token provider for the given source.
    #[must_use]
    pub fn new(http: reqwest::Client, source: CredentialSource) -> Self {
        Self {
            http,
            source,
            token: RwLock::new(None),
        }
    }

    /// Token provider for a local Firebase emulator.
    #[must_use]
    pub fn emulator(http: reqwest::Client) -> Self {
        Self::new(http, CredentialSource::Emulator)
    }

    /// Resolve credentials the way the platform SDK does.
    ///
    /// Uses the service account file if it exists, otherwise falls back to
    /// Application Default Credentials from the metadata server.
    ///
    /// # Errors
    ///
    /// Returns `CredentialsError` if the service account file exists but
    /// cannot be read or parsed.
    pub async fn from_config(
        http: reqwest::Client,
        config: &FirebaseConfig,
    ) -> Result<Self, CredentialsError> {
        let path = &config.service_account_path;
        let source = if tokio::fs::try_exists(path).await.unwrap_or(false) {
            info!(path = %path.display(), "Using service account file for credentials");
            CredentialSource::ServiceAccount(ServiceAccountKey::from_file(path).await?)
        } else {
            info!(
                host = %config.metadata_host,
                "Using Application Default Credentials (metadata server)"
            );
            CredentialSource::MetadataServer {
                host: config.metadata_host.clone(),
            }
        };

        Ok(Self::new(http, source))
    }

    /// The credential source this provider was built with.
    #[must_use]
    pub const fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Return a valid bearer token, fetching a new one if the cache is stale.
    ///
    /// # Errors
    ///
    /// Returns `CredentialsError` if the token endpoint or metadata server
    /// cannot be reached or rejects the request.
    #[instrument(skip(self))]
    pub async fn bearer_token(&self) -> Result<SecretString, CredentialsError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.token.clone());
            }
        }

        let fresh = match &self.source {
            CredentialSource::Emulator => return Ok(SecretString::from(EMULATOR_TOKEN)),
            CredentialSource::ServiceAccount(key) => exchange_assertion(&self.http, key).await?,
            CredentialSource::MetadataServer { host } => {
                fetch_metadata_token(&self.http, host).await?
            }
        };

        debug!(expires_at = fresh.expires_at, "Obtained new access token");

        let token = fresh.token.clone();
        *self.token.write().await = Some(fresh);
        Ok(token)
    }
}

/// Exchange a signed service account assertion for an access token.
async fn exchange_assertion(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
) -> Result<AccessToken, CredentialsError> {
    let now = chrono::Utc::now().timestamp();
    let assertion = key.assertion(now)?;

    let response = http
        .post(&key.token_uri)
        .form(&[
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .await?;

    parse_token_response(response, now).await
}

/// Fetch the default service account's token from the metadata server.
async fn fetch_metadata_token(
    http: &reqwest::Client,
    host: &str,
) -> Result<AccessToken, CredentialsError> {
    let now = chrono::Utc::now().timestamp();

    let response = http
        .get(format!(
            "http://{host}/computeMetadata/v1/instance/service-accounts/default/token"
        ))
        .header("Metadata-Flavor", "Google")
        .send()
        .await?;

    parse_token_response(response, now).await
}

async fn parse_token_response(
    response: reqwest::Response,
    now: i64,
) -> Result<AccessToken, CredentialsError> {
    let status = response.status();

    if status.is_success() {
        let body: TokenResponse = response.json().await?;
        return Ok(AccessToken {
            token: SecretString::from(body.access_token),
            expires_at: now + body.expires_in,
        });
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    let message = serde_json::from_str::<TokenErrorResponse>(&error_text)
        .ok()
        .and_then(|e| e.error_description.or(e.error))
        .unwrap_or(error_text);

    Err(CredentialsError::TokenExchange(format!(
        "HTTP {status}: {message}"
    )))
}
