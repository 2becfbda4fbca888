//! Identity Toolkit REST client.
//!
//! Uses the project-scoped admin endpoints of the `v1` API:
//!
//! - `accounts:lookup` - find an account by email
//! - `accounts` - create an account
//! - `accounts:update` - set a new password
//!
//! Lookups that match nothing come back as an empty `users` list; older
//! deployments answer with a `USER_NOT_FOUND` or `EMAIL_NOT_FOUND` error
//! instead. Both map to [`IdentityError::NotFound`].

use std::sync::Arc;

use apolo_core::{Email, Uid};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{IdentityError, IdentityProvider, NewIdentity};
use crate::config::FirebaseConfig;
use crate::google::{GoogleAuth, parse_api_error};
use crate::models::AuthCredential;

/// Production Identity Toolkit endpoint.
const IDENTITY_TOOLKIT_BASE_URL: &str = "https://identitytoolkit.googleapis.com";

/// Error message prefixes that mean "no such account".
const NOT_FOUND_CODES: &[&str] = &["USER_NOT_FOUND", "EMAIL_NOT_FOUND"];

/// Identity Toolkit REST client implementing [`IdentityProvider`].
#[derive(Debug, Clone)]
pub struct IdentityToolkitClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: Arc<GoogleAuth>,
}

#[derive(Serialize)]
struct LookupRequest<'a> {
    email: [&'a str; 1],
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<UserInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    disabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    email: &'a str,
    password: &'a str,
    email_verified: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    local_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    local_id: &'a str,
    password: &'a str,
}

impl IdentityToolkitClient {
    /// Create a client for the production endpoint.
    #[must_use]
    pub fn new(http: reqwest::Client, project_id: &str, auth: Arc<GoogleAuth>) -> Self {
        Self::with_base_url(http, IDENTITY_TOOLKIT_BASE_URL, project_id, auth)
    }

    /// Create a client for a custom endpoint (emulator or test server).
    #[must_use]
    pub fn with_base_url(
        http: reqwest::Client,
        base_url: &str,
        project_id: &str,
        auth: Arc<GoogleAuth>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            auth,
        }
    }

    /// Create a client from configuration, honoring
    /// `FIREBASE_AUTH_EMULATOR_HOST`.
    ///
    /// When the emulator is configured, `auth` is ignored in favor of the
    /// emulator's fixed token.
    #[must_use]
    pub fn from_config(
        http: reqwest::Client,
        config: &FirebaseConfig,
        auth: Arc<GoogleAuth>,
    ) -> Self {
        match &config.auth_emulator_host {
            Some(host) => {
                info!(host = %host, "Using Firebase Auth emulator");
                let emulator = Arc::new(GoogleAuth::emulator(http.clone()));
                Self::with_base_url(
                    http,
                    &format!("http://{host}/identitytoolkit.googleapis.com"),
                    &config.project_id,
                    emulator,
                )
            }
            None => Self::new(http, &config.project_id, auth),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1/projects/{}/{method}", self.base_url, self.project_id)
    }

    async fn post<B, R>(&self, method: &str, body: &B) -> Result<R, IdentityError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let token = self.auth.bearer_token().await?;

        let response = self
            .http
            .post(self.endpoint(method))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_error(status.as_u16(), &text));
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))
    }
}

/// Map an error response, recognizing the "no such account" codes.
fn map_error(status: u16, body: &str) -> IdentityError {
    let error = parse_api_error(body);

    if NOT_FOUND_CODES
        .iter()
        .any(|code| error.message.starts_with(code))
    {
        return IdentityError::NotFound(error.message);
    }

    IdentityError::Api {
        status,
        message: error.message,
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitClient {
    #[instrument(skip(self), fields(email = %email))]
    async fn get_user_by_email(&self, email: &Email) -> Result<AuthCredential, IdentityError> {
        let response: LookupResponse = self
            .post(
                "accounts:lookup",
                &LookupRequest {
                    email: [email.as_str()],
                },
            )
            .await?;

        let user = response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::NotFound(format!("no user record for {email}")))?;

        debug!(uid = %user.local_id, "User found");

        Ok(AuthCredential {
            uid: Uid::new(user.local_id),
            email: user.email.unwrap_or_else(|| email.to_string()),
            email_verified: user.email_verified,
            disabled: user.disabled,
        })
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create_user(&self, user: NewIdentity) -> Result<AuthCredential, IdentityError> {
        let response: CreateResponse = self
            .post(
                "accounts",
                &CreateRequest {
                    email: user.email.as_str(),
                    password: user.password.expose_secret(),
                    email_verified: user.email_verified,
                },
            )
            .await?;

        debug!(uid = %response.local_id, "User created");

        Ok(AuthCredential {
            uid: Uid::new(response.local_id),
            email: user.email.into_inner(),
            email_verified: user.email_verified,
            disabled: false,
        })
    }

    #[instrument(skip(self, password), fields(uid = %uid))]
    async fn update_password(
        &self,
        uid: &Uid,
        password: &SecretString,
    ) -> Result<(), IdentityError> {
        let _: IgnoredAny = self
            .post(
                "accounts:update",
                &UpdateRequest {
                    local_id: uid.as_str(),
                    password: password.expose_secret(),
                },
            )
            .await?;

        debug!("Password updated");
        Ok(())
    }
}
