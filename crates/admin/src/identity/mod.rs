//! Identity provider access.
//!
//! [`IdentityProvider`] is the seam the credential service depends on.
//! [`IdentityToolkitClient`] talks to Firebase Authentication over the
//! Identity Toolkit REST API; [`MemoryIdentityProvider`] keeps accounts in
//! process for tests.

pub mod memory;
pub mod toolkit;

pub use memory::MemoryIdentityProvider;
pub use toolkit::IdentityToolkitClient;

use apolo_core::{Email, Uid};
use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use crate::google::CredentialsError;
use crate::models::AuthCredential;

/// Errors that can occur during identity provider operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No account matches the lookup. The only error callers branch on.
    #[error("user not found: {0}")]
    NotFound(String),

    /// HTTP request failed before a response arrived.
    #[error("identity request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with an error status.
    #[error("identity API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The response could not be decoded.
    #[error("identity response error: {0}")]
    Decode(String),

    /// No access token could be obtained.
    #[error("identity credentials error: {0}")]
    Credentials(#[from] CredentialsError),
}

/// A new account to create.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct NewIdentity {
    pub email: Email,
    pub password: SecretString,
    pub email_verified: bool,
}

impl std::fmt::Debug for NewIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewIdentity")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("email_verified", &self.email_verified)
            .finish()
    }
}

/// Minimal identity provider interface used by the credential service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up an account by email.
    ///
    /// Fails with [`IdentityError::NotFound`] if no account has this email.
    async fn get_user_by_email(&self, email: &Email) -> Result<AuthCredential, IdentityError>;

    /// Create an account and return it with its provider-assigned `uid`.
    async fn create_user(&self, user: NewIdentity) -> Result<AuthCredential, IdentityError>;

    /// Replace the password of an existing account.
    async fn update_password(&self, uid: &Uid, password: &SecretString)
    -> Result<(), IdentityError>;
}
