//! Provisioning error types.

use thiserror::Error;

use crate::identity::IdentityError;
use crate::models::ProfileDecodeError;
use crate::store::StoreError;

/// Failure reported by one of the backing services.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Errors that can occur during a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The lookup call could not complete.
    #[error("lookup failed: {0}")]
    Lookup(#[source] BackendError),

    /// The create or update call failed.
    #[error("write failed: {0}")]
    Write(#[source] BackendError),

    /// Password hashing or hash verification failed.
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    /// A stored profile could not be decoded.
    #[error("stored profile is invalid: {0}")]
    InvalidProfile(#[from] ProfileDecodeError),

    /// No profile exists for the email.
    #[error("no admin profile found for {0}")]
    ProfileNotFound(String),

    /// The profile exists but stores no password hash.
    #[error("admin profile for {0} has no password hash")]
    MissingPasswordHash(String),

    /// The password does not match the stored hash.
    #[error("password does not match the stored hash for {0}")]
    PasswordMismatch(String),
}

impl ProvisionError {
    pub(crate) fn lookup(err: impl Into<BackendError>) -> Self {
        Self::Lookup(err.into())
    }

    pub(crate) fn write(err: impl Into<BackendError>) -> Self {
        Self::Write(err.into())
    }
}
