//! Credential reset service.
//!
//! Per run: look up by email, then either set the new password on the found
//! account or, if the lookup says the account does not exist, create it with
//! `emailVerified = true`. Any other failure ends the run. No retries.

use apolo_core::Email;
use secrecy::SecretString;
use tracing::{debug, info, instrument};

use super::ProvisionError;
use crate::identity::{IdentityError, IdentityProvider, NewIdentity};
use crate::models::AuthCredential;

/// What a reset did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// No account existed; one was created.
    Created(AuthCredential),
    /// The existing account's password was replaced.
    Updated(AuthCredential),
}

impl ResetOutcome {
    /// The account that now holds the password.
    #[must_use]
    pub const fn credential(&self) -> &AuthCredential {
        match self {
            Self::Created(credential) | Self::Updated(credential) => credential,
        }
    }
}

/// Credential reset service.
pub struct CredentialService<'a> {
    identity: &'a dyn IdentityProvider,
}

impl<'a> CredentialService<'a> {
    /// Create a new credential service.
    #[must_use]
    pub const fn new(identity: &'a dyn IdentityProvider) -> Self {
        Self { identity }
    }

    /// Make `password` the password of the account for `email`.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::Lookup` if the lookup fails for any reason
    /// other than a missing account, or `Write` if the update or create
    /// call fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn reset(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<ResetOutcome, ProvisionError> {
        match self.identity.get_user_by_email(email).await {
            Ok(user) => {
                self.identity
                    .update_password(&user.uid, password)
                    .await
                    .map_err(ProvisionError::write)?;

                info!(uid = %user.uid, "Password updated");
                Ok(ResetOutcome::Updated(user))
            }
            Err(IdentityError::NotFound(reason)) => {
                debug!(reason = %reason, "No account for email, creating one");

                let user = self
                    .identity
                    .create_user(NewIdentity {
                        email: email.clone(),
                        password: password.clone(),
                        email_verified: true,
                    })
                    .await
                    .map_err(ProvisionError::write)?;

                info!(uid = %user.uid, "Account created");
                Ok(ResetOutcome::Created(user))
            }
            Err(err) => Err(ProvisionError::lookup(err)),
        }
    }
}
