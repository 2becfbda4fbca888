//! In-process identity provider.

use std::sync::atomic::{AtomicBool, Ordering};

use apolo_core::{Email, Uid};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{IdentityError, IdentityProvider, NewIdentity};
use crate::models::AuthCredential;

#[derive(Debug)]
struct Account {
    credential: AuthCredential,
    password: SecretString,
}

/// An [`IdentityProvider`] that keeps accounts in memory.
///
/// Emails are unique, as in the hosted provider. Creating a duplicate fails
/// with `EMAIL_EXISTS`. [`MemoryIdentityProvider::set_unavailable`] makes
/// every call fail, simulating an outage.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    accounts: Mutex<Vec<Account>>,
    unavailable: AtomicBool,
}

impl MemoryIdentityProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle outage simulation.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of every account, in creation order.
    pub async fn users(&self) -> Vec<AuthCredential> {
        self.accounts
            .lock()
            .await
            .iter()
            .map(|account| account.credential.clone())
            .collect()
    }

    /// Whether the account for `email` exists and has this password.
    pub async fn password_matches(&self, email: &Email, password: &str) -> bool {
        self.accounts
            .lock()
            .await
            .iter()
            .find(|account| account.credential.email == email.as_str())
            .is_some_and(|account| account.password.expose_secret() == password)
    }

    fn check_available(&self) -> Result<(), IdentityError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IdentityError::Api {
                status: 503,
                message: "identity provider unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn get_user_by_email(&self, email: &Email) -> Result<AuthCredential, IdentityError> {
        self.check_available()?;

        self.accounts
            .lock()
            .await
            .iter()
            .find(|account| account.credential.email == email.as_str())
            .map(|account| account.credential.clone())
            .ok_or_else(|| IdentityError::NotFound(format!("no user record for {email}")))
    }

    async fn create_user(&self, user: NewIdentity) -> Result<AuthCredential, IdentityError> {
        self.check_available()?;

        let mut accounts = self.accounts.lock().await;
        if accounts
            .iter()
            .any(|account| account.credential.email == user.email.as_str())
        {
            return Err(IdentityError::Api {
                status: 400,
                message: "EMAIL_EXISTS".to_string(),
            });
        }

        let credential = AuthCredential {
            uid: Uid::new(Uuid::new_v4().simple().to_string()),
            email: user.email.into_inner(),
            email_verified: user.email_verified,
            disabled: false,
        };
        accounts.push(Account {
            credential: credential.clone(),
            password: user.password,
        });

        Ok(credential)
    }

    async fn update_password(
        &self,
        uid: &Uid,
        password: &SecretString,
    ) -> Result<(), IdentityError> {
        self.check_available()?;

        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .iter_mut()
            .find(|account| &account.credential.uid == uid)
            .ok_or_else(|| IdentityError::NotFound(format!("no user record for uid {uid}")))?;

        account.password = password.clone();
        Ok(())
    }
}
