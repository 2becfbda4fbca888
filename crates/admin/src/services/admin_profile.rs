//! Admin profile service.
//!
//! Keeps exactly one profile document per admin email in the `users`
//! collection. The store has no uniqueness constraint on `email`, so the
//! service queries first and then either updates or inserts.

use apolo_core::{DocumentId, Email};
use secrecy::SecretString;
use tracing::{info, instrument, warn};

use super::ProvisionError;
use crate::config::AdminAccount;
use crate::models::admin_profile::field;
use crate::models::{AdminProfile, USERS_COLLECTION};
use crate::password::{hash_password, verify_password};
use crate::store::{Document, DocumentStore, FieldValue};

/// Enough to tell "one match" from "duplicates".
const LOOKUP_LIMIT: usize = 2;

/// What an upsert did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No profile existed; a new one was inserted.
    Created(DocumentId),
    /// An existing profile had its password hash and role replaced.
    Updated(DocumentId),
}

impl UpsertOutcome {
    /// ID of the profile document that was written.
    #[must_use]
    pub const fn id(&self) -> &DocumentId {
        match self {
            Self::Created(id) | Self::Updated(id) => id,
        }
    }
}

/// Result of a successful password check against a stored profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub id: DocumentId,
    pub role: Vec<String>,
    pub is_admin: bool,
    pub is_disabled: bool,
}

/// Admin profile service.
pub struct AdminProfileService<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> AdminProfileService<'a> {
    /// Create a new admin profile service.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Create the admin's profile, or refresh its password hash and role.
    ///
    /// An existing profile keeps its `name`, `platform` and `createdAt`. When
    /// several profiles share the email only the first is updated.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::Hash` if hashing fails, `Lookup` if the query
    /// fails, or `Write` if the insert or update fails.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn upsert(&self, account: &AdminAccount) -> Result<UpsertOutcome, ProvisionError> {
        let password_hash = hash_password(&account.password)?;
        let role = account.role_tags();

        let matches = self.find_by_email(&account.email).await?;

        if let Some(existing) = matches.first() {
            if matches.len() > 1 {
                warn!(
                    id = %existing.id,
                    matches = matches.len(),
                    "Multiple profiles share this email, updating the first"
                );
            }

            self.store
                .update(
                    USERS_COLLECTION,
                    &existing.id,
                    AdminProfile::credential_fields(existing, &password_hash, &role),
                )
                .await
                .map_err(ProvisionError::write)?;

            info!(id = %existing.id, role = ?role, "Admin profile updated");
            return Ok(UpsertOutcome::Updated(existing.id.clone()));
        }

        let profile = AdminProfile {
            email: account.email.clone(),
            name: account.name.clone(),
            role,
            platform: account.platform.clone(),
            is_disabled: false,
            password_hash: Some(password_hash),
            created_at: None,
        };

        let id = self
            .store
            .insert(USERS_COLLECTION, profile.to_new_fields())
            .await
            .map_err(ProvisionError::write)?;

        info!(id = %id, role = ?profile.role, "Admin profile created");
        Ok(UpsertOutcome::Created(id))
    }

    /// Check a password against the stored profile's hash.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::ProfileNotFound` if no profile exists,
    /// `PasswordMismatch` if the password is wrong, `MissingPasswordHash` or
    /// `InvalidProfile` if the stored profile cannot be checked, and `Lookup`
    /// if the query fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn verify(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<VerifyReport, ProvisionError> {
        let document = self
            .find_by_email(email)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProvisionError::ProfileNotFound(email.to_string()))?;

        let profile = AdminProfile::from_document(&document)?;
        let hash = profile
            .password_hash
            .as_deref()
            .ok_or_else(|| ProvisionError::MissingPasswordHash(email.to_string()))?;

        if !verify_password(password, hash)? {
            return Err(ProvisionError::PasswordMismatch(email.to_string()));
        }

        info!(id = %document.id, "Password matches stored hash");

        Ok(VerifyReport {
            id: document.id,
            is_admin: profile.is_admin(),
            is_disabled: profile.is_disabled,
            role: profile.role,
        })
    }

    async fn find_by_email(&self, email: &Email) -> Result<Vec<Document>, ProvisionError> {
        self.store
            .find(
                USERS_COLLECTION,
                field::EMAIL,
                &FieldValue::from(email.as_str()),
                LOOKUP_LIMIT,
            )
            .await
            .map_err(ProvisionError::lookup)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use apolo_core::Role;

    use super::*;
    use crate::store::{Fields, MemoryStore};

    fn account(password: &str, roles: Vec<Role>) -> AdminAccount {
        AdminAccount {
            email: Email::parse("admin@x.com").unwrap(),
            name: "Administrador IDECAP".to_string(),
            roles,
            platform: "web".to_string(),
            password: SecretString::from(password),
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_profile_in_empty_store() {
        let store = MemoryStore::new();
        let service = AdminProfileService::new(&store);

        let outcome = service
            .upsert(&account("Secret.1", vec![Role::Admin]))
            .await
            .unwrap();
        assert!(matches!(outcome, UpsertOutcome::Created(_)));

        let docs = store.documents(USERS_COLLECTION).await;
        assert_eq!(docs.len(), 1);
        let profile = AdminProfile::from_document(&docs[0]).unwrap();
        assert_eq!(profile.role, ["admin"]);
        assert_eq!(profile.platform, "web");
        assert!(!profile.is_disabled);
        assert!(profile.created_at.is_some());
        let hash = profile.password_hash.unwrap();
        assert!(verify_password(&SecretString::from("Secret.1"), &hash).unwrap());
    }

    #[tokio::test]
    async fn test_upsert_updates_only_hash_and_role() {
        let store = MemoryStore::new();
        let service = AdminProfileService::new(&store);

        let first = service
            .upsert(&account("Secret.1", vec![Role::Admin]))
            .await
            .unwrap();
        let before = AdminProfile::from_document(&store.documents(USERS_COLLECTION).await[0]).unwrap();

        let mut renamed = account("Secret.2", vec![Role::Admin, Role::Author]);
        renamed.name = "Someone Else".to_string();
        renamed.platform = "mobile".to_string();
        let second = service.upsert(&renamed).await.unwrap();

        assert_eq!(second, UpsertOutcome::Updated(first.id().clone()));

        let docs = store.documents(USERS_COLLECTION).await;
        assert_eq!(docs.len(), 1);
        let after = AdminProfile::from_document(&docs[0]).unwrap();
        assert_eq!(after.name, before.name);
        assert_eq!(after.platform, before.platform);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.role, ["admin", "author"]);
        assert_ne!(after.password_hash, before.password_hash);
        assert!(
            verify_password(&SecretString::from("Secret.2"), &after.password_hash.unwrap())
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_upsert_prepends_admin_role() {
        let store = MemoryStore::new();
        let service = AdminProfileService::new(&store);

        service
            .upsert(&account("Secret.1", vec![Role::Tutor]))
            .await
            .unwrap();

        let profile = AdminProfile::from_document(&store.documents(USERS_COLLECTION).await[0]).unwrap();
        assert_eq!(profile.role, ["admin", "tutor"]);
    }

    #[tokio::test]
    async fn test_upsert_with_duplicates_updates_first_only() {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("email".to_string(), FieldValue::from("admin@x.com"));
        fields.insert("passwordHash".to_string(), FieldValue::from("old"));
        store.seed(USERS_COLLECTION, "first", fields.clone()).await;
        store.seed(USERS_COLLECTION, "second", fields).await;

        let service = AdminProfileService::new(&store);
        let outcome = service
            .upsert(&account("Secret.1", vec![Role::Admin]))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated(DocumentId::new("first")));

        let docs = store.documents(USERS_COLLECTION).await;
        assert_eq!(docs.len(), 2);
        assert_ne!(docs[0].get("passwordHash"), Some(&FieldValue::from("old")));
        assert_eq!(docs[1].get("passwordHash"), Some(&FieldValue::from("old")));
    }

    #[tokio::test]
    async fn test_upsert_lookup_failure_is_an_error() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let service = AdminProfileService::new(&store);

        let result = service.upsert(&account("Secret.1", vec![Role::Admin])).await;
        assert!(matches!(result, Err(ProvisionError::Lookup(_))));
    }

    #[tokio::test]
    async fn test_verify_accepts_current_password_only() {
        let store = MemoryStore::new();
        let service = AdminProfileService::new(&store);
        service
            .upsert(&account("Secret.1", vec![Role::Admin]))
            .await
            .unwrap();

        let email = Email::parse("admin@x.com").unwrap();
        let report = service
            .verify(&email, &SecretString::from("Secret.1"))
            .await
            .unwrap();
        assert!(report.is_admin);
        assert!(!report.is_disabled);

        let wrong = service.verify(&email, &SecretString::from("Secret.2")).await;
        assert!(matches!(wrong, Err(ProvisionError::PasswordMismatch(_))));
    }

    #[tokio::test]
    async fn test_verify_reads_web_app_profile_keys() {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("email".to_string(), FieldValue::from("admin@x.com"));
        fields.insert("role".to_string(), FieldValue::from("admin"));
        fields.insert("isDisbaled".to_string(), FieldValue::Boolean(true));
        fields.insert(
            "password_hash".to_string(),
            FieldValue::from(hash_password(&SecretString::from("Secret.1")).unwrap()),
        );
        store.seed(USERS_COLLECTION, "legacy", fields).await;

        let service = AdminProfileService::new(&store);
        let email = Email::parse("admin@x.com").unwrap();
        let report = service
            .verify(&email, &SecretString::from("Secret.1"))
            .await
            .unwrap();
        assert!(report.is_disabled);
        assert!(report.is_admin);
    }

    #[tokio::test]
    async fn test_upsert_refreshes_snake_case_hash() {
        let store = MemoryStore::new();
        let mut fields = Fields::new();
        fields.insert("email".to_string(), FieldValue::from("admin@x.com"));
        fields.insert(
            "password_hash".to_string(),
            FieldValue::from(hash_password(&SecretString::from("Old.Secret")).unwrap()),
        );
        store.seed(USERS_COLLECTION, "legacy", fields).await;

        let service = AdminProfileService::new(&store);
        service
            .upsert(&account("Secret.2", vec![Role::Admin]))
            .await
            .unwrap();

        let doc = &store.documents(USERS_COLLECTION).await[0];
        assert_eq!(doc.get("password_hash"), doc.get("passwordHash"));

        let email = Email::parse("admin@x.com").unwrap();
        assert!(service.verify(&email, &SecretString::from("Secret.2")).await.is_ok());
        let stale = service.verify(&email, &SecretString::from("Old.Secret")).await;
        assert!(matches!(stale, Err(ProvisionError::PasswordMismatch(_))));
    }

    #[tokio::test]
    async fn test_verify_missing_profile() {
        let store = MemoryStore::new();
        let service = AdminProfileService::new(&store);
        let email = Email::parse("admin@x.com").unwrap();

        let result = service.verify(&email, &SecretString::from("Secret.1")).await;
        assert!(matches!(result, Err(ProvisionError::ProfileNotFound(_))));
    }
}
