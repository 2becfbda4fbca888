//! Admin profile document.
//!
//! Stored in the `users` collection with camelCase field names:
//!
//! | Field | Type | Written |
//! |---|---|---|
//! | `email` | string | on create |
//! | `name` | string | on create |
//! | `role` | array of strings | on create and every update |
//! | `platform` | string | on create |
//! | `isDisabled` | boolean | on create |
//! | `passwordHash` | string (bcrypt) | on create and every update |
//! | `createdAt` | timestamp (server time) | on create |
//!
//! Profiles written by the web app may carry snake_case keys instead:
//! `password_hash` (read before `passwordHash`) and `is_disabled` or the
//! misspelled `isDisbaled`. Any set disabled flag disables the profile. An
//! update also rewrites `password_hash` when the document has one, so the
//! web login never keeps checking a stale hash.

use apolo_core::{Email, EmailError, Role};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::{Document, FieldValue, Fields};

/// Collection holding admin profiles.
pub const USERS_COLLECTION: &str = "users";

/// Document field names.
pub mod field {
    pub const EMAIL: &str = "email";
    pub const NAME: &str = "name";
    pub const ROLE: &str = "role";
    pub const PLATFORM: &str = "platform";
    pub const IS_DISABLED: &str = "isDisabled";
    pub const PASSWORD_HASH: &str = "passwordHash";
    pub const CREATED_AT: &str = "createdAt";

    /// Hash key written by the web app, preferred over `passwordHash`.
    pub const LEGACY_PASSWORD_HASH: &str = "password_hash";
    /// Disabled flags written by the web app.
    pub const LEGACY_DISABLED: [&str; 2] = ["isDisbaled", "is_disabled"];
}

/// A stored document could not be read as an admin profile.
#[derive(Debug, Error)]
pub enum ProfileDecodeError {
    #[error("missing or mistyped field: {0}")]
    MissingField(&'static str),

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

/// An admin profile (domain type).
#[derive(Debug, Clone, PartialEq)]
pub struct AdminProfile {
    pub email: Email,
    pub name: String,
    /// Capability tags, e.g. `["admin"]`.
    pub role: Vec<String>,
    pub platform: String,
    pub is_disabled: bool,
    /// bcrypt hash; `None` for profiles created by other tools without one.
    pub password_hash: Option<String>,
    /// Set by the store; `None` until the profile has been written.
    pub created_at: Option<DateTime<Utc>>,
}

impl AdminProfile {
    /// Whether the role tags grant admin access.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.iter().any(|tag| tag == Role::Admin.as_str())
    }

    /// Every field of a new profile, with `createdAt` left to the store.
    #[must_use]
    pub fn to_new_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::EMAIL.to_string(), FieldValue::from(self.email.as_str()));
        fields.insert(field::NAME.to_string(), FieldValue::from(self.name.as_str()));
        fields.insert(field::ROLE.to_string(), FieldValue::from(self.role.clone()));
        fields.insert(field::PLATFORM.to_string(), FieldValue::from(self.platform.as_str()));
        fields.insert(field::IS_DISABLED.to_string(), FieldValue::from(self.is_disabled));
        if let Some(hash) = &self.password_hash {
            fields.insert(field::PASSWORD_HASH.to_string(), FieldValue::from(hash.as_str()));
        }
        fields.insert(field::CREATED_AT.to_string(), FieldValue::ServerTimestamp);
        fields
    }

    /// The only fields a re-run touches on an existing profile.
    ///
    /// `existing` is the stored document; its `password_hash` key, if any,
    /// gets the new hash too.
    #[must_use]
    pub fn credential_fields(existing: &Document, password_hash: &str, role: &[String]) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::PASSWORD_HASH.to_string(), FieldValue::from(password_hash));
        if existing.get(field::LEGACY_PASSWORD_HASH).is_some() {
            fields.insert(
                field::LEGACY_PASSWORD_HASH.to_string(),
                FieldValue::from(password_hash),
            );
        }
        fields.insert(field::ROLE.to_string(), FieldValue::from(role.to_vec()));
        fields
    }

    /// Read a profile from a stored document.
    ///
    /// `role` may be stored as a single string or as an array. The hash and
    /// the disabled flag are also read from their web-app keys. Missing
    /// optional fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ProfileDecodeError` if `email` is missing or invalid.
    pub fn from_document(document: &Document) -> Result<Self, ProfileDecodeError> {
        let text = |name: &'static str| {
            document
                .get(name)
                .and_then(FieldValue::as_str)
                .map(str::to_owned)
        };

        let flag = |name: &str| {
            document
                .get(name)
                .and_then(FieldValue::as_bool)
                .unwrap_or(false)
        };

        let email = text(field::EMAIL).ok_or(ProfileDecodeError::MissingField(field::EMAIL))?;

        Ok(Self {
            email: Email::parse(&email)?,
            name: text(field::NAME).unwrap_or_default(),
            role: document
                .get(field::ROLE)
                .and_then(FieldValue::as_string_list)
                .unwrap_or_default(),
            platform: text(field::PLATFORM).unwrap_or_default(),
            is_disabled: flag(field::IS_DISABLED) || field::LEGACY_DISABLED.into_iter().any(flag),
            password_hash: text(field::LEGACY_PASSWORD_HASH)
                .filter(|hash| !hash.is_empty())
                .or_else(|| text(field::PASSWORD_HASH)),
            created_at: document
                .get(field::CREATED_AT)
                .and_then(FieldValue::as_timestamp),
        })
    }
}
