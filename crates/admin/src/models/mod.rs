//! Domain models for the two provisioned records.
//!
//! - [`AdminProfile`] - the admin's document in the `users` collection
//! - [`AuthCredential`] - the matching identity provider account
//!
//! The two are not linked by ID; the email address is the only join key.

pub mod admin_profile;
pub mod auth_credential;

pub use admin_profile::{AdminProfile, ProfileDecodeError, USERS_COLLECTION};
pub use auth_credential::AuthCredential;
