//! Provisioning services.
//!
//! # Services
//!
//! - `admin_profile` - Upsert and verify the admin's profile document
//! - `credential` - Create or reset the admin's identity provider account

pub mod admin_profile;
pub mod credential;
mod error;

pub use admin_profile::{AdminProfileService, UpsertOutcome, VerifyReport};
pub use credential::{CredentialService, ResetOutcome};
pub use error::{BackendError, ProvisionError};
