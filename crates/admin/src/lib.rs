//! Apolo Admin library.
//!
//! This crate provides admin account provisioning as a library,
//! allowing it to be tested and reused by the CLI.
//!
//! # Modules
//!
//! - [`config`] - Firebase project and target account configuration
//! - [`google`] - OAuth access tokens (service account, metadata server, emulator)
//! - [`models`] - Admin profile document and identity provider account
//! - [`password`] - bcrypt hashing and verification
//! - [`store`] - Document store trait, Firestore REST client, in-memory store
//! - [`identity`] - Identity provider trait, Identity Toolkit REST client, in-memory provider
//! - [`services`] - Admin profile upsert/verify and credential reset
//!
//! # Security
//!
//! Passwords travel as [`secrecy::SecretString`] and are never logged. Only
//! record identifiers, emails, roles and outcomes appear in log output.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod google;
pub mod identity;
pub mod models;
pub mod password;
pub mod services;
pub mod store;

/// Build the HTTP client shared by the token source and both REST clients.
///
/// # Errors
///
/// Returns `reqwest::Error` if the TLS backend cannot be initialized.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .user_agent(concat!("apolo-admin/", env!("CARGO_PKG_VERSION")))
        .build()
}
