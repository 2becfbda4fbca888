//! Apolo Core - Shared types library.
//!
//! This crate provides common types used across the Apolo admin tools:
//! - `admin` - Platform clients and provisioning services
//! - `cli` - Operator command-line entry point
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no
//! password hashing. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for emails, document IDs, provider UIDs and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
