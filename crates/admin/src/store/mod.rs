//! Document store access.
//!
//! The provisioning services only need three operations from the store:
//! find by field equality, insert, and partial update. [`DocumentStore`] is
//! that seam; [`FirestoreClient`] talks to Cloud Firestore over REST and
//! [`MemoryStore`] keeps documents in process for tests and dry runs.

pub mod document;
pub mod firestore;
pub mod memory;

pub use document::{Document, FieldValue, Fields};
pub use firestore::FirestoreClient;
pub use memory::MemoryStore;

use apolo_core::DocumentId;
use async_trait::async_trait;
use thiserror::Error;

use crate::google::CredentialsError;

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed before a response arrived.
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The store answered with an error status.
    #[error("store API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The response could not be decoded.
    #[error("store response error: {0}")]
    Decode(String),

    /// An update targeted a document that does not exist.
    #[error("document not found: {0}")]
    NotFound(String),

    /// An insert targeted a document that already exists.
    #[error("document already exists: {0}")]
    AlreadyExists(String),

    /// No access token could be obtained.
    #[error("store credentials error: {0}")]
    Credentials(#[from] CredentialsError),
}

/// Minimal document store interface used by the provisioning services.
///
/// Each call is atomic on its own; nothing spans two calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return up to `limit` documents in `collection` whose `field` equals
    /// `value`, in the store's natural order.
    async fn find(
        &self,
        collection: &str,
        field: &str,
        value: &FieldValue,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;

    /// Create a new document and return its generated ID.
    ///
    /// Fields holding [`FieldValue::ServerTimestamp`] are set by the store.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<DocumentId, StoreError>;

    /// Overwrite only the given fields of an existing document.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError>;
}
