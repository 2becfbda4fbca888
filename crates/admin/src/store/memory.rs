//! In-process document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use apolo_core::DocumentId;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Document, DocumentStore, FieldValue, Fields, StoreError};

/// A [`DocumentStore`] backed by a map of collections.
///
/// Documents keep insertion order, so `find` returns the oldest match first.
/// [`MemoryStore::set_unavailable`] makes every call fail, simulating an
/// outage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle outage simulation.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of every document in `collection`, in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Store a document under an explicit ID, bypassing uniqueness checks.
    ///
    /// Useful for seeding pre-existing (or duplicate) data.
    pub async fn seed(&self, collection: &str, id: impl Into<DocumentId>, fields: Fields) {
        let document = Document {
            id: id.into(),
            fields: resolve_server_values(fields),
        };
        self.collections
            .lock()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 503,
                message: "store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

/// Replace server-value sentinels with the current time.
fn resolve_server_values(fields: Fields) -> Fields {
    let now = Utc::now();
    fields
        .into_iter()
        .map(|(name, value)| match value {
            FieldValue::ServerTimestamp => (name, FieldValue::Timestamp(now)),
            other => (name, other),
        })
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        field: &str,
        value: &FieldValue,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        self.check_available()?;

        let collections = self.collections.lock().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| doc.get(field) == Some(value))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<DocumentId, StoreError> {
        self.check_available()?;

        let id = DocumentId::new(Uuid::new_v4().to_string());
        self.collections
            .lock()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(Document {
                id: id.clone(),
                fields: resolve_server_values(fields),
            });

        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.check_available()?;

        let mut collections = self.collections.lock().await;
        let document = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| &doc.id == id))
            .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;

        document.fields.extend(resolve_server_values(fields));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(email: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("email".to_string(), FieldValue::from(email));
        fields.insert("name".to_string(), FieldValue::from("Original"));
        fields
    }

    #[tokio::test]
    async fn test_find_returns_matches_in_insertion_order() {
        let store = MemoryStore::new();
        store.seed("users", "first", user("a@x.com")).await;
        store.seed("users", "other", user("b@x.com")).await;
        store.seed("users", "second", user("a@x.com")).await;

        let found = store
            .find("users", "email", &FieldValue::from("a@x.com"), 10)
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["first", "second"]);

        let limited = store
            .find("users", "email", &FieldValue::from("a@x.com"), 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_resolves_server_timestamp() {
        let store = MemoryStore::new();
        let mut fields = user("a@x.com");
        fields.insert("createdAt".to_string(), FieldValue::ServerTimestamp);

        let id = store.insert("users", fields).await.unwrap();
        let docs = store.documents("users").await;

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
        assert!(docs[0].get("createdAt").unwrap().as_timestamp().is_some());
    }

    #[tokio::test]
    async fn test_update_merges_only_given_fields() {
        let store = MemoryStore::new();
        store.seed("users", "u1", user("a@x.com")).await;

        let mut patch = Fields::new();
        patch.insert("passwordHash".to_string(), FieldValue::from("h"));
        store
            .update("users", &DocumentId::new("u1"), patch)
            .await
            .unwrap();

        let doc = &store.documents("users").await[0];
        assert_eq!(doc.get("name"), Some(&FieldValue::from("Original")));
        assert_eq!(doc.get("passwordHash"), Some(&FieldValue::from("h")));
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = MemoryStore::new();
        let result = store
            .update("users", &DocumentId::new("nope"), Fields::new())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        assert!(store
            .find("users", "email", &FieldValue::from("a@x.com"), 1)
            .await
            .is_err());
        assert!(store.insert("users", user("a@x.com")).await.is_err());
        assert!(store.documents("users").await.is_empty());
    }
}
