//! Cloud Firestore REST client.
//!
//! Talks to the `v1` REST API of the `(default)` database:
//!
//! - `documents:runQuery` - equality lookups
//! - `documents:commit` - inserts and partial updates, each a single write
//!   with a `currentDocument` precondition so an insert never overwrites and
//!   an update never creates
//!
//! [`FieldValue::ServerTimestamp`] fields are sent as `REQUEST_TIME` field
//! transforms rather than as values.

use std::sync::Arc;

use apolo_core::DocumentId;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::{Document, DocumentStore, FieldValue, Fields, StoreError};
use crate::config::FirebaseConfig;
use crate::google::{GoogleAuth, parse_api_error};

/// Production Firestore endpoint.
const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

/// Firestore REST client implementing [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    http: reqwest::Client,
    /// Scheme and host, without trailing slash
    base_url: String,
    /// `projects/{project}/databases/(default)/documents`
    database_path: String,
    auth: Arc<GoogleAuth>,
}

/// One element of a `runQuery` response stream.
#[derive(Deserialize)]
struct RunQueryRow {
    #[serde(default)]
    document: Option<RawDocument>,
}

#[derive(Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl FirestoreClient {
    /// Create a client for the production Firestore endpoint.
    #[must_use]
    pub fn new(http: reqwest::Client, project_id: &str, auth: Arc<GoogleAuth>) -> Self {
        Self::with_base_url(http, FIRESTORE_BASE_URL, project_id, auth)
    }

    /// Create a client for a custom endpoint (emulator or test server).
    #[must_use]
    pub fn with_base_url(
        http: reqwest::Client,
        base_url: &str,
        project_id: &str,
        auth: Arc<GoogleAuth>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            database_path: format!("projects/{project_id}/databases/(default)/documents"),
            auth,
        }
    }

    /// Create a client from configuration, honoring `FIRESTORE_EMULATOR_HOST`.
    ///
    /// When the emulator is configured, `auth` is ignored in favor of the
    /// emulator's fixed token.
    #[must_use]
    pub fn from_config(
        http: reqwest::Client,
        config: &FirebaseConfig,
        auth: Arc<GoogleAuth>,
    ) -> Self {
        match &config.firestore_emulator_host {
            Some(host) => {
                info!(host = %host, "Using Firestore emulator");
                let emulator = Arc::new(GoogleAuth::emulator(http.clone()));
                Self::with_base_url(http, &format!("http://{host}"), &config.project_id, emulator)
            }
            None => Self::new(http, &config.project_id, auth),
        }
    }

    fn documents_url(&self) -> String {
        format!("{}/v1/{}", self.base_url, self.database_path)
    }

    fn document_name(&self, collection: &str, id: &DocumentId) -> String {
        format!("{}/{collection}/{id}", self.database_path)
    }

    /// Build a single-write commit body.
    ///
    /// With `mask` set only the given fields are written (partial update);
    /// otherwise the document is written in full.
    fn build_write(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: &Fields,
        mask: bool,
        must_exist: bool,
    ) -> Value {
        let (transforms, values): (Vec<_>, Vec<_>) = fields
            .iter()
            .partition(|(_, value)| matches!(value, FieldValue::ServerTimestamp));

        let encoded: Map<String, Value> = values
            .iter()
            .map(|(name, value)| ((*name).clone(), encode_value(value)))
            .collect();

        let mut write = Map::new();
        write.insert(
            "update".to_string(),
            json!({
                "name": self.document_name(collection, id),
                "fields": encoded,
            }),
        );
        write.insert(
            "currentDocument".to_string(),
            json!({ "exists": must_exist }),
        );

        if mask {
            let paths: Vec<String> = values
                .iter()
                .map(|(name, _)| quote_field_path(name))
                .collect();
            write.insert("updateMask".to_string(), json!({ "fieldPaths": paths }));
        }

        if !transforms.is_empty() {
            let transforms: Vec<Value> = transforms
                .iter()
                .map(|(name, _)| {
                    json!({
                        "fieldPath": quote_field_path(name),
                        "setToServerValue": "REQUEST_TIME",
                    })
                })
                .collect();
            write.insert("updateTransforms".to_string(), Value::Array(transforms));
        }

        json!({ "writes": [Value::Object(write)] })
    }

    async fn commit(&self, body: &Value) -> Result<(), StoreError> {
        let token = self.auth.bearer_token().await?;

        let response = self
            .http
            .post(format!("{}:commit", self.documents_url()))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self, value), fields(collection = %collection, field = %field))]
    async fn find(
        &self,
        collection: &str,
        field: &str,
        value: &FieldValue,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let token = self.auth.bearer_token().await?;

        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": quote_field_path(field) },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                },
                "limit": limit,
            }
        });

        let response = self
            .http
            .post(format!("{}:runQuery", self.documents_url()))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let rows: Vec<RunQueryRow> = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let documents = rows
            .into_iter()
            .filter_map(|row| row.document)
            .map(|raw| decode_document(&raw))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(matches = documents.len(), "Query complete");
        Ok(documents)
    }

    #[instrument(skip(self, fields), fields(collection = %collection))]
    async fn insert(&self, collection: &str, fields: Fields) -> Result<DocumentId, StoreError> {
        let id = DocumentId::new(Uuid::new_v4().to_string());
        let body = self.build_write(collection, &id, &fields, false, false);
        self.commit(&body).await?;

        debug!(id = %id, "Document created");
        Ok(id)
    }

    #[instrument(skip(self, fields), fields(collection = %collection, id = %id))]
    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let body = self.build_write(collection, id, &fields, true, true);
        self.commit(&body).await?;

        debug!("Document updated");
        Ok(())
    }
}

/// Map a non-success response to a [`StoreError`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let error = parse_api_error(&text);

    match (status, error.status.as_deref()) {
        (StatusCode::NOT_FOUND, _) | (_, Some("NOT_FOUND")) => {
            Err(StoreError::NotFound(error.message))
        }
        (StatusCode::CONFLICT, _) | (_, Some("ALREADY_EXISTS")) => {
            Err(StoreError::AlreadyExists(error.message))
        }
        _ => Err(StoreError::Api {
            status: status.as_u16(),
            message: error.message,
        }),
    }
}

/// Backtick-quote a field path segment unless it is a simple identifier.
fn quote_field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Encode a value in Firestore's typed JSON form.
///
/// [`FieldValue::ServerTimestamp`] is only meaningful as a top-level write
/// transform; anywhere else it encodes as null.
fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null | FieldValue::ServerTimestamp => json!({ "nullValue": null }),
        FieldValue::Boolean(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => json!({ "doubleValue": d }),
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
        }
        FieldValue::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        FieldValue::Map(fields) => {
            let fields: Map<String, Value> = fields
                .iter()
                .map(|(name, value)| (name.clone(), encode_value(value)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

fn decode_error(what: &str, raw: &Value) -> StoreError {
    StoreError::Decode(format!("invalid {what}: {raw}"))
}

/// Decode Firestore's typed JSON form into a [`FieldValue`].
fn decode_value(raw: &Value) -> Result<FieldValue, StoreError> {
    let (kind, inner) = raw
        .as_object()
        .and_then(|obj| obj.iter().next())
        .ok_or_else(|| decode_error("value", raw))?;

    let value = match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Boolean(
            inner.as_bool().ok_or_else(|| decode_error("booleanValue", inner))?,
        ),
        "integerValue" => FieldValue::Integer(
            inner
                .as_str()
                .and_then(|s| s.parse().ok())
                .or_else(|| inner.as_i64())
                .ok_or_else(|| decode_error("integerValue", inner))?,
        ),
        "doubleValue" => FieldValue::Double(
            inner.as_f64().ok_or_else(|| decode_error("doubleValue", inner))?,
        ),
        // References and base64 bytes are kept in their wire form.
        "stringValue" | "referenceValue" | "bytesValue" => FieldValue::String(
            inner
                .as_str()
                .ok_or_else(|| decode_error(kind, inner))?
                .to_string(),
        ),
        "timestampValue" => {
            let parsed = inner
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .ok_or_else(|| decode_error("timestampValue", inner))?;
            FieldValue::Timestamp(parsed.with_timezone(&Utc))
        }
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            FieldValue::Array(values)
        }
        "mapValue" => FieldValue::Map(decode_fields(
            inner.get("fields").and_then(Value::as_object),
        )?),
        "geoPointValue" => FieldValue::Map(
            ["latitude", "longitude"]
                .into_iter()
                .map(|axis| {
                    let degrees = inner.get(axis).and_then(Value::as_f64).unwrap_or_default();
                    (axis.to_string(), FieldValue::Double(degrees))
                })
                .collect(),
        ),
        _ => return Err(decode_error("value type", raw)),
    };

    Ok(value)
}

fn decode_fields(raw: Option<&Map<String, Value>>) -> Result<Fields, StoreError> {
    raw.into_iter()
        .flatten()
        .map(|(name, value)| decode_value(value).map(|decoded| (name.clone(), decoded)))
        .collect()
}

fn decode_document(raw: &RawDocument) -> Result<Document, StoreError> {
    let id = raw
        .name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StoreError::Decode(format!("invalid document name: {}", raw.name)))?;

    Ok(Document {
        id: DocumentId::new(id),
        fields: decode_fields(Some(&raw.fields))?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn client() -> FirestoreClient {
        let http = reqwest::Client::new();
        let auth = Arc::new(GoogleAuth::emulator(http.clone()));
        FirestoreClient::with_base_url(http, "http://localhost:8080/", "apololms", auth)
    }

    #[test]
    fn test_documents_url() {
        assert_eq!(
            client().documents_url(),
            "http://localhost:8080/v1/projects/apololms/databases/(default)/documents"
        );
    }

    #[test]
    fn test_encode_scalar_values() {
        assert_eq!(encode_value(&FieldValue::Null), json!({ "nullValue": null }));
        assert_eq!(
            encode_value(&FieldValue::Boolean(false)),
            json!({ "booleanValue": false })
        );
        assert_eq!(
            encode_value(&FieldValue::Integer(42)),
            json!({ "integerValue": "42" })
        );
        assert_eq!(
            encode_value(&FieldValue::from("web")),
            json!({ "stringValue": "web" })
        );
        let ts = Utc.with_ymd_and_hms(2026, 1, 15, 8, 30, 0).unwrap();
        assert_eq!(
            encode_value(&FieldValue::Timestamp(ts)),
            json!({ "timestampValue": "2026-01-15T08:30:00.000000Z" })
        );
    }

    #[test]
    fn test_encode_nested_values() {
        let mut inner = Fields::new();
        inner.insert("plan".to_string(), FieldValue::from("free"));
        let value = FieldValue::Map(
            [(
                "subscription".to_string(),
                FieldValue::Map(inner),
            )]
            .into_iter()
            .collect(),
        );
        assert_eq!(
            encode_value(&value),
            json!({ "mapValue": { "fields": {
                "subscription": { "mapValue": { "fields": {
                    "plan": { "stringValue": "free" }
                }}}
            }}})
        );

        let roles = FieldValue::from(vec!["admin".to_string()]);
        assert_eq!(
            encode_value(&roles),
            json!({ "arrayValue": { "values": [{ "stringValue": "admin" }] } })
        );
    }

    #[test]
    fn test_decode_values() {
        assert_eq!(
            decode_value(&json!({ "integerValue": "7" })).unwrap(),
            FieldValue::Integer(7)
        );
        assert_eq!(
            decode_value(&json!({ "doubleValue": 1.5 })).unwrap(),
            FieldValue::Double(1.5)
        );
        assert_eq!(
            decode_value(&json!({ "timestampValue": "2026-01-15T08:30:00.123456Z" }))
                .unwrap()
                .as_timestamp()
                .unwrap()
                .timestamp(),
            Utc.with_ymd_and_hms(2026, 1, 15, 8, 30, 0).unwrap().timestamp()
        );
        assert_eq!(
            decode_value(&json!({ "arrayValue": {} })).unwrap(),
            FieldValue::Array(Vec::new())
        );
        assert_eq!(
            decode_value(&json!({ "mapValue": {} })).unwrap(),
            FieldValue::Map(Fields::new())
        );
    }

    #[test]
    fn test_decode_rejects_unknown_or_malformed() {
        assert!(decode_value(&json!({ "mysteryValue": 1 })).is_err());
        assert!(decode_value(&json!({ "booleanValue": "yes" })).is_err());
        assert!(decode_value(&json!("bare")).is_err());
    }

    #[test]
    fn test_decode_document_takes_last_path_segment() {
        let raw: RawDocument = serde_json::from_value(json!({
            "name": "projects/apololms/databases/(default)/documents/users/abc-123",
            "fields": { "email": { "stringValue": "admin@x.com" } },
            "createTime": "2026-01-15T08:30:00Z",
        }))
        .unwrap();
        let doc = decode_document(&raw).unwrap();
        assert_eq!(doc.id.as_str(), "abc-123");
        assert_eq!(doc.get("email"), Some(&FieldValue::from("admin@x.com")));
    }

    #[test]
    fn test_quote_field_path() {
        assert_eq!(quote_field_path("passwordHash"), "passwordHash");
        assert_eq!(quote_field_path("_private"), "_private");
        assert_eq!(quote_field_path("first name"), "`first name`");
        assert_eq!(quote_field_path("9lives"), "`9lives`");
        assert_eq!(quote_field_path("a`b"), "`a\\`b`");
    }

    #[test]
    fn test_insert_write_uses_transform_and_precondition() {
        let mut fields = Fields::new();
        fields.insert("email".to_string(), FieldValue::from("admin@x.com"));
        fields.insert("createdAt".to_string(), FieldValue::ServerTimestamp);

        let id = DocumentId::new("doc-1");
        let body = client().build_write("users", &id, &fields, false, false);

        assert_eq!(
            body,
            json!({ "writes": [{
                "update": {
                    "name": "projects/apololms/databases/(default)/documents/users/doc-1",
                    "fields": { "email": { "stringValue": "admin@x.com" } },
                },
                "currentDocument": { "exists": false },
                "updateTransforms": [{
                    "fieldPath": "createdAt",
                    "setToServerValue": "REQUEST_TIME",
                }],
            }]})
        );
    }

    #[test]
    fn test_update_write_masks_only_given_fields() {
        let mut fields = Fields::new();
        fields.insert("passwordHash".to_string(), FieldValue::from("$2b$10$x"));
        fields.insert("role".to_string(), FieldValue::from(vec!["admin".to_string()]));

        let id = DocumentId::new("doc-1");
        let body = client().build_write("users", &id, &fields, true, true);
        let write = &body["writes"][0];

        assert_eq!(write["currentDocument"], json!({ "exists": true }));
        assert_eq!(
            write["updateMask"],
            json!({ "fieldPaths": ["passwordHash", "role"] })
        );
        assert!(write.get("updateTransforms").is_none());
    }
}
