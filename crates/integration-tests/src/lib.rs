//! Integration tests for the Apolo admin provisioning tools.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p apolo-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `admin_profile` - Profile upsert/verify through the Firestore client
//! - `credential_reset` - Account reset through the Identity Toolkit client
//! - `google_auth` - Token exchange, metadata server and token caching
//!
//! No network access is needed. [`FakeGoogle`] is a local axum server that
//! answers the Firestore, Identity Toolkit, OAuth token and metadata
//! endpoints the clients call, keeps their state in memory, and records every
//! request it receives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use apolo_admin::config::{AccountOverrides, ConfigError, ProvisionConfig};
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

/// Project every test runs against.
pub const PROJECT_ID: &str = "apololms";

const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// One request as received by the fake.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    /// The body parsed as JSON, or `Null` for non-JSON bodies.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// An account held by the fake identity provider.
#[derive(Debug, Clone)]
pub struct FakeAccount {
    pub local_id: String,
    pub email: String,
    pub password: String,
    pub email_verified: bool,
}

#[derive(Debug)]
struct StoredDocument {
    name: String,
    fields: Map<String, Value>,
}

#[derive(Debug, Default)]
struct FakeState {
    requests: Mutex<Vec<RecordedRequest>>,
    documents: Mutex<Vec<StoredDocument>>,
    accounts: Mutex<Vec<FakeAccount>>,
    failure: Mutex<Option<(StatusCode, Value)>>,
    lookup_miss_as_error: Mutex<bool>,
    tokens_issued: AtomicUsize,
}

/// Local stand-in for the Google REST endpoints.
pub struct FakeGoogle {
    addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeGoogle {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("failed to bind fake server: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("failed to read fake server address: {e}"));

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    /// `host:port`, as used for emulator and metadata host settings.
    #[must_use]
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// `http://host:port`
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Load a provisioning configuration pointed at this fake.
    ///
    /// Both emulator hosts and the metadata host are set to the fake, and the
    /// service account path points nowhere. `vars` supplies the rest.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `vars` lacks a required variable.
    pub fn provision_config(&self, vars: &[(&str, &str)]) -> Result<ProvisionConfig, ConfigError> {
        let host = self.host();
        let mut env: HashMap<String, String> = [
            ("FIREBASE_PROJECT_ID", PROJECT_ID),
            ("FIREBASE_SERVICE_ACCOUNT_PATH", "/nonexistent/firebase-service-account.json"),
            ("GCE_METADATA_HOST", host.as_str()),
            ("FIRESTORE_EMULATOR_HOST", host.as_str()),
            ("FIREBASE_AUTH_EMULATOR_HOST", host.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        env.extend(vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));

        ProvisionConfig::from_lookup(&|key: &str| env.get(key).cloned(), AccountOverrides::default())
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().await.clone()
    }

    /// Requests whose path ends with `suffix`.
    pub async fn requests_to(&self, suffix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.path.ends_with(suffix))
            .collect()
    }

    /// Number of access tokens handed out by the token endpoints.
    #[must_use]
    pub fn tokens_issued(&self) -> usize {
        self.state.tokens_issued.load(Ordering::SeqCst)
    }

    /// `(id, fields)` of every document in `collection`, in creation order.
    pub async fn documents(&self, collection: &str) -> Vec<(String, Map<String, Value>)> {
        let prefix = format!("{}/{collection}/", database_path(PROJECT_ID));
        self.state
            .documents
            .lock()
            .await
            .iter()
            .filter_map(|doc| {
                doc.name
                    .strip_prefix(&prefix)
                    .map(|id| (id.to_string(), doc.fields.clone()))
            })
            .collect()
    }

    /// Store a document directly, in Firestore's typed JSON field form.
    pub async fn seed_document(&self, collection: &str, id: &str, fields: Value) {
        self.state.documents.lock().await.push(StoredDocument {
            name: format!("{}/{collection}/{id}", database_path(PROJECT_ID)),
            fields: fields.as_object().cloned().unwrap_or_default(),
        });
    }

    /// Every account held by the fake identity provider.
    pub async fn accounts(&self) -> Vec<FakeAccount> {
        self.state.accounts.lock().await.clone()
    }

    /// Answer every following request with a Google-style error.
    pub async fn fail_with(&self, status: u16, message: &str, code: &str) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        *self.state.failure.lock().await =
            Some((status, api_error(status.as_u16(), message, code)));
    }

    /// Stop injecting errors.
    pub async fn clear_failure(&self) {
        *self.state.failure.lock().await = None;
    }

    /// Answer lookups that match nothing with `EMAIL_NOT_FOUND` instead of an
    /// empty user list.
    pub async fn set_lookup_miss_as_error(&self, enabled: bool) {
        *self.state.lookup_miss_as_error.lock().await = enabled;
    }
}

fn database_path(project: &str) -> String {
    format!("projects/{project}/databases/(default)/documents")
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn api_error(code: u16, message: &str, status: &str) -> Value {
    json!({ "error": { "code": code, "message": message, "status": status } })
}

fn error_response(status: StatusCode, message: &str, code: &str) -> Response {
    (status, Json(api_error(status.as_u16(), message, code))).into_response()
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let text = String::from_utf8_lossy(&body).into_owned();

    state.requests.lock().await.push(RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
        body: text.clone(),
    });

    if let Some((status, body)) = state.failure.lock().await.clone() {
        return (status, Json(body)).into_response();
    }

    let json: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    if path.ends_with(METADATA_TOKEN_PATH) {
        let flavor = headers.get("Metadata-Flavor").and_then(|v| v.to_str().ok());
        if flavor != Some("Google") {
            return error_response(StatusCode::FORBIDDEN, "missing Metadata-Flavor", "FORBIDDEN");
        }
        return issue_token(&state);
    }
    if path.ends_with("/token") {
        if !text.contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "unsupported_grant_type" })),
            )
                .into_response();
        }
        return issue_token(&state);
    }
    if let Some(parent) = path.strip_suffix(":runQuery") {
        return run_query(&state, parent, &json).await;
    }
    if path.ends_with(":commit") {
        return commit(&state, &json).await;
    }
    if path.ends_with("/accounts:lookup") {
        return lookup_account(&state, &json).await;
    }
    if path.ends_with("/accounts:update") {
        return update_account(&state, &json).await;
    }
    if path.ends_with("/accounts") {
        return create_account(&state, &json).await;
    }

    error_response(StatusCode::NOT_FOUND, "unknown endpoint", "NOT_FOUND")
}

fn issue_token(state: &FakeState) -> Response {
    let n = state.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({
        "access_token": format!("fake-token-{n}"),
        "expires_in": 3599,
        "token_type": "Bearer",
    }))
    .into_response()
}

async fn run_query(state: &FakeState, parent: &str, body: &Value) -> Response {
    let query = &body["structuredQuery"];
    let Some(collection) = query.pointer("/from/0/collectionId").and_then(Value::as_str) else {
        return error_response(StatusCode::BAD_REQUEST, "missing from", "INVALID_ARGUMENT");
    };
    let field = query
        .pointer("/where/fieldFilter/field/fieldPath")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let value = query
        .pointer("/where/fieldFilter/value")
        .cloned()
        .unwrap_or(Value::Null);
    let limit = query
        .get("limit")
        .and_then(Value::as_u64)
        .and_then(|l| usize::try_from(l).ok())
        .unwrap_or(usize::MAX);

    let database = parent.trim_start_matches('/').trim_start_matches("v1/");
    let prefix = format!("{database}/{collection}/");
    let read_time = now_rfc3339();

    let rows: Vec<Value> = state
        .documents
        .lock()
        .await
        .iter()
        .filter(|doc| doc.name.starts_with(&prefix) && doc.fields.get(field) == Some(&value))
        .take(limit)
        .map(|doc| {
            json!({
                "document": {
                    "name": doc.name,
                    "fields": doc.fields,
                    "createTime": read_time,
                    "updateTime": read_time,
                },
                "readTime": read_time,
            })
        })
        .collect();

    if rows.is_empty() {
        return Json(json!([{ "readTime": read_time }])).into_response();
    }
    Json(Value::Array(rows)).into_response()
}

async fn commit(state: &FakeState, body: &Value) -> Response {
    let Some(writes) = body.get("writes").and_then(Value::as_array) else {
        return error_response(StatusCode::BAD_REQUEST, "missing writes", "INVALID_ARGUMENT");
    };

    let commit_time = now_rfc3339();
    let mut documents = state.documents.lock().await;

    for write in writes {
        let Some(name) = write.pointer("/update/name").and_then(Value::as_str) else {
            return error_response(StatusCode::BAD_REQUEST, "missing name", "INVALID_ARGUMENT");
        };
        let fields = write
            .pointer("/update/fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let position = documents.iter().position(|doc| doc.name == name);
        match (write.pointer("/currentDocument/exists").and_then(Value::as_bool), position) {
            (Some(false), Some(_)) => {
                return error_response(
                    StatusCode::CONFLICT,
                    &format!("Document already exists: {name}"),
                    "ALREADY_EXISTS",
                );
            }
            (Some(true), None) => {
                return error_response(
                    StatusCode::NOT_FOUND,
                    &format!("No document to update: {name}"),
                    "NOT_FOUND",
                );
            }
            _ => {}
        }

        let mut merged = position
            .and_then(|i| documents.get(i))
            .map(|doc| doc.fields.clone())
            .unwrap_or_default();

        match write.pointer("/updateMask/fieldPaths").and_then(Value::as_array) {
            Some(paths) => {
                for path in paths.iter().filter_map(Value::as_str) {
                    match fields.get(path) {
                        Some(value) => {
                            merged.insert(path.to_string(), value.clone());
                        }
                        None => {
                            merged.remove(path);
                        }
                    }
                }
            }
            None => merged = fields,
        }

        let transforms = write
            .get("updateTransforms")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for transform in &transforms {
            if let Some(path) = transform.get("fieldPath").and_then(Value::as_str) {
                merged.insert(path.to_string(), json!({ "timestampValue": commit_time }));
            }
        }

        match position.and_then(|i| documents.get_mut(i)) {
            Some(doc) => doc.fields = merged,
            None => documents.push(StoredDocument {
                name: name.to_string(),
                fields: merged,
            }),
        }
    }

    Json(json!({
        "writeResults": writes.iter().map(|_| json!({ "updateTime": commit_time })).collect::<Vec<_>>(),
        "commitTime": commit_time,
    }))
    .into_response()
}

fn account_json(account: &FakeAccount) -> Value {
    json!({
        "localId": account.local_id,
        "email": account.email,
        "emailVerified": account.email_verified,
        "passwordHash": "UkVEQUNURUQ=",
        "createdAt": "1767225600000",
    })
}

async fn lookup_account(state: &FakeState, body: &Value) -> Response {
    let email = body.pointer("/email/0").and_then(Value::as_str).unwrap_or_default();
    let miss_as_error = *state.lookup_miss_as_error.lock().await;
    let accounts = state.accounts.lock().await;

    match accounts.iter().find(|a| a.email == email) {
        Some(account) => Json(json!({
            "kind": "identitytoolkit#GetAccountInfoResponse",
            "users": [account_json(account)],
        }))
        .into_response(),
        None if miss_as_error => {
            error_response(StatusCode::BAD_REQUEST, "EMAIL_NOT_FOUND", "INVALID_ARGUMENT")
        }
        None => Json(json!({ "kind": "identitytoolkit#GetAccountInfoResponse" })).into_response(),
    }
}

async fn create_account(state: &FakeState, body: &Value) -> Response {
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();
    if password.len() < 6 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "WEAK_PASSWORD : Password should be at least 6 characters",
            "INVALID_ARGUMENT",
        );
    }

    let mut accounts = state.accounts.lock().await;
    if accounts.iter().any(|a| a.email == email) {
        return error_response(StatusCode::BAD_REQUEST, "EMAIL_EXISTS", "INVALID_ARGUMENT");
    }

    let account = FakeAccount {
        local_id: uuid::Uuid::new_v4().simple().to_string(),
        email: email.to_string(),
        password: password.to_string(),
        email_verified: body
            .get("emailVerified")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    };
    let response = json!({
        "kind": "identitytoolkit#SignupNewUserResponse",
        "localId": account.local_id,
        "email": account.email,
    });
    accounts.push(account);

    Json(response).into_response()
}

async fn update_account(state: &FakeState, body: &Value) -> Response {
    let local_id = body.get("localId").and_then(Value::as_str).unwrap_or_default();
    let mut accounts = state.accounts.lock().await;

    let Some(account) = accounts.iter_mut().find(|a| a.local_id == local_id) else {
        return error_response(StatusCode::BAD_REQUEST, "USER_NOT_FOUND", "INVALID_ARGUMENT");
    };
    if let Some(password) = body.get("password").and_then(Value::as_str) {
        account.password = password.to_string();
    }

    Json(json!({
        "kind": "identitytoolkit#SetAccountInfoResponse",
        "localId": account.local_id,
        "email": account.email,
    }))
    .into_response()
}
