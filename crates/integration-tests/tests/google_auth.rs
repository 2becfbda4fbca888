//! Integration tests for access token acquisition.
//!
//! Covers the service account JWT exchange, the metadata server fallback,
//! token caching, and how token failures surface through the store client.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use apolo_admin::config::FirebaseConfig;
use apolo_admin::google::{CredentialSource, CredentialsError, GoogleAuth, ServiceAccountKey};
use apolo_admin::store::{DocumentStore, FieldValue, FirestoreClient, StoreError};
use apolo_integration_tests::{FakeGoogle, PROJECT_ID};
use secrecy::ExposeSecret;

const TEST_PRIVATE_KEY: &str = include_str!("../../admin/testdata/test_rsa_key.pem");

fn key_json(token_uri: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": PROJECT_ID,
        "private_key_id": "key-1",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "provisioner@apololms.iam.gserviceaccount.com",
        "token_uri": token_uri,
    })
    .to_string()
}

fn service_account_auth(fake: &FakeGoogle) -> GoogleAuth {
    let key = ServiceAccountKey::from_json(&key_json(&format!("{}/token", fake.base_url()))).unwrap();
    GoogleAuth::new(
        apolo_admin::http_client().unwrap(),
        CredentialSource::ServiceAccount(key),
    )
}

// =============================================================================
// Service Account
// =============================================================================

#[tokio::test]
async fn test_service_account_exchange_and_cache() {
    let fake = FakeGoogle::start().await;
    let auth = service_account_auth(&fake);

    let first = auth.bearer_token().await.unwrap();
    let second = auth.bearer_token().await.unwrap();

    assert_eq!(first.expose_secret(), "fake-token-1");
    assert_eq!(second.expose_secret(), "fake-token-1");
    assert_eq!(fake.tokens_issued(), 1);

    let exchange = &fake.requests_to("/token").await[0];
    assert_eq!(exchange.method, "POST");
    assert!(exchange.body.contains("assertion="));
}

#[tokio::test]
async fn test_store_uses_exchanged_token() {
    let fake = FakeGoogle::start().await;
    let http = apolo_admin::http_client().unwrap();
    let store = FirestoreClient::with_base_url(
        http,
        &fake.base_url(),
        PROJECT_ID,
        Arc::new(service_account_auth(&fake)),
    );

    store
        .find("users", "email", &FieldValue::from("admin@x.com"), 2)
        .await
        .unwrap();

    let query = &fake.requests_to(":runQuery").await[0];
    assert_eq!(query.authorization.as_deref(), Some("Bearer fake-token-1"));
}

#[tokio::test]
async fn test_token_failure_surfaces_as_credentials_error() {
    let fake = FakeGoogle::start().await;
    fake.fail_with(401, "invalid_grant", "UNAUTHENTICATED").await;

    let auth = service_account_auth(&fake);
    let result = auth.bearer_token().await;
    assert!(matches!(
        result,
        Err(CredentialsError::TokenExchange(ref msg)) if msg.contains("401")
    ));

    let http = apolo_admin::http_client().unwrap();
    let store = FirestoreClient::with_base_url(http, &fake.base_url(), PROJECT_ID, Arc::new(auth));
    let result = store
        .find("users", "email", &FieldValue::from("admin@x.com"), 2)
        .await;
    assert!(matches!(result, Err(StoreError::Credentials(_))));
    assert!(fake.requests_to(":runQuery").await.is_empty());
}

#[tokio::test]
async fn test_from_config_reads_service_account_file() {
    let fake = FakeGoogle::start().await;
    let path = std::env::temp_dir().join(format!("apolo-sa-{}.json", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, key_json(&format!("{}/token", fake.base_url())))
        .await
        .unwrap();

    let config = FirebaseConfig {
        project_id: PROJECT_ID.to_string(),
        service_account_path: path.clone(),
        metadata_host: fake.host(),
        firestore_emulator_host: None,
        auth_emulator_host: None,
    };
    let auth = GoogleAuth::from_config(apolo_admin::http_client().unwrap(), &config)
        .await
        .unwrap();
    let _ = tokio::fs::remove_file(&path).await;

    assert!(matches!(auth.source(), CredentialSource::ServiceAccount(_)));
    assert_eq!(auth.bearer_token().await.unwrap().expose_secret(), "fake-token-1");
    assert!(fake.requests_to(
        "/computeMetadata/v1/instance/service-accounts/default/token"
    ).await.is_empty());
}

#[tokio::test]
async fn test_from_config_rejects_malformed_service_account_file() {
    let path = std::env::temp_dir().join(format!("apolo-sa-{}.json", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, "{ not json").await.unwrap();

    let config = FirebaseConfig {
        project_id: PROJECT_ID.to_string(),
        service_account_path: path.clone(),
        metadata_host: "metadata.invalid".to_string(),
        firestore_emulator_host: None,
        auth_emulator_host: None,
    };
    let result = GoogleAuth::from_config(apolo_admin::http_client().unwrap(), &config).await;
    let _ = tokio::fs::remove_file(&path).await;

    assert!(matches!(result, Err(CredentialsError::InvalidKey(_))));
}

// =============================================================================
// Metadata Server
// =============================================================================

#[tokio::test]
async fn test_metadata_server_token_is_cached() {
    let fake = FakeGoogle::start().await;
    let auth = GoogleAuth::new(
        apolo_admin::http_client().unwrap(),
        CredentialSource::MetadataServer { host: fake.host() },
    );

    let first = auth.bearer_token().await.unwrap();
    let second = auth.bearer_token().await.unwrap();

    assert_eq!(first.expose_secret(), "fake-token-1");
    assert_eq!(second.expose_secret(), "fake-token-1");
    assert_eq!(fake.tokens_issued(), 1);

    let request = &fake.requests().await[0];
    assert_eq!(request.method, "GET");
}
