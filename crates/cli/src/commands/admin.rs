//! Admin profile commands.
//!
//! # Usage
//!
//! ```bash
//! apolo-cli admin upsert -e admin@example.com -n "Admin Name" -r admin
//! apolo-cli admin verify -e admin@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_EMAIL`, `ADMIN_PASSWORD`, `ADMIN_NAME`, `ADMIN_ROLE`, `ADMIN_PLATFORM`
//! - `FIREBASE_PROJECT_ID`, `FIREBASE_SERVICE_ACCOUNT_PATH`
//! - `FIRESTORE_EMULATOR_HOST` - Use a local Firestore emulator

use apolo_admin::config::{FirebaseConfig, ProvisionConfig};
use apolo_admin::services::{AdminProfileService, UpsertOutcome};
use apolo_admin::store::FirestoreClient;

use super::{CommandError, platform_auth};

async fn firestore(config: &FirebaseConfig) -> Result<FirestoreClient, CommandError> {
    let http = apolo_admin::http_client()?;
    let auth = platform_auth(&http, config, config.firestore_emulator_host.as_deref()).await?;
    Ok(FirestoreClient::from_config(http, config, auth))
}

/// Create the admin profile, or refresh its password hash and role.
///
/// # Errors
///
/// Returns `CommandError` if credentials cannot be loaded, or the store
/// lookup or write fails.
pub async fn upsert(config: &ProvisionConfig) -> Result<(), CommandError> {
    let account = &config.account;

    tracing::info!(
        project = %config.firebase.project_id,
        email = %account.email,
        "Upserting admin profile..."
    );

    let store = firestore(&config.firebase).await?;
    let outcome = AdminProfileService::new(&store).upsert(account).await?;

    let action = match outcome {
        UpsertOutcome::Created(_) => "created",
        UpsertOutcome::Updated(_) => "updated",
    };
    tracing::info!(
        "Admin profile {action}! ID: {}, Email: {}, Role: {}",
        outcome.id(),
        account.email,
        account.role_tags().join(",")
    );

    Ok(())
}

/// Check `ADMIN_PASSWORD` against the stored profile's hash.
///
/// # Errors
///
/// Returns `CommandError` if the profile is missing or the password does
/// not match.
pub async fn verify(config: &ProvisionConfig) -> Result<(), CommandError> {
    let account = &config.account;

    let store = firestore(&config.firebase).await?;
    let report = AdminProfileService::new(&store)
        .verify(&account.email, &account.password)
        .await?;

    tracing::info!(
        "Password verified. ID: {}, Email: {}, Role: {}",
        report.id,
        account.email,
        report.role.join(",")
    );
    if !report.is_admin {
        tracing::warn!("Profile role does not include 'admin'; it cannot sign in to the admin panel.");
    }
    if report.is_disabled {
        tracing::warn!("Profile is disabled.");
    }

    Ok(())
}
