//! Login account commands.
//!
//! # Usage
//!
//! ```bash
//! apolo-cli credential reset -e admin@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `ADMIN_EMAIL`, `ADMIN_PASSWORD`
//! - `FIREBASE_PROJECT_ID`, `FIREBASE_SERVICE_ACCOUNT_PATH`
//! - `FIREBASE_AUTH_EMULATOR_HOST` - Use a local Auth emulator

use apolo_admin::config::ProvisionConfig;
use apolo_admin::identity::IdentityToolkitClient;
use apolo_admin::services::{CredentialService, ResetOutcome};

use super::{CommandError, platform_auth};

/// Create the admin login account, or set a new password on it.
///
/// # Errors
///
/// Returns `CommandError` if credentials cannot be loaded, or any identity
/// provider call other than a not-found lookup fails.
pub async fn reset(config: &ProvisionConfig) -> Result<(), CommandError> {
    let firebase = &config.firebase;
    let account = &config.account;

    tracing::info!(
        project = %firebase.project_id,
        email = %account.email,
        "Resetting admin credential..."
    );

    let http = apolo_admin::http_client()?;
    let auth = platform_auth(&http, firebase, firebase.auth_emulator_host.as_deref()).await?;
    let identity = IdentityToolkitClient::from_config(http, firebase, auth);

    let outcome = CredentialService::new(&identity)
        .reset(&account.email, &account.password)
        .await?;

    let (action, user) = match &outcome {
        ResetOutcome::Created(user) => ("created", user),
        ResetOutcome::Updated(user) => ("updated", user),
    };
    tracing::info!(
        "Login account {action}! UID: {}, Email: {}",
        user.uid,
        user.email
    );

    Ok(())
}
