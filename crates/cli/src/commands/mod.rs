//! Command implementations.

pub mod admin;
pub mod credential;

use std::sync::Arc;

use apolo_admin::config::{ConfigError, FirebaseConfig};
use apolo_admin::google::{CredentialsError, GoogleAuth};
use apolo_admin::services::ProvisionError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform credentials could not be loaded.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    /// The provisioning run failed.
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

/// Resolve platform credentials, unless `emulator_host` makes them moot.
async fn platform_auth(
    http: &reqwest::Client,
    config: &FirebaseConfig,
    emulator_host: Option<&str>,
) -> Result<Arc<GoogleAuth>, CommandError> {
    let auth = match emulator_host {
        Some(_) => GoogleAuth::emulator(http.clone()),
        None => GoogleAuth::from_config(http.clone(), config).await?,
    };
    Ok(Arc::new(auth))
}
