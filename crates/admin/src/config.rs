//! Provisioning configuration loaded from environment variables.
//!
//! Command-line flags override the account variables; the password is only
//! ever read from the environment so it never shows up in shell history or
//! process listings.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_EMAIL` - Email of the admin account (unless `--email` is given)
//! - `ADMIN_PASSWORD` - Plaintext password to set (min 6 chars)
//!
//! ## Optional
//! - `ADMIN_NAME` - Display name for a newly created profile (default: Administrador IDECAP)
//! - `ADMIN_ROLE` - Comma-separated role tags (default: admin; `admin` is always added)
//! - `ADMIN_PLATFORM` - Origin tag for a newly created profile (default: web)
//! - `FIREBASE_PROJECT_ID` - Firebase project (default: apololms)
//! - `FIREBASE_SERVICE_ACCOUNT_PATH` - Service account JSON (default: ./firebase-service-account.json)
//! - `GCE_METADATA_HOST` - Metadata server used when no service account file exists
//!   (default: metadata.google.internal)
//!
//! ## Optional (local emulators)
//! - `FIRESTORE_EMULATOR_HOST` - e.g. `localhost:8080`
//! - `FIREBASE_AUTH_EMULATOR_HOST` - e.g. `localhost:9099`

use std::collections::HashMap;
use std::path::PathBuf;

use apolo_core::{Email, Role};
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_PROJECT_ID: &str = "apololms";
const DEFAULT_SERVICE_ACCOUNT_PATH: &str = "./firebase-service-account.json";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const DEFAULT_ADMIN_NAME: &str = "Administrador IDECAP";
const DEFAULT_ADMIN_PLATFORM: &str = "web";

/// Firebase Authentication rejects shorter passwords.
const MIN_PASSWORD_LENGTH: usize = 6;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "admin123",
    "xxx",
    "todo",
    "fixme",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Firebase project and credential configuration.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Firebase / Google Cloud project ID
    pub project_id: String,
    /// Path to a service account key file
    pub service_account_path: PathBuf,
    /// Metadata server host for Application Default Credentials
    pub metadata_host: String,
    /// Firestore emulator `host:port`, if running against the emulator
    pub firestore_emulator_host: Option<String>,
    /// Auth emulator `host:port`, if running against the emulator
    pub auth_emulator_host: Option<String>,
}

/// The admin account both tools converge on.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct AdminAccount {
    /// Lookup key in both backends
    pub email: Email,
    /// Display name (only written when the profile is created)
    pub name: String,
    /// Requested role tags
    pub roles: Vec<Role>,
    /// Origin tag (only written when the profile is created)
    pub platform: String,
    /// Plaintext password
    pub password: SecretString,
}

impl std::fmt::Debug for AdminAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAccount")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("roles", &self.roles)
            .field("platform", &self.platform)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Values given on the command line, taking precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct AccountOverrides {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub platform: Option<String>,
}

/// Complete configuration for one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub firebase: FirebaseConfig,
    pub account: AdminAccount,
}

impl ProvisionConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env(overrides: AccountOverrides) -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(&|key: &str| std::env::var(key).ok(), overrides)
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(
        lookup: &dyn Fn(&str) -> Option<String>,
        overrides: AccountOverrides,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            firebase: FirebaseConfig::from_lookup(lookup),
            account: AdminAccount::from_lookup(lookup, overrides)?,
        })
    }
}

impl FirebaseConfig {
    fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            project_id: get_or_default(lookup, "FIREBASE_PROJECT_ID", DEFAULT_PROJECT_ID),
            service_account_path: PathBuf::from(get_or_default(
                lookup,
                "FIREBASE_SERVICE_ACCOUNT_PATH",
                DEFAULT_SERVICE_ACCOUNT_PATH,
            )),
            metadata_host: get_or_default(lookup, "GCE_METADATA_HOST", DEFAULT_METADATA_HOST),
            firestore_emulator_host: get_optional(lookup, "FIRESTORE_EMULATOR_HOST"),
            auth_emulator_host: get_optional(lookup, "FIREBASE_AUTH_EMULATOR_HOST"),
        }
    }
}

impl AdminAccount {
    fn from_lookup(
        lookup: &dyn Fn(&str) -> Option<String>,
        overrides: AccountOverrides,
    ) -> Result<Self, ConfigError> {
        let raw_email = match overrides.email {
            Some(email) => email,
            None => get_required(lookup, "ADMIN_EMAIL")?,
        };
        let email = Email::parse(&raw_email)
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_EMAIL".to_string(), e.to_string()))?;

        let name = overrides
            .name
            .unwrap_or_else(|| get_or_default(lookup, "ADMIN_NAME", DEFAULT_ADMIN_NAME));
        let platform = overrides
            .platform
            .unwrap_or_else(|| get_or_default(lookup, "ADMIN_PLATFORM", DEFAULT_ADMIN_PLATFORM));
        let raw_roles = overrides
            .role
            .unwrap_or_else(|| get_or_default(lookup, "ADMIN_ROLE", "admin"));
        let roles = Role::parse_list(&raw_roles)
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_ROLE".to_string(), e.to_string()))?;

        let password = get_required(lookup, "ADMIN_PASSWORD")?;
        validate_password(&password, "ADMIN_PASSWORD")?;

        Ok(Self {
            email,
            name,
            roles,
            platform,
            password: SecretString::from(password),
        })
    }

    /// Role tags to store on the profile.
    ///
    /// Always contains `admin`; it is placed first when the configured roles
    /// omit it.
    #[must_use]
    pub fn role_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::with_capacity(self.roles.len() + 1);
        if !self.roles.contains(&Role::Admin) {
            tags.push(Role::Admin.to_string());
        }
        tags.extend(self.roles.iter().map(ToString::to_string));
        tags
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn get_required(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    get_optional(lookup, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Treats an empty value the same as an unset one.
fn get_optional(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn get_or_default(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    get_optional(lookup, key).unwrap_or_else(|| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Check a password for placeholder patterns and low entropy.
fn password_weakness(password: &str) -> Option<String> {
    let lower = password.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Some(format!("appears to be a placeholder (contains '{pattern}')"));
    }

    let entropy = shannon_entropy(password);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Some(format!(
            "entropy is low ({entropy:.2} bits/char, recommended >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
        ));
    }

    None
}

/// Reject passwords the identity provider would refuse; warn on weak ones.
fn validate_password(password: &str, var_name: &str) -> Result<(), ConfigError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("must be at least {MIN_PASSWORD_LENGTH} characters (got {length})"),
        ));
    }

    if let Some(reason) = password_weakness(password) {
        tracing::warn!("{var_name} validation warning: {reason}");
    }

    Ok(())
}
