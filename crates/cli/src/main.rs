//! Apolo CLI - Admin account provisioning tools.
//!
//! # Usage
//!
//! ```bash
//! # Create or refresh the admin's profile document
//! apolo-cli admin upsert
//!
//! # Same, overriding the account from the environment
//! apolo-cli admin upsert -e admin@example.com -n "Admin Name" -r admin,coordinator
//!
//! # Check the stored hash against ADMIN_PASSWORD
//! apolo-cli admin verify
//!
//! # Create the login account, or reset its password
//! apolo-cli credential reset
//! ```
//!
//! # Commands
//!
//! - `admin upsert` - Create or update the admin profile in Firestore
//! - `admin verify` - Check a password against the stored profile
//! - `credential reset` - Create or reset the Firebase Authentication account
//!
//! The password is always read from `ADMIN_PASSWORD` (or `.env`), never from
//! a flag. Any failure exits with status 1.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use apolo_admin::config::{AccountOverrides, ConfigError, ProvisionConfig};

mod commands;

#[derive(Parser)]
#[command(name = "apolo-cli")]
#[command(author, version, about = "Apolo admin provisioning tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the admin profile document
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Manage the admin login account
    Credential {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create the admin profile, or refresh its password hash and role
    Upsert {
        /// Admin email address [env: `ADMIN_EMAIL`]
        #[arg(short, long)]
        email: Option<String>,

        /// Display name for a new profile [env: `ADMIN_NAME`]
        #[arg(short, long)]
        name: Option<String>,

        /// Comma-separated roles (`admin`, `author`, `tutor`, `student`, `coordinator`) [env: `ADMIN_ROLE`]
        #[arg(short, long)]
        role: Option<String>,

        /// Origin tag for a new profile [env: `ADMIN_PLATFORM`]
        #[arg(short, long)]
        platform: Option<String>,
    },
    /// Check `ADMIN_PASSWORD` against the stored profile
    Verify {
        /// Admin email address [env: `ADMIN_EMAIL`]
        #[arg(short, long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum CredentialAction {
    /// Create the login account, or set a new password on it
    Reset {
        /// Admin email address [env: `ADMIN_EMAIL`]
        #[arg(short, long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> =
        run(cli, &ProvisionConfig::from_env).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

/// Loads the configuration for one run from the account overrides.
type ConfigLoader = dyn Fn(AccountOverrides) -> Result<ProvisionConfig, ConfigError>;

async fn run(cli: Cli, load: &ConfigLoader) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Admin { action } => match action {
            AdminAction::Upsert {
                email,
                name,
                role,
                platform,
            } => {
                let config = load(AccountOverrides {
                    email,
                    name,
                    role,
                    platform,
                })?;
                commands::admin::upsert(&config).await?;
            }
            AdminAction::Verify { email } => {
                let config = load(AccountOverrides {
                    email,
                    ..AccountOverrides::default()
                })?;
                commands::admin::verify(&config).await?;
            }
        },
        Commands::Credential { action } => match action {
            CredentialAction::Reset { email } => {
                let config = load(AccountOverrides {
                    email,
                    ..AccountOverrides::default()
                })?;
                commands::credential::reset(&config).await?;
            }
        },
    }
    Ok(())
}
