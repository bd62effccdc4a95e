//! SoleMate CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (shop schema + session store)
//! sm-cli migrate
//!
//! # Load or refresh the catalog from a YAML file
//! sm-cli seed catalog data/catalog.yaml
//!
//! # Grant or revoke admin access
//! sm-cli admin promote --phone +15550100
//! sm-cli admin demote --phone +15550100
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use solemate_core::UserRole;

mod commands;

#[derive(Parser)]
#[command(name = "sm-cli")]
#[command(author, version, about = "SoleMate CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage admin access
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products from a YAML or JSON file, matched by slug
    Catalog {
        /// Path to the catalog file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an existing account the admin role
    Promote {
        /// Phone number the account registered with
        #[arg(short, long)]
        phone: String,
    },
    /// Return an admin account to the user role
    Demote {
        /// Phone number the account registered with
        #[arg(short, long)]
        phone: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
        Commands::Admin { action } => match action {
            AdminAction::Promote { phone } => {
                commands::admin::set_role(&phone, UserRole::Admin).await?;
            }
            AdminAction::Demote { phone } => {
                commands::admin::set_role(&phone, UserRole::User).await?;
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_admin_promote() {
        let cli = Cli::try_parse_from(["sm-cli", "admin", "promote", "--phone", "+15550100"])
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Admin {
                action: AdminAction::Promote { ref phone }
            } if phone == "+15550100"
        ));
    }

    #[test]
    fn test_seed_requires_file() {
        assert!(Cli::try_parse_from(["sm-cli", "seed", "catalog"]).is_err());
    }
}
