//! Command implementations.
//!
//! Each command loads `.env`, connects to the shop database and logs its
//! progress through `tracing`.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use solemate_storefront::db;

/// Errors shared by all commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Neither database URL variable is set.
    #[error("Missing environment variable: SOLEMATE_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read the database URL, preferring `SOLEMATE_DATABASE_URL`.
fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("SOLEMATE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingDatabaseUrl)
}

/// Connect to the shop database.
pub(crate) async fn connect() -> Result<PgPool, CommandError> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&url).await?)
}
