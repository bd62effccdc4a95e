//! Admin role management.
//!
//! ```bash
//! # Grant dashboard access to an existing account
//! sm-cli admin promote --phone +15550100
//!
//! # Revoke it again
//! sm-cli admin demote --phone +15550100
//! ```
//!
//! The account must already exist; customers register through the API.

use solemate_core::{Phone, PhoneError, UserRole};
use solemate_storefront::db::{RepositoryError, UserRepository};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Invalid phone: {0}")]
    InvalidPhone(#[from] PhoneError),

    #[error("No user registered with phone: {0}")]
    UserNotFound(String),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

/// Set the role of the account registered with `phone`.
///
/// # Errors
///
/// Returns `AdminError::InvalidPhone` for a malformed number and
/// `AdminError::UserNotFound` if no account uses it.
pub async fn set_role(phone: &str, role: UserRole) -> Result<(), AdminError> {
    let phone = Phone::parse(phone)?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role(&phone, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AdminError::UserNotFound(phone.to_string()),
            other => AdminError::Repository(other),
        })?;

    tracing::info!(
        "Role updated! ID: {}, Name: {}, Phone: {}, Role: {}",
        user.id,
        user.name,
        user.phone,
        user.role
    );
    Ok(())
}
