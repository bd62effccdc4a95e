//! Authentication service.
//!
//! Phone + password accounts. Passwords are hashed with Argon2id.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::instrument;

use solemate_core::{Email, Phone, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length (bounds hashing cost).
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum display name length.
const MAX_NAME_LENGTH: usize = 100;

/// Body of `POST /api/auth/register`.
#[derive(Debug, Deserialize)]
pub struct Registration {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password: String,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub phone: String,
    pub password: String,
}

/// Body of `PATCH /api/account`.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    /// An empty string removes the email.
    pub email: Option<String>,
}

/// Body of `POST /api/account/password`.
#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// Authentication service.
///
/// Handles registration, login and account self-service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new customer account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidName`, `InvalidPhone`, `InvalidEmail` or
    /// `WeakPassword` for invalid input, and `AuthError::UserAlreadyExists`
    /// if the phone is already registered.
    #[instrument(skip(self, registration))]
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        let name = validate_name(&registration.name)?;
        let phone = Phone::parse(&registration.phone)?;
        let email = parse_optional_email(registration.email.as_deref())?;
        validate_password(&registration.password)?;

        let password_hash = hash_password(&registration.password)?;

        let user = self
            .users
            .create(&name, &phone, email.as_ref(), &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with phone and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the phone is unknown or the
    /// password is wrong.
    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: &Credentials) -> Result<User, AuthError> {
        // A malformed phone is reported like a wrong password.
        let phone = Phone::parse(&credentials.phone).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&credentials.password, &password_hash)?;

        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update display name and/or email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidName` or `AuthError::InvalidEmail` for
    /// invalid input and `AuthError::UserNotFound` if the user is gone.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: &ProfileUpdate,
    ) -> Result<User, AuthError> {
        let current = self.get_user(user_id).await?;

        let name = match update.name.as_deref() {
            Some(name) => validate_name(name)?,
            None => current.name,
        };
        let email = match update.email.as_deref() {
            Some(email) => parse_optional_email(Some(email))?,
            None => current.email,
        };

        self.users
            .update_profile(user_id, &name, email.as_ref())
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }

    /// Change password after verifying the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the current password is
    /// wrong and `AuthError::WeakPassword` if the new one is too short.
    #[instrument(skip(self, change))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        change: &PasswordChange,
    ) -> Result<(), AuthError> {
        let hash = self
            .users
            .get_password_hash_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        verify_password(&change.current_password, &hash)?;
        validate_password(&change.new_password)?;

        let new_hash = hash_password(&change.new_password)?;
        self.users.update_password(user_id, &new_hash).await?;

        tracing::info!(%user_id, "Password changed");
        Ok(())
    }
}

/// Trim and bound a display name.
fn validate_name(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidName("name is required".to_owned()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_owned())
}

/// Parse an optional email. Blank means none.
fn parse_optional_email(email: Option<&str>) -> Result<Option<Email>, AuthError> {
    match email.map(str::trim) {
        Some(e) if !e.is_empty() => Ok(Some(Email::parse(e)?)),
        _ => Ok(None),
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_length_rules() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(verify_password("anything", "not-a-hash").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Sam ").unwrap(), "Sam");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"n".repeat(101)).is_err());
    }

    #[test]
    fn test_optional_email() {
        assert!(parse_optional_email(None).unwrap().is_none());
        assert!(parse_optional_email(Some("  ")).unwrap().is_none());
        assert_eq!(
            parse_optional_email(Some("Sam@Shop.Test"))
                .unwrap()
                .unwrap()
                .as_str(),
            "sam@shop.test"
        );
        assert!(matches!(
            parse_optional_email(Some("nope")),
            Err(AuthError::InvalidEmail(_))
        ));
    }
}
