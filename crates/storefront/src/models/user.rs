//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use solemate_core::{Email, Phone, UserId, UserRole};

/// A registered customer or admin.
///
/// The password hash is never part of this type; see
/// `UserRepository::get_password_hash`.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: Phone,
    pub email: Option<Email>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
