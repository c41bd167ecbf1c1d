//! Store models for accounts.

use crate::api::models::accounts::Role;
use crate::types::AccountId;
use chrono::{DateTime, Utc};

/// Full account record as held by the store.
///
/// `email` and `username` are stored normalized (lowercase, trimmed); the
/// handlers normalize on the way in so lookups never have to.
#[derive(Debug, Clone)]
pub struct AccountRecord {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub mobile: String,
    pub is_verified: bool,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Store request for creating a new account
#[derive(Debug, Clone)]
pub struct AccountCreateRequest {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub mobile: String,
    pub is_verified: bool,
    pub role: Role,
}

/// Store request for updating profile fields; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct AccountProfileUpdate {
    pub username: Option<String>,
    pub mobile: Option<String>,
}
