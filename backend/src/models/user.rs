//! User model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// User entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// "First Last", falling back to the username when both are blank.
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Column list matching [`User`], for `SELECT` and `RETURNING` clauses.
pub const USER_COLUMNS: &str = "id, email, username, first_name, last_name, password_hash, \
     is_staff, is_active, date_joined, last_login";
