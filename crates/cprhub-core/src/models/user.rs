//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Portal a user signs in to. Every account has exactly one role.
    pub enum Role {
        Admin => "admin",
        Instructor => "instructor",
        Organization => "organization",
        Hr => "hr",
        Accountant => "accountant",
        Vendor => "vendor",
        Sysadmin => "sysadmin",
    }
}

string_enum! {
    pub enum UserStatus {
        Active => "active",
        /// Soft-deleted. Users are never removed from storage.
        Inactive => "inactive",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub full_name: String,
    pub phone: Option<String>,
    /// Set for `organization` role accounts.
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    pub role: Role,
    pub full_name: String,
    pub phone: Option<String>,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub full_name: Option<String>,
    /// `Some(Some(v))` = set, `Some(None)` = clear, `None` = no change.
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// `Some(Some(v))` = set, `Some(None)` = clear, `None` = no change.
    pub organization_id: Option<Option<Uuid>>,
}

/// Query filters for user listings.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}
