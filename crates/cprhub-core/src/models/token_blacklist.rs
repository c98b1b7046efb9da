//! Logout blacklist entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An access token invalidated before its natural expiry. Rows are kept
/// only until `expires_at`, after which the token is rejected anyway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistedToken {
    /// SHA-256 of the raw JWT, hex-encoded.
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
