//! Profile change requests.
//!
//! Users cannot edit their contact details directly; they file a
//! request which HR approves or rejects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    pub enum ProfileField {
        Email => "email",
        FullName => "full_name",
        Phone => "phone",
    }
}

string_enum! {
    pub enum ProfileChangeStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileChangeRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub field: ProfileField,
    pub old_value: Option<String>,
    pub new_value: String,
    pub status: ProfileChangeStatus,
    pub review_comment: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfileChange {
    pub user_id: Uuid,
    pub field: ProfileField,
    pub old_value: Option<String>,
    pub new_value: String,
}
