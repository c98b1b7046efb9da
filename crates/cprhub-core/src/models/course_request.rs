//! Course request domain model.
//!
//! A course request is an organization's booking for one training
//! session. It moves through [`CourseStatus`] via the transitions in
//! [`crate::workflow`]; billing eligibility is tracked separately by
//! `ready_for_billing_at` and `invoiced`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    pub enum CourseStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRequest {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub course_type_id: Uuid,
    pub instructor_id: Option<Uuid>,
    pub location: String,
    pub scheduled_date: NaiveDate,
    pub expected_students: u32,
    pub notes: Option<String>,
    pub status: CourseStatus,
    pub cancellation_reason: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub ready_for_billing_at: Option<DateTime<Utc>>,
    pub invoiced: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseRequest {
    /// Completed, released for billing and not yet invoiced.
    pub fn in_billing_queue(&self) -> bool {
        self.status == CourseStatus::Completed
            && self.ready_for_billing_at.is_some()
            && !self.invoiced
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCourseRequest {
    pub organization_id: Uuid,
    pub course_type_id: Uuid,
    pub location: String,
    pub scheduled_date: NaiveDate,
    pub expected_students: u32,
    pub notes: Option<String>,
}

/// Query filters for course request listings.
#[derive(Debug, Clone, Default)]
pub struct CourseRequestFilter {
    pub organization_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
    pub status: Option<CourseStatus>,
}

/// One row of the billing queue, enriched for the accounting portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingQueueEntry {
    #[serde(flatten)]
    pub course: CourseRequest,
    pub organization_name: String,
    pub course_type_name: String,
    pub price_per_student_cents: i64,
    pub roster_size: u32,
    pub attended_count: u32,
}
