//! Instructor payment requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    pub enum PaymentRequestStatus {
        Pending => "pending",
        Approved => "approved",
        Paid => "paid",
        Rejected => "rejected",
    }
}

/// Compensation claim generated from an approved timesheet. Exactly
/// one exists per approved timesheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub timesheet_id: Uuid,
    pub amount_cents: i64,
    pub status: PaymentRequestStatus,
    pub notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub instructor_id: Uuid,
    pub timesheet_id: Uuid,
    pub amount_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentRequestFilter {
    pub instructor_id: Option<Uuid>,
    pub status: Option<PaymentRequestStatus>,
}
