//! Payments recorded against organization invoices.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    pub enum PaymentStatus {
        PendingVerification => "pending_verification",
        Verified => "verified",
        Rejected => "rejected",
    }
}

string_enum! {
    pub enum PaymentMethod {
        Cheque => "cheque",
        Eft => "eft",
        CreditCard => "credit_card",
        Cash => "cash",
        Other => "other",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: NaiveDate,
    pub status: PaymentStatus,
    pub submitted_by: Uuid,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub invoice_id: Uuid,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: NaiveDate,
    pub submitted_by: Uuid,
    pub notes: Option<String>,
    /// `PendingVerification` for organization submissions, `Verified`
    /// when recorded directly by accounting.
    pub status: PaymentStatus,
}
