//! Vendor invoice domain model.
//!
//! Vendors bill the business for supplies and services. An invoice is
//! drafted by the vendor, reviewed by an admin and paid by accounting.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    pub enum VendorInvoiceStatus {
        PendingSubmission => "pending_submission",
        SubmittedToAdmin => "submitted_to_admin",
        SentToAccounting => "sent_to_accounting",
        Paid => "paid",
        Rejected => "rejected",
    }
}

impl VendorInvoiceStatus {
    /// Statuses in which the vendor may still edit the invoice.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            VendorInvoiceStatus::PendingSubmission | VendorInvoiceStatus::Rejected
        )
    }

    /// Statuses the accounting portal works with.
    pub const VISIBLE_TO_ACCOUNTING: &'static [VendorInvoiceStatus] = &[
        VendorInvoiceStatus::SentToAccounting,
        VendorInvoiceStatus::Paid,
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorInvoice {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub invoice_number: String,
    pub description: String,
    pub amount_cents: i64,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: VendorInvoiceStatus,
    pub rejection_reason: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVendorInvoice {
    pub vendor_id: Uuid,
    pub invoice_number: String,
    pub description: String,
    pub amount_cents: i64,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateVendorInvoice {
    pub invoice_number: Option<String>,
    pub description: Option<String>,
    pub amount_cents: Option<i64>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct VendorInvoiceFilter {
    pub vendor_id: Option<Uuid>,
    /// Empty means any status.
    pub statuses: Vec<VendorInvoiceStatus>,
}
