//! Organization invoice domain model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    pub enum InvoiceStatus {
        /// Generated by accounting, not yet visible to the organization.
        Pending => "pending",
        Posted => "posted",
        Paid => "paid",
        Void => "void",
    }
}

impl InvoiceStatus {
    /// Statuses the organization portal may see.
    pub const VISIBLE_TO_ORGANIZATION: &'static [InvoiceStatus] =
        &[InvoiceStatus::Posted, InvoiceStatus::Paid];
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub course_request_id: Uuid,
    pub organization_id: Uuid,
    pub student_count: u32,
    pub rate_per_student_cents: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub posted_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fully computed invoice ready to be persisted.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub course_request_id: Uuid,
    pub organization_id: Uuid,
    pub student_count: u32,
    pub rate_per_student_cents: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub due_date: NaiveDate,
}

/// Invoice with its payment position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSummary {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub amount_paid_cents: i64,
    pub pending_payments_cents: i64,
    pub balance_due_cents: i64,
    pub overdue: bool,
}

/// Query filters for invoice listings.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub organization_id: Option<Uuid>,
    /// Empty means any status.
    pub statuses: Vec<InvoiceStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: String,
    pub count: u64,
}

/// Accounts-receivable rollup for the accounting portal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountingSummary {
    pub invoices_by_status: Vec<StatusCount>,
    pub total_invoiced_cents: i64,
    pub total_collected_cents: i64,
    pub outstanding_cents: i64,
    pub overdue_count: u64,
    pub overdue_cents: i64,
}
