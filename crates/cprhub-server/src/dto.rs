//! Request and response bodies that differ from the domain models.

use chrono::NaiveDate;
use cprhub_core::models::course_request::CourseStatus;
use cprhub_core::models::course_student::NewStudent;
use cprhub_core::models::invoice::{InvoiceStatus, InvoiceSummary};
use cprhub_core::models::payment::{Payment, PaymentMethod};
use cprhub_core::models::payment_request::PaymentRequestStatus;
use cprhub_core::models::profile_change::{ProfileChangeStatus, ProfileField};
use cprhub_core::models::timesheet::TimesheetStatus;
use cprhub_core::models::user::{Role, User, UserStatus};
use cprhub_core::models::vendor_invoice::VendorInvoiceStatus;
use cprhub_core::repository::Pagination;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email", alias = "username_or_email")]
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Query strings with a status filter and paging. Kept flat because
/// `#[serde(flatten)]` breaks number parsing in query strings.
#[derive(Debug, Deserialize)]
pub struct ListQuery<S> {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<S>,
    pub organization_id: Option<Uuid>,
    pub instructor_id: Option<Uuid>,
}

impl<S> ListQuery<S> {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_query(self.offset, self.limit)
    }
}

pub type CourseListQuery = ListQuery<CourseStatus>;
pub type InvoiceListQuery = ListQuery<InvoiceStatus>;
pub type VendorInvoiceListQuery = ListQuery<VendorInvoiceStatus>;
pub type TimesheetListQuery = ListQuery<TimesheetStatus>;
pub type PaymentRequestListQuery = ListQuery<PaymentRequestStatus>;
pub type ProfileChangeListQuery = ListQuery<ProfileChangeStatus>;

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActiveQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CourseRequestBody {
    /// Required for admins; organization users book for their own.
    pub organization_id: Option<Uuid>,
    pub course_type_id: Uuid,
    pub location: String,
    pub scheduled_date: NaiveDate,
    pub expected_students: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub instructor_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RosterRequest {
    pub students: Vec<NewStudent>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceRequest {
    pub attended: bool,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Review decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentRequest {
    pub comment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PayRequest {
    pub reference: Option<String>,
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GenerateInvoiceRequest {
    pub course_request_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    /// Defaults to today.
    pub payment_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Invoice summary together with its payments.
#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub summary: InvoiceSummary,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Deserialize)]
pub struct VendorInvoiceBody {
    pub invoice_number: String,
    pub description: String,
    pub amount_cents: i64,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
}

// ---------------------------------------------------------------------------
// Payroll
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TimesheetBody {
    pub week_start_date: NaiveDate,
    pub hours: f64,
    #[serde(default)]
    pub courses_taught: u32,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ProfileChangeBody {
    pub field: ProfileField,
    pub new_value: String,
}

/// User edits where `null` clears a nullable field and an absent key
/// leaves it unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserBody {
    pub email: Option<String>,
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    #[serde(default, deserialize_with = "present")]
    pub organization_id: Option<Option<Uuid>>,
    pub password: Option<String>,
}

fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct ConfigurationBody {
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_null_are_distinct() {
        let absent: UpdateUserBody = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.phone, None);

        let cleared: UpdateUserBody = serde_json::from_str(r#"{"phone": null}"#).unwrap();
        assert_eq!(cleared.phone, Some(None));

        let set: UpdateUserBody = serde_json::from_str(r#"{"phone": "555-0100"}"#).unwrap();
        assert_eq!(set.phone, Some(Some("555-0100".into())));
    }

    #[test]
    fn login_accepts_email_key() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email": "a@example.com", "password": "x"}"#).unwrap();
        assert_eq!(req.username, "a@example.com");
    }
}
