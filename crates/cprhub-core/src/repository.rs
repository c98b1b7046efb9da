//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Status-changing operations take
//! the status the caller observed (`from`) and fail with
//! [`CprError::Conflict`](crate::error::CprError::Conflict) when the
//! stored record has moved on in the meantime.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CprResult;
use crate::models::{
    availability::InstructorAvailability,
    configuration::{SystemConfiguration, UpsertConfiguration},
    course_request::{CourseRequest, CourseRequestFilter, CourseStatus, CreateCourseRequest},
    course_student::{CourseStudent, NewStudent},
    course_type::{CourseType, CreateCourseType, UpdateCourseType},
    invoice::{CreateInvoice, Invoice, InvoiceFilter, InvoiceStatus, StatusCount},
    organization::{CreateOrganization, Organization, UpdateOrganization},
    payment::{CreatePayment, Payment},
    payment_request::{
        CreatePaymentRequest, PaymentRequest, PaymentRequestFilter, PaymentRequestStatus,
    },
    profile_change::{CreateProfileChange, ProfileChangeRequest, ProfileChangeStatus},
    timesheet::{CreateTimesheet, Timesheet, TimesheetFilter, TimesheetStatus, UpdateTimesheet},
    user::{CreateUser, UpdateUser, User, UserFilter},
    vendor_invoice::{
        CreateVendorInvoice, UpdateVendorInvoice, VendorInvoice, VendorInvoiceFilter,
        VendorInvoiceStatus,
    },
};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u64 = 200;

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

impl Pagination {
    /// Builds pagination from optional query parameters, capping the limit.
    pub fn from_query(offset: Option<u64>, limit: Option<u64>) -> Self {
        let d = Self::default();
        Self {
            offset: offset.unwrap_or(d.offset),
            limit: limit.unwrap_or(d.limit).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub trait OrganizationRepository: Send + Sync {
    fn create(
        &self,
        input: CreateOrganization,
    ) -> impl Future<Output = CprResult<Organization>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CprResult<Organization>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateOrganization,
    ) -> impl Future<Output = CprResult<Organization>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = CprResult<PaginatedResult<Organization>>> + Send;
}

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = CprResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CprResult<User>> + Send;
    fn get_by_username(&self, username: &str) -> impl Future<Output = CprResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = CprResult<User>> + Send;
    fn update(&self, id: Uuid, input: UpdateUser) -> impl Future<Output = CprResult<User>> + Send;
    /// Replace the password hash with a hash of `password`.
    fn set_password(
        &self,
        id: Uuid,
        password: &str,
    ) -> impl Future<Output = CprResult<()>> + Send;
    /// Soft-delete: sets status to Inactive.
    fn delete(&self, id: Uuid) -> impl Future<Output = CprResult<()>> + Send;
    fn list(
        &self,
        filter: UserFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CprResult<PaginatedResult<User>>> + Send;
}

/// Logout invalidation records keyed by token hash.
pub trait TokenBlacklistRepository: Send + Sync {
    /// Idempotent: blacklisting an already blacklisted token succeeds.
    fn add(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> impl Future<Output = CprResult<()>> + Send;
    fn is_blacklisted(&self, token_hash: &str) -> impl Future<Output = CprResult<bool>> + Send;
    /// Delete entries whose token has expired anyway. Returns the count.
    fn cleanup_expired(&self) -> impl Future<Output = CprResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

pub trait CourseTypeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateCourseType,
    ) -> impl Future<Output = CprResult<CourseType>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CprResult<CourseType>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateCourseType,
    ) -> impl Future<Output = CprResult<CourseType>> + Send;
    fn list(&self, active_only: bool) -> impl Future<Output = CprResult<Vec<CourseType>>> + Send;
}

pub trait CourseRequestRepository: Send + Sync {
    fn create(
        &self,
        input: CreateCourseRequest,
    ) -> impl Future<Output = CprResult<CourseRequest>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CprResult<CourseRequest>> + Send;
    fn list(
        &self,
        filter: CourseRequestFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CprResult<PaginatedResult<CourseRequest>>> + Send;

    /// Assign an instructor and move to `confirmed`. Consumes the
    /// instructor's availability for the scheduled date. When `from` is
    /// `confirmed` the previous instructor gets the date back.
    fn confirm(
        &self,
        id: Uuid,
        from: CourseStatus,
        instructor_id: Uuid,
    ) -> impl Future<Output = CprResult<CourseRequest>> + Send;
    fn complete(&self, id: Uuid) -> impl Future<Output = CprResult<CourseRequest>> + Send;
    /// Cancelling a confirmed course returns the date to its instructor.
    fn cancel(
        &self,
        id: Uuid,
        from: CourseStatus,
        reason: Option<String>,
    ) -> impl Future<Output = CprResult<CourseRequest>> + Send;
    /// Release a completed course to the billing queue.
    fn mark_ready_for_billing(
        &self,
        id: Uuid,
    ) -> impl Future<Output = CprResult<CourseRequest>> + Send;
    /// Completed, ready for billing and not invoiced; oldest completion first.
    fn billing_queue(&self) -> impl Future<Output = CprResult<Vec<CourseRequest>>> + Send;
    fn count_by_status(&self) -> impl Future<Output = CprResult<Vec<StatusCount>>> + Send;
    /// Course counts in `status` keyed by instructor.
    fn count_by_instructor(
        &self,
        status: CourseStatus,
    ) -> impl Future<Output = CprResult<Vec<(Uuid, u64)>>> + Send;
}

pub trait CourseStudentRepository: Send + Sync {
    /// Add a roster batch atomically. Fails with `AlreadyExists` if any
    /// email is already enrolled in the course.
    fn add_many(
        &self,
        course_request_id: Uuid,
        students: Vec<NewStudent>,
    ) -> impl Future<Output = CprResult<Vec<CourseStudent>>> + Send;
    fn get_by_id(
        &self,
        course_request_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CprResult<CourseStudent>> + Send;
    fn list(
        &self,
        course_request_id: Uuid,
    ) -> impl Future<Output = CprResult<Vec<CourseStudent>>> + Send;
    fn mark_attendance(
        &self,
        course_request_id: Uuid,
        id: Uuid,
        attended: bool,
    ) -> impl Future<Output = CprResult<CourseStudent>> + Send;
    fn remove(
        &self,
        course_request_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CprResult<()>> + Send;
}

pub trait AvailabilityRepository: Send + Sync {
    fn add(
        &self,
        instructor_id: Uuid,
        date: NaiveDate,
    ) -> impl Future<Output = CprResult<InstructorAvailability>> + Send;
    /// Entries on or after `from`, ascending by date.
    fn list_for_instructor(
        &self,
        instructor_id: Uuid,
        from: NaiveDate,
    ) -> impl Future<Output = CprResult<Vec<InstructorAvailability>>> + Send;
    fn remove(
        &self,
        instructor_id: Uuid,
        date: NaiveDate,
    ) -> impl Future<Output = CprResult<()>> + Send;
    fn is_available(
        &self,
        instructor_id: Uuid,
        date: NaiveDate,
    ) -> impl Future<Output = CprResult<bool>> + Send;
    fn instructors_available_on(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = CprResult<Vec<Uuid>>> + Send;
}

// ---------------------------------------------------------------------------
// Receivables
// ---------------------------------------------------------------------------

pub trait InvoiceRepository: Send + Sync {
    /// Create the invoice and flag its course as invoiced in one
    /// transaction. Fails with `Conflict` if the course has left the
    /// billing queue.
    fn create_for_course(
        &self,
        input: CreateInvoice,
    ) -> impl Future<Output = CprResult<Invoice>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CprResult<Invoice>> + Send;
    fn list(
        &self,
        filter: InvoiceFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CprResult<PaginatedResult<Invoice>>> + Send;
    fn list_all(
        &self,
        filter: InvoiceFilter,
    ) -> impl Future<Output = CprResult<Vec<Invoice>>> + Send;
    fn post(&self, id: Uuid) -> impl Future<Output = CprResult<Invoice>> + Send;
    /// Void the invoice and return its course to the billing queue.
    /// Payments still awaiting verification are rejected with it.
    /// Fails with `Conflict` if any verified payment exists.
    fn void(
        &self,
        id: Uuid,
        from: InvoiceStatus,
    ) -> impl Future<Output = CprResult<Invoice>> + Send;
}

pub trait PaymentRepository: Send + Sync {
    /// Record a payment against a posted invoice. Verified payments may
    /// not exceed the balance due, pending ones the balance left after
    /// other pending payments. A verified payment settles the invoice in
    /// the same transaction. Fails with `Conflict` otherwise.
    fn create(&self, input: CreatePayment) -> impl Future<Output = CprResult<Payment>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CprResult<Payment>> + Send;
    fn list_for_invoice(
        &self,
        invoice_id: Uuid,
    ) -> impl Future<Output = CprResult<Vec<Payment>>> + Send;
    fn list_for_invoices(
        &self,
        invoice_ids: &[Uuid],
    ) -> impl Future<Output = CprResult<Vec<Payment>>> + Send;
    fn list_all(&self) -> impl Future<Output = CprResult<Vec<Payment>>> + Send;
    /// Verify a pending payment. Fails with `Conflict` unless the invoice
    /// is posted and can absorb the amount. In the same transaction the
    /// invoice is marked paid once verified payments reach its total.
    fn verify(
        &self,
        id: Uuid,
        reviewer: Uuid,
    ) -> impl Future<Output = CprResult<Payment>> + Send;
    fn reject(
        &self,
        id: Uuid,
        reviewer: Uuid,
        notes: Option<String>,
    ) -> impl Future<Output = CprResult<Payment>> + Send;
}

// ---------------------------------------------------------------------------
// Payables
// ---------------------------------------------------------------------------

pub trait VendorInvoiceRepository: Send + Sync {
    fn create(
        &self,
        input: CreateVendorInvoice,
    ) -> impl Future<Output = CprResult<VendorInvoice>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CprResult<VendorInvoice>> + Send;
    /// Edit fields; only allowed while the invoice is editable.
    fn update(
        &self,
        id: Uuid,
        from: VendorInvoiceStatus,
        input: UpdateVendorInvoice,
    ) -> impl Future<Output = CprResult<VendorInvoice>> + Send;
    fn list(
        &self,
        filter: VendorInvoiceFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CprResult<PaginatedResult<VendorInvoice>>> + Send;
    fn submit(
        &self,
        id: Uuid,
        from: VendorInvoiceStatus,
    ) -> impl Future<Output = CprResult<VendorInvoice>> + Send;
    fn approve(&self, id: Uuid) -> impl Future<Output = CprResult<VendorInvoice>> + Send;
    fn reject(
        &self,
        id: Uuid,
        from: VendorInvoiceStatus,
        reason: String,
    ) -> impl Future<Output = CprResult<VendorInvoice>> + Send;
    fn pay(
        &self,
        id: Uuid,
        reference: Option<String>,
    ) -> impl Future<Output = CprResult<VendorInvoice>> + Send;
}

pub trait TimesheetRepository: Send + Sync {
    fn create(&self, input: CreateTimesheet) -> impl Future<Output = CprResult<Timesheet>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CprResult<Timesheet>> + Send;
    fn list(
        &self,
        filter: TimesheetFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CprResult<PaginatedResult<Timesheet>>> + Send;
    /// Edit a pending or rejected timesheet; the result is pending.
    fn update(
        &self,
        id: Uuid,
        from: TimesheetStatus,
        input: UpdateTimesheet,
    ) -> impl Future<Output = CprResult<Timesheet>> + Send;
    /// Approve and create the payment request in one transaction.
    fn approve(
        &self,
        id: Uuid,
        reviewer: Uuid,
        comment: Option<String>,
        payment: CreatePaymentRequest,
    ) -> impl Future<Output = CprResult<(Timesheet, PaymentRequest)>> + Send;
    fn reject(
        &self,
        id: Uuid,
        reviewer: Uuid,
        comment: Option<String>,
    ) -> impl Future<Output = CprResult<Timesheet>> + Send;
    /// Approved timesheets that have no payment request.
    fn approved_without_payment_request(
        &self,
    ) -> impl Future<Output = CprResult<Vec<Timesheet>>> + Send;
    /// Sum of approved hours keyed by instructor.
    fn approved_hours_by_instructor(
        &self,
    ) -> impl Future<Output = CprResult<Vec<(Uuid, f64)>>> + Send;
}

pub trait PaymentRequestRepository: Send + Sync {
    /// Fails with `AlreadyExists` if the timesheet already has one.
    fn create(
        &self,
        input: CreatePaymentRequest,
    ) -> impl Future<Output = CprResult<PaymentRequest>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CprResult<PaymentRequest>> + Send;
    fn get_by_timesheet(
        &self,
        timesheet_id: Uuid,
    ) -> impl Future<Output = CprResult<PaymentRequest>> + Send;
    fn list(
        &self,
        filter: PaymentRequestFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CprResult<PaginatedResult<PaymentRequest>>> + Send;
    fn approve(
        &self,
        id: Uuid,
        reviewer: Uuid,
    ) -> impl Future<Output = CprResult<PaymentRequest>> + Send;
    fn reject(
        &self,
        id: Uuid,
        from: PaymentRequestStatus,
        reviewer: Uuid,
        notes: Option<String>,
    ) -> impl Future<Output = CprResult<PaymentRequest>> + Send;
    fn pay(
        &self,
        id: Uuid,
        reviewer: Uuid,
        reference: Option<String>,
    ) -> impl Future<Output = CprResult<PaymentRequest>> + Send;
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

pub trait ProfileChangeRepository: Send + Sync {
    /// Fails with `AlreadyExists` if the user has a pending request for
    /// the same field.
    fn create(
        &self,
        input: CreateProfileChange,
    ) -> impl Future<Output = CprResult<ProfileChangeRequest>> + Send;
    fn get_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = CprResult<ProfileChangeRequest>> + Send;
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = CprResult<Vec<ProfileChangeRequest>>> + Send;
    fn list(
        &self,
        status: Option<ProfileChangeStatus>,
    ) -> impl Future<Output = CprResult<Vec<ProfileChangeRequest>>> + Send;
    /// Approve and apply the change to the user in one transaction.
    fn approve(
        &self,
        id: Uuid,
        reviewer: Uuid,
        comment: Option<String>,
    ) -> impl Future<Output = CprResult<ProfileChangeRequest>> + Send;
    fn reject(
        &self,
        id: Uuid,
        reviewer: Uuid,
        comment: Option<String>,
    ) -> impl Future<Output = CprResult<ProfileChangeRequest>> + Send;
}

pub trait ConfigurationRepository: Send + Sync {
    fn list(
        &self,
        category: Option<String>,
    ) -> impl Future<Output = CprResult<Vec<SystemConfiguration>>> + Send;
    fn get(&self, key: &str) -> impl Future<Output = CprResult<SystemConfiguration>> + Send;
    fn upsert(
        &self,
        input: UpsertConfiguration,
    ) -> impl Future<Output = CprResult<SystemConfiguration>> + Send;
    fn delete(&self, key: &str) -> impl Future<Output = CprResult<()>> + Send;
}
