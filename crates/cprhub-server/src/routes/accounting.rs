//! Accounting portal: billing queue, organization invoices, payments and
//! vendor invoice settlement.

use std::collections::HashMap;

use axum::extract::State;
use chrono::{DateTime, Utc};
use cprhub_core::billing::{self, Balance, InvoiceQuote};
use cprhub_core::error::CprError;
use cprhub_core::models::course_request::BillingQueueEntry;
use cprhub_core::models::invoice::{
    AccountingSummary, CreateInvoice, Invoice, InvoiceFilter, InvoiceStatus, InvoiceSummary,
    StatusCount,
};
use cprhub_core::models::payment::{CreatePayment, Payment, PaymentStatus};
use cprhub_core::models::user::Role;
use cprhub_core::models::vendor_invoice::{
    VendorInvoice, VendorInvoiceFilter, VendorInvoiceStatus,
};
use cprhub_core::repository::{
    CourseRequestRepository, CourseStudentRepository, CourseTypeRepository, InvoiceRepository,
    OrganizationRepository, PaginatedResult, PaymentRepository, VendorInvoiceRepository,
};
use cprhub_core::workflow::{InvoiceAction, PaymentAction, VendorInvoiceAction, Workflow};
use tracing::info;
use uuid::Uuid;

use crate::dto::{
    GenerateInvoiceRequest, InvoiceDetail, InvoiceListQuery, NotesRequest, PayRequest,
    PaymentBody, ReasonRequest, VendorInvoiceListQuery,
};
use crate::envelope::{created, ok, ApiJson, ApiPath, ApiQuery, Created, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::routes::admin::reject_vendor_invoice_as;
use crate::state::AppState;

const ACCOUNTING: &[Role] = &[Role::Accountant];

pub(crate) fn summary_of(invoice: Invoice, payments: &[Payment], now: DateTime<Utc>) -> InvoiceSummary {
    let balance = Balance::of(&invoice, payments);
    let overdue = invoice.status == InvoiceStatus::Posted && billing::is_overdue(&invoice, &balance, now);
    InvoiceSummary {
        invoice,
        amount_paid_cents: balance.paid_cents,
        pending_payments_cents: balance.pending_cents,
        balance_due_cents: balance.due_cents,
        overdue,
    }
}

pub(crate) async fn invoice_detail(state: &AppState, invoice: Invoice) -> ApiResult<InvoiceDetail> {
    let payments = state.payments.list_for_invoice(invoice.id).await?;
    Ok(InvoiceDetail {
        summary: summary_of(invoice, &payments, Utc::now()),
        payments,
    })
}

/// Page of invoices with their balances.
pub(crate) async fn invoice_page(
    state: &AppState,
    filter: InvoiceFilter,
    query: &InvoiceListQuery,
) -> ApiResult<PaginatedResult<InvoiceSummary>> {
    let page = state.invoices.list(filter, query.pagination()).await?;
    let ids: Vec<Uuid> = page.items.iter().map(|invoice| invoice.id).collect();
    let payments = state.payments.list_for_invoices(&ids).await?;
    let now = Utc::now();
    Ok(page.map(|invoice| summary_of(invoice, &payments, now)))
}

/// Validate an incoming payment against what the invoice still owes.
/// `pending_counts` reserves room for payments awaiting verification.
pub(crate) fn check_payment_amount(
    summary: &InvoiceSummary,
    amount_cents: i64,
    pending_counts: bool,
) -> ApiResult<()> {
    if summary.invoice.status != InvoiceStatus::Posted {
        return Err(ApiError::conflict(format!(
            "invoice {} is {}, payments are accepted only on posted invoices",
            summary.invoice.invoice_number, summary.invoice.status
        )));
    }
    if amount_cents <= 0 {
        return Err(ApiError::validation("payment amount must be positive"));
    }
    let limit = if pending_counts {
        (summary.balance_due_cents - summary.pending_payments_cents).max(0)
    } else {
        summary.balance_due_cents
    };
    if amount_cents > limit {
        return Err(ApiError::validation(format!(
            "payment of {amount_cents} cents exceeds the {limit} cents that may still be paid"
        )));
    }
    Ok(())
}

/// A pending payment may be verified only while the invoice is posted and
/// the verified total stays within what is owed.
pub(crate) fn check_verification(summary: &InvoiceSummary, amount_cents: i64) -> ApiResult<()> {
    if summary.invoice.status != InvoiceStatus::Posted {
        return Err(ApiError::conflict(format!(
            "invoice {} is {}, payments are verified only on posted invoices",
            summary.invoice.invoice_number, summary.invoice.status
        )));
    }
    if amount_cents > summary.balance_due_cents {
        return Err(ApiError::conflict(format!(
            "payment of {amount_cents} cents exceeds the {} cents still due",
            summary.balance_due_cents
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Billing queue and invoice generation
// ---------------------------------------------------------------------------

pub async fn billing_queue(
    State(state): State<AppState>,
    user: AuthUser,
) -> Reply<Vec<BillingQueueEntry>> {
    user.require(&[Role::Accountant, Role::Admin])?;

    let mut organizations = HashMap::new();
    let mut course_types = HashMap::new();
    let mut entries = Vec::new();
    for course in state.courses.billing_queue().await? {
        if !organizations.contains_key(&course.organization_id) {
            let org = state.organizations.get_by_id(course.organization_id).await?;
            organizations.insert(org.id, org.name);
        }
        if !course_types.contains_key(&course.course_type_id) {
            let ct = state.course_types.get_by_id(course.course_type_id).await?;
            course_types.insert(ct.id, (ct.name, ct.price_per_student_cents));
        }
        let students = state.students.list(course.id).await?;
        let attended_count = students.iter().filter(|s| s.attended == Some(true)).count();

        let organization_name = organizations
            .get(&course.organization_id)
            .cloned()
            .unwrap_or_default();
        let (course_type_name, price_per_student_cents) = course_types
            .get(&course.course_type_id)
            .cloned()
            .unwrap_or_default();
        entries.push(BillingQueueEntry {
            course,
            organization_name,
            course_type_name,
            price_per_student_cents,
            roster_size: students.len() as u32,
            attended_count: attended_count as u32,
        });
    }
    ok(entries)
}

/// Invoice a course from the billing queue. Attended students are
/// billed; a roster without any attendance marks is billed in full.
pub async fn generate_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<GenerateInvoiceRequest>,
) -> Created<InvoiceDetail> {
    user.require(ACCOUNTING)?;
    let course = state.courses.get_by_id(req.course_request_id).await?;
    if !course.in_billing_queue() {
        return Err(ApiError::conflict(format!(
            "course request {} is not in the billing queue",
            course.id
        )));
    }

    let students = state.students.list(course.id).await?;
    let marked = students.iter().any(|s| s.attended.is_some());
    let student_count = if marked {
        students.iter().filter(|s| s.attended == Some(true)).count()
    } else {
        students.len()
    } as u32;

    let course_type = state.course_types.get_by_id(course.course_type_id).await?;
    let settings = state.billing_settings().await?;
    let quote = InvoiceQuote::compute(
        student_count,
        course_type.price_per_student_cents,
        &settings,
    )?;

    let id = Uuid::new_v4();
    let today = Utc::now().date_naive();
    let invoice = state
        .invoices
        .create_for_course(CreateInvoice {
            id,
            invoice_number: billing::invoice_number(today, id),
            course_request_id: course.id,
            organization_id: course.organization_id,
            student_count: quote.student_count,
            rate_per_student_cents: quote.rate_per_student_cents,
            subtotal_cents: quote.subtotal_cents,
            tax_cents: quote.tax_cents,
            total_cents: quote.total_cents,
            due_date: billing::due_date(today, &settings),
        })
        .await?;
    info!(
        invoice_id = %invoice.id,
        course_request_id = %course.id,
        total_cents = invoice.total_cents,
        "invoice generated"
    );
    created(invoice_detail(&state, invoice).await?)
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<InvoiceListQuery>,
) -> Reply<PaginatedResult<InvoiceSummary>> {
    user.require(ACCOUNTING)?;
    let filter = InvoiceFilter {
        organization_id: query.organization_id,
        statuses: query.status.into_iter().collect(),
    };
    ok(invoice_page(&state, filter, &query).await?)
}

pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<InvoiceDetail> {
    user.require(ACCOUNTING)?;
    let invoice = state.invoices.get_by_id(id).await?;
    ok(invoice_detail(&state, invoice).await?)
}

/// Make the invoice visible to its organization.
pub async fn post_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<InvoiceDetail> {
    user.require(ACCOUNTING)?;
    let invoice = state.invoices.get_by_id(id).await?;
    invoice.status.apply(InvoiceAction::Post)?;

    let posted = state.invoices.post(id).await?;
    info!(invoice_id = %id, "invoice posted");
    ok(invoice_detail(&state, posted).await?)
}

pub async fn void_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<InvoiceDetail> {
    user.require(ACCOUNTING)?;
    let invoice = state.invoices.get_by_id(id).await?;
    invoice.status.apply(InvoiceAction::Void)?;

    let voided = state.invoices.void(id, invoice.status).await?;
    info!(invoice_id = %id, course_request_id = %voided.course_request_id, "invoice voided");
    ok(invoice_detail(&state, voided).await?)
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<Vec<Payment>> {
    user.require(ACCOUNTING)?;
    let invoice = state.invoices.get_by_id(id).await?;
    ok(state.payments.list_for_invoice(invoice.id).await?)
}

/// Record a payment received by accounting. It is verified on entry and
/// settles the invoice in the same write once the total is covered.
pub async fn record_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PaymentBody>,
) -> Created<Payment> {
    user.require(ACCOUNTING)?;
    let invoice = state.invoices.get_by_id(id).await?;
    let detail = invoice_detail(&state, invoice).await?;
    check_payment_amount(&detail.summary, body.amount_cents, false)?;

    let payment = state
        .payments
        .create(CreatePayment {
            invoice_id: id,
            amount_cents: body.amount_cents,
            method: body.method,
            reference: body.reference,
            payment_date: body.payment_date.unwrap_or_else(|| Utc::now().date_naive()),
            submitted_by: user.id(),
            notes: body.notes,
            status: PaymentStatus::Verified,
        })
        .await?;
    info!(payment_id = %payment.id, invoice_id = %id, amount_cents = payment.amount_cents, "payment recorded");
    created(payment)
}

pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<Payment> {
    user.require(ACCOUNTING)?;
    let payment = state.payments.get_by_id(id).await?;
    payment.status.apply(PaymentAction::Verify)?;
    let invoice = state.invoices.get_by_id(payment.invoice_id).await?;
    let detail = invoice_detail(&state, invoice).await?;
    check_verification(&detail.summary, payment.amount_cents)?;

    let verified = state.payments.verify(id, user.id()).await?;
    info!(payment_id = %id, invoice_id = %verified.invoice_id, "payment verified");
    ok(verified)
}

pub async fn reject_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NotesRequest>,
) -> Reply<Payment> {
    user.require(ACCOUNTING)?;
    let payment = state.payments.get_by_id(id).await?;
    payment.status.apply(PaymentAction::Reject)?;

    let rejected = state.payments.reject(id, user.id(), req.notes).await?;
    info!(payment_id = %id, "payment rejected");
    ok(rejected)
}

// ---------------------------------------------------------------------------
// Rollup
// ---------------------------------------------------------------------------

pub(crate) fn accounting_summary(
    invoices: Vec<Invoice>,
    payments: &[Payment],
    now: DateTime<Utc>,
) -> AccountingSummary {
    let mut summary = AccountingSummary::default();
    let mut counts: HashMap<InvoiceStatus, u64> = HashMap::new();

    for invoice in invoices {
        *counts.entry(invoice.status).or_default() += 1;
        if invoice.status == InvoiceStatus::Void {
            continue;
        }
        let s = summary_of(invoice, payments, now);
        summary.total_invoiced_cents += s.invoice.total_cents;
        summary.total_collected_cents += s.amount_paid_cents;
        if s.invoice.status == InvoiceStatus::Posted {
            summary.outstanding_cents += s.balance_due_cents;
        }
        if s.overdue {
            summary.overdue_count += 1;
            summary.overdue_cents += s.balance_due_cents;
        }
    }

    summary.invoices_by_status = InvoiceStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: status.to_string(),
            count: counts.get(status).copied().unwrap_or(0),
        })
        .collect();
    summary
}

pub async fn summary(State(state): State<AppState>, user: AuthUser) -> Reply<AccountingSummary> {
    user.require(&[Role::Accountant, Role::Admin])?;
    let invoices = state.invoices.list_all(InvoiceFilter::default()).await?;
    let payments = state.payments.list_all().await?;
    ok(accounting_summary(invoices, &payments, Utc::now()))
}

// ---------------------------------------------------------------------------
// Vendor invoices
// ---------------------------------------------------------------------------

fn visible_to_accounting(invoice: &VendorInvoice) -> bool {
    VendorInvoiceStatus::VISIBLE_TO_ACCOUNTING.contains(&invoice.status)
}

pub async fn list_vendor_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<VendorInvoiceListQuery>,
) -> Reply<PaginatedResult<VendorInvoice>> {
    user.require(ACCOUNTING)?;
    let visible = VendorInvoiceStatus::VISIBLE_TO_ACCOUNTING;
    let statuses = match query.status {
        Some(s) if visible.contains(&s) => vec![s],
        Some(s) => {
            return Err(ApiError::validation(format!(
                "vendor invoices in status {s} are not visible to accounting"
            )));
        }
        None => visible.to_vec(),
    };
    let filter = VendorInvoiceFilter {
        vendor_id: None,
        statuses,
    };
    ok(state
        .vendor_invoices
        .list(filter, query.pagination())
        .await?)
}

pub async fn pay_vendor_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<PayRequest>,
) -> Reply<VendorInvoice> {
    user.require(ACCOUNTING)?;
    let invoice = state.vendor_invoices.get_by_id(id).await?;
    if !visible_to_accounting(&invoice) {
        return Err(CprError::not_found("vendor invoice", id).into());
    }
    invoice.status.apply(VendorInvoiceAction::Pay)?;

    let paid = state.vendor_invoices.pay(id, req.reference).await?;
    info!(vendor_invoice_id = %id, amount_cents = paid.amount_cents, "vendor invoice paid");
    ok(paid)
}

pub async fn reject_vendor_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ReasonRequest>,
) -> Reply<VendorInvoice> {
    user.require(ACCOUNTING)?;
    ok(reject_vendor_invoice_as(&state, id, req.reason, visible_to_accounting).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use cprhub_core::models::payment::PaymentMethod;

    fn invoice(status: InvoiceStatus, total: i64, due: NaiveDate) -> Invoice {
        let now = Utc::now();
        Invoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-TEST".into(),
            course_request_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            student_count: 1,
            rate_per_student_cents: total,
            subtotal_cents: total,
            tax_cents: 0,
            total_cents: total,
            due_date: due,
            status,
            posted_at: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(invoice_id: Uuid, amount: i64, status: PaymentStatus) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            invoice_id,
            amount_cents: amount,
            method: PaymentMethod::Cheque,
            reference: None,
            payment_date: Utc::now().date_naive(),
            status,
            submitted_by: Uuid::new_v4(),
            reviewed_by: None,
            reviewed_at: None,
            notes: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summary_rolls_up_balances_and_overdue() {
        let now = Utc::now();
        let past = now.date_naive() - Duration::days(3);
        let future = now.date_naive() + Duration::days(3);

        let overdue = invoice(InvoiceStatus::Posted, 10_000, past);
        let current = invoice(InvoiceStatus::Posted, 5_000, future);
        let paid = invoice(InvoiceStatus::Paid, 2_000, past);
        let void = invoice(InvoiceStatus::Void, 99_000, past);
        let payments = vec![
            payment(overdue.id, 4_000, PaymentStatus::Verified),
            payment(current.id, 1_000, PaymentStatus::PendingVerification),
            payment(paid.id, 2_000, PaymentStatus::Verified),
        ];

        let s = accounting_summary(vec![overdue, current, paid, void], &payments, now);
        assert_eq!(s.total_invoiced_cents, 17_000);
        assert_eq!(s.total_collected_cents, 6_000);
        assert_eq!(s.outstanding_cents, 6_000 + 5_000);
        assert_eq!(s.overdue_count, 1);
        assert_eq!(s.overdue_cents, 6_000);

        let count = |status: &str| {
            s.invoices_by_status
                .iter()
                .find(|c| c.status == status)
                .map(|c| c.count)
        };
        assert_eq!(count("posted"), Some(2));
        assert_eq!(count("void"), Some(1));
        assert_eq!(count("pending"), Some(0));
    }

    #[test]
    fn payment_amount_limits() {
        let inv = invoice(
            InvoiceStatus::Posted,
            10_000,
            Utc::now().date_naive() + Duration::days(10),
        );
        let payments = vec![payment(inv.id, 3_000, PaymentStatus::PendingVerification)];
        let s = summary_of(inv, &payments, Utc::now());

        assert!(check_payment_amount(&s, 7_000, true).is_ok());
        assert!(check_payment_amount(&s, 7_001, true).is_err());
        assert!(check_payment_amount(&s, 10_000, false).is_ok());
        assert!(check_payment_amount(&s, 0, false).is_err());
    }

    #[test]
    fn payments_only_against_posted_invoices() {
        let inv = invoice(InvoiceStatus::Pending, 1_000, Utc::now().date_naive());
        let s = summary_of(inv, &[], Utc::now());
        assert!(matches!(
            check_payment_amount(&s, 100, false),
            Err(ApiError::Domain(CprError::Conflict(_)))
        ));
    }

    #[test]
    fn verification_needs_posted_invoice_with_room() {
        let due = Utc::now().date_naive() + Duration::days(10);
        let inv = invoice(InvoiceStatus::Paid, 10_500, due);
        let payments = vec![payment(inv.id, 10_500, PaymentStatus::Verified)];
        let paid = summary_of(inv, &payments, Utc::now());
        assert!(check_verification(&paid, 10_000).is_err());

        let inv = invoice(InvoiceStatus::Void, 10_500, due);
        let void = summary_of(inv, &[], Utc::now());
        assert!(matches!(
            check_verification(&void, 5_000),
            Err(ApiError::Domain(CprError::Conflict(_)))
        ));

        let inv = invoice(InvoiceStatus::Posted, 10_500, due);
        let payments = vec![payment(inv.id, 500, PaymentStatus::Verified)];
        let posted = summary_of(inv, &payments, Utc::now());
        assert!(check_verification(&posted, 10_000).is_ok());
        assert!(check_verification(&posted, 10_001).is_err());
    }
}
