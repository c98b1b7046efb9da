//! Integration tests for vendor invoices, timesheets and instructor
//! payment requests.

use chrono::NaiveDate;
use cprhub_core::error::CprError;
use cprhub_core::models::payment_request::{
    CreatePaymentRequest, PaymentRequestFilter, PaymentRequestStatus,
};
use cprhub_core::models::timesheet::{
    CreateTimesheet, TimesheetFilter, TimesheetStatus, UpdateTimesheet,
};
use cprhub_core::models::vendor_invoice::{
    CreateVendorInvoice, UpdateVendorInvoice, VendorInvoiceFilter, VendorInvoiceStatus,
};
use cprhub_core::repository::{
    Pagination, PaymentRequestRepository, TimesheetRepository, VendorInvoiceRepository,
};
use cprhub_db::repository::{
    SurrealPaymentRequestRepository, SurrealTimesheetRepository, SurrealVendorInvoiceRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    cprhub_db::run_migrations(&db).await.unwrap();
    db
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, d).unwrap()
}

fn vendor_invoice(vendor_id: Uuid, number: &str) -> CreateVendorInvoice {
    CreateVendorInvoice {
        vendor_id,
        invoice_number: number.into(),
        description: "Replacement AED pads".into(),
        amount_cents: 42_000,
        invoice_date: date(10, 1),
        due_date: date(10, 31),
    }
}

fn timesheet(instructor_id: Uuid, week: NaiveDate) -> CreateTimesheet {
    CreateTimesheet {
        instructor_id,
        week_start_date: week,
        hours: 12.5,
        courses_taught: 3,
        notes: None,
    }
}

#[tokio::test]
async fn vendor_invoice_full_lifecycle() {
    let db = setup().await;
    let repo = SurrealVendorInvoiceRepository::new(db);
    let vendor = Uuid::new_v4();

    let inv = repo.create(vendor_invoice(vendor, "V-100")).await.unwrap();
    assert_eq!(inv.status, VendorInvoiceStatus::PendingSubmission);

    let submitted = repo
        .submit(inv.id, VendorInvoiceStatus::PendingSubmission)
        .await
        .unwrap();
    assert!(submitted.submitted_at.is_some());

    let approved = repo.approve(inv.id).await.unwrap();
    assert_eq!(approved.status, VendorInvoiceStatus::SentToAccounting);

    let paid = repo.pay(inv.id, Some("CHQ-2231".into())).await.unwrap();
    assert_eq!(paid.status, VendorInvoiceStatus::Paid);
    assert_eq!(paid.payment_reference.as_deref(), Some("CHQ-2231"));

    assert!(matches!(
        repo.pay(inv.id, None).await.unwrap_err(),
        CprError::Conflict(_)
    ));
}

#[tokio::test]
async fn rejected_vendor_invoice_can_be_edited_and_resubmitted() {
    let db = setup().await;
    let repo = SurrealVendorInvoiceRepository::new(db);
    let inv = repo
        .create(vendor_invoice(Uuid::new_v4(), "V-200"))
        .await
        .unwrap();
    repo.submit(inv.id, VendorInvoiceStatus::PendingSubmission)
        .await
        .unwrap();

    let rejected = repo
        .reject(
            inv.id,
            VendorInvoiceStatus::SubmittedToAdmin,
            "Missing PO number".into(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Missing PO number"));

    let edited = repo
        .update(
            inv.id,
            VendorInvoiceStatus::Rejected,
            UpdateVendorInvoice {
                description: Some("Replacement AED pads, PO 7781".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.status, VendorInvoiceStatus::Rejected);

    let resubmitted = repo
        .submit(inv.id, VendorInvoiceStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(resubmitted.status, VendorInvoiceStatus::SubmittedToAdmin);
    assert!(resubmitted.rejection_reason.is_none());

    // Editing after submission loses the race.
    let err = repo
        .update(
            inv.id,
            VendorInvoiceStatus::Rejected,
            UpdateVendorInvoice {
                amount_cents: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::Conflict(_)));
}

#[tokio::test]
async fn vendor_invoice_numbers_are_unique_per_vendor() {
    let db = setup().await;
    let repo = SurrealVendorInvoiceRepository::new(db);
    let vendor = Uuid::new_v4();
    repo.create(vendor_invoice(vendor, "V-300")).await.unwrap();

    let err = repo
        .create(vendor_invoice(vendor, "V-300"))
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }));
    repo.create(vendor_invoice(Uuid::new_v4(), "V-300"))
        .await
        .unwrap();

    let accounting_view = repo
        .list(
            VendorInvoiceFilter {
                vendor_id: None,
                statuses: VendorInvoiceStatus::VISIBLE_TO_ACCOUNTING.to_vec(),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(accounting_view.total, 0);

    let mine = repo
        .list(
            VendorInvoiceFilter {
                vendor_id: Some(vendor),
                statuses: Vec::new(),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
}

#[tokio::test]
async fn timesheet_approval_creates_payment_request_atomically() {
    let db = setup().await;
    let timesheets = SurrealTimesheetRepository::new(db.clone());
    let requests = SurrealPaymentRequestRepository::new(db);
    let instructor = Uuid::new_v4();
    let hr = Uuid::new_v4();

    let ts = timesheets
        .create(timesheet(instructor, date(10, 19)))
        .await
        .unwrap();
    assert_eq!(ts.status, TimesheetStatus::Pending);

    let (approved, request) = timesheets
        .approve(
            ts.id,
            hr,
            Some("Thanks".into()),
            CreatePaymentRequest {
                instructor_id: instructor,
                timesheet_id: ts.id,
                amount_cents: 31_250,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(approved.status, TimesheetStatus::Approved);
    assert_eq!(approved.reviewed_by, Some(hr));
    assert_eq!(request.timesheet_id, ts.id);
    assert_eq!(request.status, PaymentRequestStatus::Pending);
    assert_eq!(requests.get_by_timesheet(ts.id).await.unwrap().id, request.id);

    let err = timesheets
        .approve(
            ts.id,
            hr,
            None,
            CreatePaymentRequest {
                instructor_id: instructor,
                timesheet_id: ts.id,
                amount_cents: 1,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::Conflict(_)));

    let hours = timesheets.approved_hours_by_instructor().await.unwrap();
    assert_eq!(hours, vec![(instructor, 12.5)]);
    assert!(
        timesheets
            .approved_without_payment_request()
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn one_timesheet_per_instructor_week() {
    let db = setup().await;
    let repo = SurrealTimesheetRepository::new(db);
    let instructor = Uuid::new_v4();
    repo.create(timesheet(instructor, date(10, 12))).await.unwrap();

    let err = repo
        .create(timesheet(instructor, date(10, 12)))
        .await
        .unwrap_err();
    assert!(matches!(err, CprError::AlreadyExists { .. }));
}

#[tokio::test]
async fn rejected_timesheet_edit_returns_to_pending() {
    let db = setup().await;
    let repo = SurrealTimesheetRepository::new(db);
    let instructor = Uuid::new_v4();
    let ts = repo
        .create(timesheet(instructor, date(10, 5)))
        .await
        .unwrap();

    let rejected = repo
        .reject(ts.id, Uuid::new_v4(), Some("Hours look high".into()))
        .await
        .unwrap();
    assert_eq!(rejected.status, TimesheetStatus::Rejected);

    let edited = repo
        .update(
            ts.id,
            TimesheetStatus::Rejected,
            UpdateTimesheet {
                hours: Some(8.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.status, TimesheetStatus::Pending);
    assert_eq!(edited.hours, 8.0);
    assert!(edited.review_comment.is_none());

    let page = repo
        .list(
            TimesheetFilter {
                instructor_id: Some(instructor),
                status: Some(TimesheetStatus::Pending),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn orphaned_approval_is_found_and_reconciled() {
    let db = setup().await;
    let timesheets = SurrealTimesheetRepository::new(db.clone());
    let requests = SurrealPaymentRequestRepository::new(db.clone());
    let instructor = Uuid::new_v4();
    let ts = timesheets
        .create(timesheet(instructor, date(9, 28)))
        .await
        .unwrap();

    // Approved directly, bypassing the repository.
    db.query("UPDATE type::record('timesheet', $id) SET status = 'approved'")
        .bind(("id", ts.id.to_string()))
        .await
        .unwrap();

    let orphans = timesheets.approved_without_payment_request().await.unwrap();
    assert_eq!(orphans.len(), 1);

    let input = CreatePaymentRequest {
        instructor_id: instructor,
        timesheet_id: ts.id,
        amount_cents: 31_250,
        notes: Some("Reconciled".into()),
    };
    requests.create(input.clone()).await.unwrap();
    assert!(matches!(
        requests.create(input).await.unwrap_err(),
        CprError::AlreadyExists { .. }
    ));
    assert!(
        timesheets
            .approved_without_payment_request()
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn payment_request_approve_pay_and_reject() {
    let db = setup().await;
    let repo = SurrealPaymentRequestRepository::new(db);
    let instructor = Uuid::new_v4();
    let accountant = Uuid::new_v4();

    let pr = repo
        .create(CreatePaymentRequest {
            instructor_id: instructor,
            timesheet_id: Uuid::new_v4(),
            amount_cents: 10_000,
            notes: None,
        })
        .await
        .unwrap();

    assert!(matches!(
        repo.pay(pr.id, accountant, None).await.unwrap_err(),
        CprError::Conflict(_)
    ));

    repo.approve(pr.id, accountant).await.unwrap();
    let paid = repo
        .pay(pr.id, accountant, Some("DD-991".into()))
        .await
        .unwrap();
    assert_eq!(paid.status, PaymentRequestStatus::Paid);
    assert_eq!(paid.payment_reference.as_deref(), Some("DD-991"));
    assert!(paid.paid_at.is_some());

    let other = repo
        .create(CreatePaymentRequest {
            instructor_id: instructor,
            timesheet_id: Uuid::new_v4(),
            amount_cents: 5_000,
            notes: None,
        })
        .await
        .unwrap();
    let rejected = repo
        .reject(
            other.id,
            PaymentRequestStatus::Pending,
            accountant,
            Some("Duplicate claim".into()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, PaymentRequestStatus::Rejected);
    assert_eq!(rejected.notes.as_deref(), Some("Duplicate claim"));

    let page = repo
        .list(
            PaymentRequestFilter {
                instructor_id: Some(instructor),
                status: None,
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 2);
}
