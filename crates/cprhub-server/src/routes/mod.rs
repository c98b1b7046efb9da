//! API route handlers

pub mod accounting;
pub mod admin;
pub mod auth;
pub mod course_requests;
pub mod course_types;
pub mod health;
pub mod instructor;
pub mod organization;
pub mod payment_requests;
pub mod profile_changes;
pub mod sysadmin;
pub mod timesheets;
pub mod vendor;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Course catalog
        .route(
            "/course-types",
            get(course_types::list).post(course_types::create),
        )
        .route(
            "/course-types/:id",
            put(course_types::update).delete(course_types::deactivate),
        )
        // Course requests
        .route(
            "/course-requests",
            get(course_requests::list).post(course_requests::create),
        )
        .route("/course-requests/:id", get(course_requests::get))
        .route("/course-requests/:id/confirm", post(course_requests::confirm))
        .route("/course-requests/:id/complete", post(course_requests::complete))
        .route("/course-requests/:id/cancel", post(course_requests::cancel))
        .route(
            "/course-requests/:id/ready-for-billing",
            post(course_requests::ready_for_billing),
        )
        .route(
            "/course-requests/:id/students",
            get(course_requests::list_students).post(course_requests::add_students),
        )
        .route(
            "/course-requests/:id/students/:student_id",
            delete(course_requests::remove_student),
        )
        .route(
            "/course-requests/:id/students/:student_id/attendance",
            put(course_requests::mark_attendance),
        )
        // Instructor
        .route(
            "/instructor/availability",
            get(instructor::list_availability).post(instructor::add_availability),
        )
        .route(
            "/instructor/availability/:date",
            delete(instructor::remove_availability),
        )
        // Admin
        .route(
            "/admin/available-instructors",
            get(admin::available_instructors),
        )
        .route("/admin/analytics", get(admin::analytics))
        .route("/admin/vendor-invoices", get(admin::list_vendor_invoices))
        .route(
            "/admin/vendor-invoices/:id/approve",
            post(admin::approve_vendor_invoice),
        )
        .route(
            "/admin/vendor-invoices/:id/reject",
            post(admin::reject_vendor_invoice),
        )
        // Accounting
        .route("/accounting/billing-queue", get(accounting::billing_queue))
        .route(
            "/accounting/invoices",
            get(accounting::list_invoices).post(accounting::generate_invoice),
        )
        .route("/accounting/invoices/:id", get(accounting::get_invoice))
        .route("/accounting/invoices/:id/post", post(accounting::post_invoice))
        .route("/accounting/invoices/:id/void", post(accounting::void_invoice))
        .route(
            "/accounting/invoices/:id/payments",
            get(accounting::list_payments).post(accounting::record_payment),
        )
        .route(
            "/accounting/payments/:id/verify",
            post(accounting::verify_payment),
        )
        .route(
            "/accounting/payments/:id/reject",
            post(accounting::reject_payment),
        )
        .route("/accounting/summary", get(accounting::summary))
        .route(
            "/accounting/vendor-invoices",
            get(accounting::list_vendor_invoices),
        )
        .route(
            "/accounting/vendor-invoices/:id/pay",
            post(accounting::pay_vendor_invoice),
        )
        .route(
            "/accounting/vendor-invoices/:id/reject",
            post(accounting::reject_vendor_invoice),
        )
        // Organization portal
        .route("/organization/invoices", get(organization::list_invoices))
        .route("/organization/invoices/:id", get(organization::get_invoice))
        .route(
            "/organization/invoices/:id/payments",
            post(organization::submit_payment),
        )
        // Vendor portal
        .route("/vendor/invoices", get(vendor::list).post(vendor::create))
        .route("/vendor/invoices/:id", put(vendor::update))
        .route("/vendor/invoices/:id/submit", post(vendor::submit))
        // Payroll
        .route("/timesheet", get(timesheets::list).post(timesheets::create))
        .route("/timesheet/:id", put(timesheets::update))
        .route("/timesheet/:id/approve", post(timesheets::approve))
        .route("/timesheet/:id/reject", post(timesheets::reject))
        .route("/payment-requests", get(payment_requests::list))
        .route(
            "/payment-requests/reconcile",
            post(payment_requests::reconcile),
        )
        .route(
            "/payment-requests/:id/approve",
            post(payment_requests::approve),
        )
        .route(
            "/payment-requests/:id/reject",
            post(payment_requests::reject),
        )
        .route("/payment-requests/:id/pay", post(payment_requests::pay))
        // Profile changes
        .route(
            "/profile-changes",
            get(profile_changes::list_own).post(profile_changes::create),
        )
        .route(
            "/hr/profile-changes",
            get(profile_changes::list_for_review),
        )
        .route(
            "/hr/profile-changes/:id/approve",
            post(profile_changes::approve),
        )
        .route(
            "/hr/profile-changes/:id/reject",
            post(profile_changes::reject),
        )
        // System administration
        .route(
            "/sysadmin/users",
            get(sysadmin::list_users).post(sysadmin::create_user),
        )
        .route(
            "/sysadmin/users/:id",
            put(sysadmin::update_user).delete(sysadmin::delete_user),
        )
        .route(
            "/sysadmin/organizations",
            get(sysadmin::list_organizations).post(sysadmin::create_organization),
        )
        .route(
            "/sysadmin/organizations/:id",
            put(sysadmin::update_organization),
        )
        .route(
            "/sysadmin/configurations",
            get(sysadmin::list_configurations),
        )
        .route(
            "/sysadmin/configurations/:key",
            get(sysadmin::get_configuration)
                .put(sysadmin::put_configuration)
                .delete(sysadmin::delete_configuration),
        )
        .route(
            "/sysadmin/token-blacklist/cleanup",
            post(sysadmin::cleanup_token_blacklist),
        )
}
