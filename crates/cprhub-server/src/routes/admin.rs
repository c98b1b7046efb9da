//! Admin portal: instructor lookup, analytics and vendor invoice review.

use std::collections::HashMap;

use axum::extract::State;
use cprhub_core::error::CprError;
use cprhub_core::models::analytics::{CourseAnalytics, InstructorWorkload};
use cprhub_core::models::course_request::CourseStatus;
use cprhub_core::models::user::{Role, User, UserFilter, UserStatus};
use cprhub_core::models::vendor_invoice::{VendorInvoice, VendorInvoiceFilter};
use cprhub_core::repository::{
    AvailabilityRepository, CourseRequestRepository, MAX_PAGE_SIZE, PaginatedResult, Pagination,
    TimesheetRepository, UserRepository, VendorInvoiceRepository,
};
use cprhub_core::workflow::{VendorInvoiceAction, Workflow};
use tracing::info;
use uuid::Uuid;

use crate::dto::{DateQuery, ReasonRequest, VendorInvoiceListQuery};
use crate::envelope::{ok, ApiJson, ApiPath, ApiQuery, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

/// Every active instructor, page by page.
async fn active_instructors(state: &AppState) -> ApiResult<Vec<User>> {
    let filter = UserFilter {
        role: Some(Role::Instructor),
        status: Some(UserStatus::Active),
    };
    let mut all = Vec::new();
    let mut offset = 0;
    loop {
        let page = state
            .users
            .list(
                filter.clone(),
                Pagination {
                    offset,
                    limit: MAX_PAGE_SIZE,
                },
            )
            .await?;
        let fetched = page.items.len() as u64;
        all.extend(page.items);
        offset += fetched;
        if fetched == 0 || offset >= page.total {
            return Ok(all);
        }
    }
}

/// Active instructors who declared availability on `date`.
pub async fn available_instructors(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<DateQuery>,
) -> Reply<Vec<User>> {
    user.require(&[Role::Admin])?;
    let ids = state.availability.instructors_available_on(query.date).await?;
    let instructors = active_instructors(&state)
        .await?
        .into_iter()
        .filter(|u| ids.contains(&u.id))
        .collect();
    ok(instructors)
}

pub async fn analytics(State(state): State<AppState>, user: AuthUser) -> Reply<CourseAnalytics> {
    user.require(&[Role::Admin, Role::Sysadmin])?;

    let courses_by_status = state.courses.count_by_status().await?;
    let billing_queue_size = state.courses.billing_queue().await?.len() as u64;

    let confirmed: HashMap<Uuid, u64> = state
        .courses
        .count_by_instructor(CourseStatus::Confirmed)
        .await?
        .into_iter()
        .collect();
    let completed: HashMap<Uuid, u64> = state
        .courses
        .count_by_instructor(CourseStatus::Completed)
        .await?
        .into_iter()
        .collect();
    let hours: HashMap<Uuid, f64> = state
        .timesheets
        .approved_hours_by_instructor()
        .await?
        .into_iter()
        .collect();

    let instructor_workload = active_instructors(&state)
        .await?
        .into_iter()
        .map(|u| InstructorWorkload {
            instructor_id: u.id,
            confirmed_courses: confirmed.get(&u.id).copied().unwrap_or(0),
            completed_courses: completed.get(&u.id).copied().unwrap_or(0),
            approved_hours: hours.get(&u.id).copied().unwrap_or(0.0),
            full_name: u.full_name,
        })
        .collect();

    ok(CourseAnalytics {
        courses_by_status,
        billing_queue_size,
        instructor_workload,
    })
}

pub async fn list_vendor_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<VendorInvoiceListQuery>,
) -> Reply<PaginatedResult<VendorInvoice>> {
    user.require(&[Role::Admin])?;
    let filter = VendorInvoiceFilter {
        vendor_id: None,
        statuses: query.status.into_iter().collect(),
    };
    ok(state
        .vendor_invoices
        .list(filter, query.pagination())
        .await?)
}

pub async fn approve_vendor_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<VendorInvoice> {
    user.require(&[Role::Admin])?;
    let invoice = state.vendor_invoices.get_by_id(id).await?;
    invoice.status.apply(VendorInvoiceAction::Approve)?;

    let updated = state.vendor_invoices.approve(id).await?;
    info!(vendor_invoice_id = %id, "vendor invoice sent to accounting");
    ok(updated)
}

/// Shared by the admin and accounting reject endpoints.
pub(crate) async fn reject_vendor_invoice_as(
    state: &AppState,
    id: Uuid,
    reason: String,
    visible: impl Fn(&VendorInvoice) -> bool,
) -> ApiResult<VendorInvoice> {
    if reason.trim().is_empty() {
        return Err(ApiError::validation("a rejection reason is required"));
    }
    let invoice = state.vendor_invoices.get_by_id(id).await?;
    if !visible(&invoice) {
        return Err(CprError::not_found("vendor invoice", id).into());
    }
    invoice.status.apply(VendorInvoiceAction::Reject)?;

    let updated = state
        .vendor_invoices
        .reject(id, invoice.status, reason.trim().to_string())
        .await?;
    info!(vendor_invoice_id = %id, from = %invoice.status, "vendor invoice rejected");
    Ok(updated)
}

pub async fn reject_vendor_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ReasonRequest>,
) -> Reply<VendorInvoice> {
    user.require(&[Role::Admin])?;
    ok(reject_vendor_invoice_as(&state, id, req.reason, |_| true).await?)
}
