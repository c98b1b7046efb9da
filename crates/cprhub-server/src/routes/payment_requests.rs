//! Instructor payment requests.

use axum::extract::State;
use cprhub_core::error::CprError;
use cprhub_core::models::payment_request::{PaymentRequest, PaymentRequestFilter};
use cprhub_core::models::user::Role;
use cprhub_core::repository::{PaginatedResult, PaymentRequestRepository, TimesheetRepository};
use cprhub_core::workflow::{PaymentRequestAction, Workflow};
use tracing::{info, warn};
use uuid::Uuid;

use crate::dto::{NotesRequest, PayRequest, PaymentRequestListQuery};
use crate::envelope::{ok, ApiJson, ApiPath, ApiQuery, Reply};
use crate::extract::AuthUser;
use crate::routes::timesheets::payment_request_for;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<PaymentRequestListQuery>,
) -> Reply<PaginatedResult<PaymentRequest>> {
    user.require(&[Role::Accountant, Role::Hr, Role::Instructor])?;
    let instructor_id = if user.is(Role::Instructor) {
        Some(user.id())
    } else {
        query.instructor_id
    };
    let filter = PaymentRequestFilter {
        instructor_id,
        status: query.status,
    };
    ok(state
        .payment_requests
        .list(filter, query.pagination())
        .await?)
}

pub async fn approve(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<PaymentRequest> {
    user.require(&[Role::Accountant])?;
    let request = state.payment_requests.get_by_id(id).await?;
    request.status.apply(PaymentRequestAction::Approve)?;

    let approved = state.payment_requests.approve(id, user.id()).await?;
    info!(payment_request_id = %id, "payment request approved");
    ok(approved)
}

pub async fn reject(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<NotesRequest>,
) -> Reply<PaymentRequest> {
    user.require(&[Role::Accountant])?;
    let request = state.payment_requests.get_by_id(id).await?;
    request.status.apply(PaymentRequestAction::Reject)?;

    let rejected = state
        .payment_requests
        .reject(id, request.status, user.id(), req.notes)
        .await?;
    info!(payment_request_id = %id, "payment request rejected");
    ok(rejected)
}

pub async fn pay(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<PayRequest>,
) -> Reply<PaymentRequest> {
    user.require(&[Role::Accountant])?;
    let request = state.payment_requests.get_by_id(id).await?;
    request.status.apply(PaymentRequestAction::Pay)?;

    let paid = state
        .payment_requests
        .pay(id, user.id(), req.reference)
        .await?;
    info!(payment_request_id = %id, amount_cents = paid.amount_cents, "payment request paid");
    ok(paid)
}

/// Create the missing payment request of every approved timesheet that
/// has none.
pub async fn reconcile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Reply<Vec<PaymentRequest>> {
    user.require(&[Role::Hr, Role::Sysadmin])?;
    let orphans = state.timesheets.approved_without_payment_request().await?;
    if orphans.is_empty() {
        return ok(Vec::new());
    }

    let rates = state.payroll_rates().await?;
    let mut created = Vec::with_capacity(orphans.len());
    for timesheet in &orphans {
        match state
            .payment_requests
            .create(payment_request_for(timesheet, &rates))
            .await
        {
            Ok(request) => created.push(request),
            // Created concurrently since the scan.
            Err(CprError::AlreadyExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }
    warn!(
        found = orphans.len(),
        created = created.len(),
        "reconciled approved timesheets without payment requests"
    );
    ok(created)
}
