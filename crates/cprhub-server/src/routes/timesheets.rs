//! Weekly instructor timesheets and their HR review.

use axum::extract::State;
use chrono::{NaiveDate, Utc};
use cprhub_core::billing;
use cprhub_core::error::CprError;
use cprhub_core::models::configuration::PayrollRates;
use cprhub_core::models::payment_request::{CreatePaymentRequest, PaymentRequest};
use cprhub_core::models::timesheet::{
    CreateTimesheet, Timesheet, TimesheetFilter, TimesheetStatus, UpdateTimesheet,
};
use cprhub_core::models::user::Role;
use cprhub_core::repository::{PaginatedResult, TimesheetRepository};
use cprhub_core::workflow::{TimesheetAction, Workflow};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::dto::{CommentRequest, TimesheetBody, TimesheetListQuery};
use crate::envelope::{created, ok, ApiJson, ApiPath, ApiQuery, Created, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

const MAX_WEEKLY_HOURS: f64 = 168.0;

fn check_week(week_start_date: NaiveDate) -> ApiResult<()> {
    if !billing::is_week_start(week_start_date) {
        return Err(ApiError::validation("week start date must be a Monday"));
    }
    if week_start_date > Utc::now().date_naive() {
        return Err(ApiError::validation("week start date must not be in the future"));
    }
    Ok(())
}

fn check_hours(hours: f64) -> ApiResult<()> {
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_WEEKLY_HOURS {
        return Err(ApiError::validation(format!(
            "hours must be greater than 0 and at most {MAX_WEEKLY_HOURS}"
        )));
    }
    Ok(())
}

/// Payment request owed for an approved timesheet.
pub(crate) fn payment_request_for(timesheet: &Timesheet, rates: &PayrollRates) -> CreatePaymentRequest {
    CreatePaymentRequest {
        instructor_id: timesheet.instructor_id,
        timesheet_id: timesheet.id,
        amount_cents: billing::instructor_pay_cents(
            timesheet.hours,
            timesheet.courses_taught,
            rates,
        ),
        notes: Some(format!("week of {}", timesheet.week_start_date)),
    }
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<TimesheetListQuery>,
) -> Reply<PaginatedResult<Timesheet>> {
    user.require(&[Role::Instructor, Role::Hr])?;
    let instructor_id = if user.is(Role::Instructor) {
        Some(user.id())
    } else {
        query.instructor_id
    };
    let filter = TimesheetFilter {
        instructor_id,
        status: query.status,
    };
    ok(state.timesheets.list(filter, query.pagination()).await?)
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<TimesheetBody>,
) -> Created<Timesheet> {
    user.require(&[Role::Instructor])?;
    check_week(body.week_start_date)?;
    check_hours(body.hours)?;

    let timesheet = state
        .timesheets
        .create(CreateTimesheet {
            instructor_id: user.id(),
            week_start_date: body.week_start_date,
            hours: body.hours,
            courses_taught: body.courses_taught,
            notes: body.notes,
        })
        .await?;
    info!(timesheet_id = %timesheet.id, instructor_id = %timesheet.instructor_id, "timesheet submitted");
    created(timesheet)
}

/// Edit a pending or rejected timesheet. A rejected one goes back to
/// pending.
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateTimesheet>,
) -> Reply<Timesheet> {
    user.require(&[Role::Instructor])?;
    let timesheet = state.timesheets.get_by_id(id).await?;
    if timesheet.instructor_id != user.id() {
        return Err(CprError::not_found("timesheet", id).into());
    }
    match timesheet.status {
        TimesheetStatus::Pending => {}
        TimesheetStatus::Rejected => {
            timesheet.status.apply(TimesheetAction::Resubmit)?;
        }
        TimesheetStatus::Approved => {
            return Err(ApiError::conflict("approved timesheets cannot be edited"));
        }
    }
    if let Some(hours) = input.hours {
        check_hours(hours)?;
    }

    ok(state.timesheets.update(id, timesheet.status, input).await?)
}

#[derive(Debug, Serialize)]
pub struct ApprovedTimesheet {
    pub timesheet: Timesheet,
    pub payment_request: PaymentRequest,
}

pub async fn approve(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Reply<ApprovedTimesheet> {
    user.require(&[Role::Hr])?;
    let timesheet = state.timesheets.get_by_id(id).await?;
    timesheet.status.apply(TimesheetAction::Approve)?;

    let rates = state.payroll_rates().await?;
    let payment = payment_request_for(&timesheet, &rates);
    let (timesheet, payment_request) = state
        .timesheets
        .approve(id, user.id(), req.comment, payment)
        .await?;
    info!(
        timesheet_id = %id,
        payment_request_id = %payment_request.id,
        amount_cents = payment_request.amount_cents,
        "timesheet approved"
    );
    ok(ApprovedTimesheet {
        timesheet,
        payment_request,
    })
}

pub async fn reject(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Reply<Timesheet> {
    user.require(&[Role::Hr])?;
    let timesheet = state.timesheets.get_by_id(id).await?;
    timesheet.status.apply(TimesheetAction::Reject)?;

    let rejected = state.timesheets.reject(id, user.id(), req.comment).await?;
    info!(timesheet_id = %id, "timesheet rejected");
    ok(rejected)
}
