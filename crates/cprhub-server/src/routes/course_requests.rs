//! Course requests, their rosters and attendance.

use axum::extract::State;
use chrono::Utc;
use cprhub_core::error::CprError;
use cprhub_core::models::course_request::{
    CourseRequest, CourseRequestFilter, CourseStatus, CreateCourseRequest,
};
use cprhub_core::models::course_student::CourseStudent;
use cprhub_core::models::user::Role;
use cprhub_core::repository::{
    CourseRequestRepository, CourseStudentRepository, CourseTypeRepository,
    OrganizationRepository, PaginatedResult, UserRepository,
};
use cprhub_core::workflow::{CourseAction, Workflow};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::dto::{
    AttendanceRequest, CancelRequest, ConfirmRequest, CourseListQuery, CourseRequestBody,
    RosterRequest,
};
use crate::envelope::{created, ok, ApiJson, ApiPath, ApiQuery, Created, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

/// Load a course the caller may see. Courses outside the caller's scope
/// are reported as missing.
pub(crate) async fn visible_course(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> ApiResult<CourseRequest> {
    let course = state.courses.get_by_id(id).await?;
    let visible = match user.role() {
        Role::Admin => true,
        Role::Organization => user.0.organization_id == Some(course.organization_id),
        Role::Instructor => course.instructor_id == Some(user.id()),
        _ => false,
    };
    if visible {
        Ok(course)
    } else {
        Err(CprError::not_found("course request", id).into())
    }
}

/// Admins, or the organization that booked the course.
fn require_owner(user: &AuthUser, course: &CourseRequest) -> ApiResult<()> {
    match user.role() {
        Role::Admin => Ok(()),
        Role::Organization if user.0.organization_id == Some(course.organization_id) => Ok(()),
        _ => Err(ApiError::forbidden("only the booking organization or an admin")),
    }
}

/// Admins, or the instructor assigned to the course.
fn require_staff(user: &AuthUser, course: &CourseRequest) -> ApiResult<()> {
    match user.role() {
        Role::Admin => Ok(()),
        Role::Instructor if course.instructor_id == Some(user.id()) => Ok(()),
        _ => Err(ApiError::forbidden("only the assigned instructor or an admin")),
    }
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<CourseListQuery>,
) -> Reply<PaginatedResult<CourseRequest>> {
    user.require(&[Role::Admin, Role::Organization, Role::Instructor])?;

    let mut filter = CourseRequestFilter {
        organization_id: query.organization_id,
        instructor_id: query.instructor_id,
        status: query.status,
    };
    match user.role() {
        Role::Organization => filter.organization_id = Some(user.organization_id()?),
        Role::Instructor => filter.instructor_id = Some(user.id()),
        _ => {}
    }

    ok(state.courses.list(filter, query.pagination()).await?)
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<CourseRequestBody>,
) -> Created<CourseRequest> {
    user.require(&[Role::Admin, Role::Organization])?;

    let organization_id = if user.is(Role::Organization) {
        user.organization_id()?
    } else {
        let id = body
            .organization_id
            .ok_or_else(|| ApiError::validation("organization_id is required"))?;
        state.organizations.get_by_id(id).await?.id
    };

    if body.location.trim().is_empty() {
        return Err(ApiError::validation("location must not be empty"));
    }
    if body.scheduled_date < Utc::now().date_naive() {
        return Err(ApiError::validation("scheduled date must not be in the past"));
    }

    let course_type = state.course_types.get_by_id(body.course_type_id).await?;
    if !course_type.active {
        return Err(ApiError::validation(format!(
            "course type {} is no longer offered",
            course_type.name
        )));
    }
    if body.expected_students == 0 || body.expected_students > course_type.max_students {
        return Err(ApiError::validation(format!(
            "expected students must be between 1 and {}",
            course_type.max_students
        )));
    }

    let course = state
        .courses
        .create(CreateCourseRequest {
            organization_id,
            course_type_id: course_type.id,
            location: body.location.trim().to_string(),
            scheduled_date: body.scheduled_date,
            expected_students: body.expected_students,
            notes: body.notes,
        })
        .await?;
    info!(course_request_id = %course.id, %organization_id, "course requested");
    created(course)
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<CourseRequest> {
    ok(visible_course(&state, &user, id).await?)
}

/// Assign an instructor. On a confirmed course this reassigns it.
pub async fn confirm(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ConfirmRequest>,
) -> Reply<CourseRequest> {
    user.require(&[Role::Admin])?;
    let course = state.courses.get_by_id(id).await?;
    let action = match course.status {
        CourseStatus::Confirmed => CourseAction::Reassign,
        _ => CourseAction::Confirm,
    };
    course.status.apply(action)?;

    let instructor = match state.users.get_by_id(req.instructor_id).await {
        Ok(u) => u,
        Err(CprError::NotFound { .. }) => {
            return Err(ApiError::validation(format!(
                "unknown instructor {}",
                req.instructor_id
            )));
        }
        Err(e) => return Err(e.into()),
    };
    if instructor.role != Role::Instructor || !instructor.is_active() {
        return Err(ApiError::validation(format!(
            "user {} is not an active instructor",
            instructor.id
        )));
    }

    let updated = state
        .courses
        .confirm(id, course.status, instructor.id)
        .await?;
    info!(course_request_id = %id, instructor_id = %instructor.id, %action, "course confirmed");
    ok(updated)
}

pub async fn complete(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<CourseRequest> {
    let course = visible_course(&state, &user, id).await?;
    require_staff(&user, &course)?;
    course.status.apply(CourseAction::Complete)?;

    let updated = state.courses.complete(id).await?;
    info!(course_request_id = %id, "course completed");
    ok(updated)
}

pub async fn cancel(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CancelRequest>,
) -> Reply<CourseRequest> {
    let course = visible_course(&state, &user, id).await?;
    require_owner(&user, &course)?;
    course.status.apply(CourseAction::Cancel)?;

    let updated = state.courses.cancel(id, course.status, req.reason).await?;
    info!(course_request_id = %id, "course cancelled");
    ok(updated)
}

/// Release a completed course to accounting.
pub async fn ready_for_billing(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<CourseRequest> {
    user.require(&[Role::Admin])?;
    let course = state.courses.get_by_id(id).await?;
    if course.status != CourseStatus::Completed {
        return Err(ApiError::conflict(format!(
            "course request {id} is {}, only completed courses can be billed",
            course.status
        )));
    }
    if course.ready_for_billing_at.is_some() || course.invoiced {
        return Err(ApiError::conflict(format!(
            "course request {id} is already released for billing"
        )));
    }

    let updated = state.courses.mark_ready_for_billing(id).await?;
    info!(course_request_id = %id, "course released for billing");
    ok(updated)
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

pub async fn list_students(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<Vec<CourseStudent>> {
    let course = visible_course(&state, &user, id).await?;
    ok(state.students.list(course.id).await?)
}

pub async fn add_students(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RosterRequest>,
) -> Created<Vec<CourseStudent>> {
    let course = visible_course(&state, &user, id).await?;
    require_owner(&user, &course)?;
    if !matches!(course.status, CourseStatus::Pending | CourseStatus::Confirmed) {
        return Err(ApiError::conflict(format!(
            "roster of a {} course cannot change",
            course.status
        )));
    }

    if req.students.is_empty() {
        return Err(ApiError::validation("at least one student is required"));
    }
    for s in &req.students {
        if s.first_name.trim().is_empty() || s.last_name.trim().is_empty() {
            return Err(ApiError::validation("student names must not be empty"));
        }
        if !s.email.contains('@') {
            return Err(ApiError::validation(format!(
                "invalid student email: {}",
                s.email
            )));
        }
    }

    let course_type = state.course_types.get_by_id(course.course_type_id).await?;
    let enrolled = state.students.list(id).await?.len();
    if enrolled + req.students.len() > course_type.max_students as usize {
        return Err(ApiError::validation(format!(
            "course holds at most {} students, {enrolled} already enrolled",
            course_type.max_students
        )));
    }

    created(state.students.add_many(id, req.students).await?)
}

pub async fn mark_attendance(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((id, student_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<AttendanceRequest>,
) -> Reply<CourseStudent> {
    let course = visible_course(&state, &user, id).await?;
    require_staff(&user, &course)?;
    if !matches!(course.status, CourseStatus::Confirmed | CourseStatus::Completed) {
        return Err(ApiError::conflict(format!(
            "attendance cannot be recorded for a {} course",
            course.status
        )));
    }
    if course.invoiced {
        return Err(ApiError::conflict("course has already been invoiced"));
    }

    ok(state
        .students
        .mark_attendance(id, student_id, req.attended)
        .await?)
}

pub async fn remove_student(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath((id, student_id)): ApiPath<(Uuid, Uuid)>,
) -> Reply<Value> {
    let course = visible_course(&state, &user, id).await?;
    require_owner(&user, &course)?;
    if !matches!(course.status, CourseStatus::Pending | CourseStatus::Confirmed) {
        return Err(ApiError::conflict(format!(
            "roster of a {} course cannot change",
            course.status
        )));
    }

    state.students.remove(id, student_id).await?;
    ok(json!({ "removed": student_id }))
}
