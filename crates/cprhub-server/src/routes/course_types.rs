//! Course catalog

use axum::extract::State;
use cprhub_core::models::course_type::{CourseType, CreateCourseType, UpdateCourseType};
use cprhub_core::models::user::Role;
use cprhub_core::repository::CourseTypeRepository;
use uuid::Uuid;

use crate::dto::ActiveQuery;
use crate::envelope::{created, ok, ApiJson, ApiPath, ApiQuery, Created, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

const MANAGERS: &[Role] = &[Role::Admin, Role::Sysadmin];

fn check(name: Option<&str>, price: Option<i64>, max_students: Option<u32>) -> ApiResult<()> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::validation("name must not be empty"));
    }
    if price.is_some_and(|p| p < 0) {
        return Err(ApiError::validation("price per student must not be negative"));
    }
    if max_students == Some(0) {
        return Err(ApiError::validation("max students must be at least 1"));
    }
    Ok(())
}

/// Active course types; managers may ask for inactive ones too.
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ActiveQuery>,
) -> Reply<Vec<CourseType>> {
    let active_only = !(query.include_inactive && user.0.has_role(MANAGERS));
    ok(state.course_types.list(active_only).await?)
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<CreateCourseType>,
) -> Created<CourseType> {
    user.require(MANAGERS)?;
    check(
        Some(&input.name),
        Some(input.price_per_student_cents),
        Some(input.max_students),
    )?;
    created(state.course_types.create(input).await?)
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateCourseType>,
) -> Reply<CourseType> {
    user.require(MANAGERS)?;
    check(
        input.name.as_deref(),
        input.price_per_student_cents,
        input.max_students,
    )?;
    ok(state.course_types.update(id, input).await?)
}

/// Course types are deactivated, never removed; past bookings refer to them.
pub async fn deactivate(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<CourseType> {
    user.require(MANAGERS)?;
    let input = UpdateCourseType {
        active: Some(false),
        ..Default::default()
    };
    ok(state.course_types.update(id, input).await?)
}
