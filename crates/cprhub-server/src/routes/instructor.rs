//! Instructor availability

use axum::extract::State;
use chrono::{NaiveDate, Utc};
use cprhub_core::models::availability::InstructorAvailability;
use cprhub_core::models::user::Role;
use cprhub_core::repository::AvailabilityRepository;
use serde_json::{json, Value};

use crate::dto::AvailabilityRequest;
use crate::envelope::{created, ok, ApiJson, ApiPath, Created, Reply};
use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::state::AppState;

/// Own availability from today on.
pub async fn list_availability(
    State(state): State<AppState>,
    user: AuthUser,
) -> Reply<Vec<InstructorAvailability>> {
    user.require(&[Role::Instructor])?;
    let today = Utc::now().date_naive();
    ok(state.availability.list_for_instructor(user.id(), today).await?)
}

pub async fn add_availability(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<AvailabilityRequest>,
) -> Created<InstructorAvailability> {
    user.require(&[Role::Instructor])?;
    if req.date < Utc::now().date_naive() {
        return Err(ApiError::validation("availability date must not be in the past"));
    }
    created(state.availability.add(user.id(), req.date).await?)
}

pub async fn remove_availability(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(date): ApiPath<NaiveDate>,
) -> Reply<Value> {
    user.require(&[Role::Instructor])?;
    state.availability.remove(user.id(), date).await?;
    ok(json!({ "removed": date }))
}
