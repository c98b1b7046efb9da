//! Profile change requests filed by users and reviewed by HR.

use axum::extract::State;
use cprhub_core::models::profile_change::{
    CreateProfileChange, ProfileChangeRequest, ProfileField,
};
use cprhub_core::models::user::{Role, User};
use cprhub_core::repository::{ProfileChangeRepository, UserRepository};
use cprhub_core::workflow::{ProfileChangeAction, Workflow};
use tracing::info;
use uuid::Uuid;

use crate::dto::{CommentRequest, ProfileChangeBody, ProfileChangeListQuery};
use crate::envelope::{created, ok, ApiJson, ApiPath, ApiQuery, Created, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

fn current_value(user: &User, field: ProfileField) -> Option<String> {
    match field {
        ProfileField::Email => Some(user.email.clone()),
        ProfileField::FullName => Some(user.full_name.clone()),
        ProfileField::Phone => user.phone.clone(),
    }
}

fn check_value(field: ProfileField, value: &str) -> ApiResult<()> {
    match field {
        ProfileField::Email if !value.contains('@') => {
            Err(ApiError::validation(format!("invalid email address: {value}")))
        }
        ProfileField::FullName if value.is_empty() => {
            Err(ApiError::validation("full name must not be empty"))
        }
        _ => Ok(()),
    }
}

pub async fn list_own(
    State(state): State<AppState>,
    user: AuthUser,
) -> Reply<Vec<ProfileChangeRequest>> {
    ok(state.profile_changes.list_for_user(user.id()).await?)
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(body): ApiJson<ProfileChangeBody>,
) -> Created<ProfileChangeRequest> {
    let new_value = body.new_value.trim().to_string();
    check_value(body.field, &new_value)?;

    let current = state.users.get_by_id(user.id()).await?;
    let old_value = current_value(&current, body.field);
    if old_value.as_deref() == Some(new_value.as_str()) {
        return Err(ApiError::validation(format!(
            "{} is already {new_value}",
            body.field
        )));
    }

    let request = state
        .profile_changes
        .create(CreateProfileChange {
            user_id: current.id,
            field: body.field,
            old_value,
            new_value,
        })
        .await?;
    info!(profile_change_id = %request.id, user_id = %current.id, field = %body.field, "profile change requested");
    created(request)
}

pub async fn list_for_review(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ProfileChangeListQuery>,
) -> Reply<Vec<ProfileChangeRequest>> {
    user.require(&[Role::Hr])?;
    ok(state.profile_changes.list(query.status).await?)
}

pub async fn approve(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Reply<ProfileChangeRequest> {
    user.require(&[Role::Hr])?;
    let request = state.profile_changes.get_by_id(id).await?;
    request.status.apply(ProfileChangeAction::Approve)?;

    let approved = state
        .profile_changes
        .approve(id, user.id(), req.comment)
        .await?;
    info!(profile_change_id = %id, user_id = %approved.user_id, "profile change approved");
    ok(approved)
}

pub async fn reject(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Reply<ProfileChangeRequest> {
    user.require(&[Role::Hr])?;
    let request = state.profile_changes.get_by_id(id).await?;
    request.status.apply(ProfileChangeAction::Reject)?;

    let rejected = state
        .profile_changes
        .reject(id, user.id(), req.comment)
        .await?;
    info!(profile_change_id = %id, "profile change rejected");
    ok(rejected)
}
