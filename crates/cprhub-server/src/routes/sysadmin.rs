//! System administration: accounts, organizations, runtime
//! configuration and token housekeeping.

use axum::extract::State;
use cprhub_core::error::CprError;
use cprhub_core::models::configuration::{self, SystemConfiguration, UpsertConfiguration};
use cprhub_core::models::organization::{CreateOrganization, Organization, UpdateOrganization};
use cprhub_core::models::user::{CreateUser, Role, UpdateUser, User, UserFilter, UserStatus};
use cprhub_core::repository::{
    ConfigurationRepository, OrganizationRepository, PaginatedResult, Pagination, UserRepository,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::dto::{
    CategoryQuery, CleanupResponse, ConfigurationBody, PageQuery, UpdateUserBody, UserListQuery,
};
use crate::envelope::{created, ok, ApiJson, ApiPath, ApiQuery, Created, Reply};
use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

const SYSADMIN: &[Role] = &[Role::Sysadmin];

/// Organization-role accounts must be linked to an existing organization.
async fn check_organization_link(
    state: &AppState,
    role: Role,
    organization_id: Option<Uuid>,
) -> ApiResult<()> {
    match (role, organization_id) {
        (Role::Organization, None) => Err(ApiError::validation(
            "organization users must reference an organization",
        )),
        (_, Some(id)) => match state.organizations.get_by_id(id).await {
            Ok(_) => Ok(()),
            Err(CprError::NotFound { .. }) => {
                Err(ApiError::validation(format!("unknown organization {id}")))
            }
            Err(e) => Err(e.into()),
        },
        (_, None) => Ok(()),
    }
}

fn check_email(email: &str) -> ApiResult<()> {
    if email.contains('@') {
        Ok(())
    } else {
        Err(ApiError::validation(format!("invalid email address: {email}")))
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> Reply<PaginatedResult<User>> {
    user.require(SYSADMIN)?;
    let filter = UserFilter {
        role: query.role,
        status: query.status,
    };
    let pagination = Pagination::from_query(query.offset, query.limit);
    ok(state.users.list(filter, pagination).await?)
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(mut input): ApiJson<CreateUser>,
) -> Created<User> {
    user.require(SYSADMIN)?;
    input.username = input.username.trim().to_string();
    input.email = input.email.trim().to_string();
    if input.username.is_empty() {
        return Err(ApiError::validation("username must not be empty"));
    }
    check_email(&input.email)?;
    state.auth.check_password(&input.password)?;
    check_organization_link(&state, input.role, input.organization_id).await?;

    let created_user = state.users.create(input).await?;
    info!(user_id = %created_user.id, role = %created_user.role, "user created");
    created(created_user)
}

pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateUserBody>,
) -> Reply<User> {
    user.require(SYSADMIN)?;
    let existing = state.users.get_by_id(id).await?;

    if id == user.id() && body.status == Some(UserStatus::Inactive) {
        return Err(ApiError::validation("you cannot deactivate your own account"));
    }
    if let Some(email) = &body.email {
        check_email(email)?;
    }
    if let Some(password) = &body.password {
        state.auth.check_password(password)?;
    }
    let role = body.role.unwrap_or(existing.role);
    let organization_id = body.organization_id.unwrap_or(existing.organization_id);
    check_organization_link(&state, role, organization_id).await?;

    let updated = state
        .users
        .update(
            id,
            UpdateUser {
                email: body.email,
                full_name: body.full_name,
                phone: body.phone,
                role: body.role,
                status: body.status,
                organization_id: body.organization_id,
            },
        )
        .await?;
    if let Some(password) = body.password {
        state.users.set_password(id, &password).await?;
        info!(user_id = %id, "password reset");
    }
    info!(user_id = %id, "user updated");
    ok(updated)
}

/// Deactivate an account. Users are never removed.
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Reply<Value> {
    user.require(SYSADMIN)?;
    if id == user.id() {
        return Err(ApiError::validation("you cannot deactivate your own account"));
    }
    state.users.delete(id).await?;
    info!(user_id = %id, "user deactivated");
    ok(json!({ "deactivated": id }))
}

// ---------------------------------------------------------------------------
// Organizations
// ---------------------------------------------------------------------------

pub async fn list_organizations(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Reply<PaginatedResult<Organization>> {
    user.require(SYSADMIN)?;
    let pagination = Pagination::from_query(query.offset, query.limit);
    ok(state.organizations.list(pagination).await?)
}

pub async fn create_organization(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(mut input): ApiJson<CreateOrganization>,
) -> Created<Organization> {
    user.require(SYSADMIN)?;
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(ApiError::validation("organization name must not be empty"));
    }
    check_email(&input.contact_email)?;

    let organization = state.organizations.create(input).await?;
    info!(organization_id = %organization.id, "organization created");
    created(organization)
}

pub async fn update_organization(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(mut input): ApiJson<UpdateOrganization>,
) -> Reply<Organization> {
    user.require(SYSADMIN)?;
    if let Some(name) = input.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::validation("organization name must not be empty"));
        }
    }
    if let Some(email) = &input.contact_email {
        check_email(email)?;
    }
    ok(state.organizations.update(id, input).await?)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub async fn list_configurations(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Reply<Vec<SystemConfiguration>> {
    user.require(SYSADMIN)?;
    ok(state.configuration.list(query.category).await?)
}

pub async fn get_configuration(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(key): ApiPath<String>,
) -> Reply<SystemConfiguration> {
    user.require(SYSADMIN)?;
    ok(state.configuration.get(&key).await?)
}

pub async fn put_configuration(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(key): ApiPath<String>,
    ApiJson(body): ApiJson<ConfigurationBody>,
) -> Reply<SystemConfiguration> {
    user.require(SYSADMIN)?;
    configuration::validate_key(&key)?;

    let entry = state
        .configuration
        .upsert(UpsertConfiguration {
            category: configuration::category_of(&key).to_string(),
            key,
            value: body.value.trim().to_string(),
            description: body.description,
            updated_by: Some(user.id()),
        })
        .await?;
    info!(key = %entry.key, "configuration updated");
    ok(entry)
}

pub async fn delete_configuration(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(key): ApiPath<String>,
) -> Reply<Value> {
    user.require(SYSADMIN)?;
    state.configuration.delete(&key).await?;
    info!(%key, "configuration deleted");
    ok(json!({ "deleted": key }))
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub async fn cleanup_token_blacklist(
    State(state): State<AppState>,
    user: AuthUser,
) -> Reply<CleanupResponse> {
    user.require(SYSADMIN)?;
    let removed = state.auth.cleanup_expired().await?;
    info!(removed, "token blacklist cleaned up");
    ok(CleanupResponse { removed })
}
