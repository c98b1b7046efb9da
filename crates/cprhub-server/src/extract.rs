//! Bearer-token authentication and role checks.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use cprhub_auth::AuthContext;
use cprhub_core::models::user::Role;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// The authenticated caller. Extracting it rejects the request with 401
/// unless a valid, unrevoked token for an active user is presented.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::MissingToken)?;

        let ctx = state.auth.authenticate(token).await?;
        Ok(AuthUser(ctx))
    }
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0.user_id
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn is(&self, role: Role) -> bool {
        self.0.role == role
    }

    /// 403 unless the caller holds one of `roles`.
    pub fn require(&self, roles: &[Role]) -> ApiResult<()> {
        if self.0.has_role(roles) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "role {} may not perform this action",
                self.0.role
            )))
        }
    }

    /// Organization of an `organization` role caller.
    pub fn organization_id(&self) -> ApiResult<Uuid> {
        self.0
            .organization_id
            .ok_or_else(|| ApiError::forbidden("account is not linked to an organization"))
    }
}
