//! Authentication service: login, request authentication and logout.

use chrono::{DateTime, Utc};
use cprhub_core::error::{CprError, CprResult};
use cprhub_core::models::user::{Role, User};
use cprhub_core::repository::{TokenBlacklistRepository, UserRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub user: User,
}

/// Identity of an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub organization_id: Option<Uuid>,
    /// Hash of the presented token, used for logout.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

/// Authentication service.
///
/// Generic over repository implementations so that the auth layer
/// has no dependency on the database crate.
pub struct AuthService<U: UserRepository, B: TokenBlacklistRepository> {
    user_repo: U,
    blacklist_repo: B,
    config: AuthConfig,
}

impl<U: UserRepository, B: TokenBlacklistRepository> AuthService<U, B> {
    pub fn new(user_repo: U, blacklist_repo: B, config: AuthConfig) -> Self {
        Self {
            user_repo,
            blacklist_repo,
            config,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate a user with username/email + password and issue an
    /// access token.
    pub async fn login(&self, input: LoginInput) -> CprResult<LoginOutput> {
        // Username first, then email.
        let user = match self
            .user_repo
            .get_by_username(&input.username_or_email)
            .await
        {
            Ok(u) => u,
            Err(CprError::NotFound { .. }) => self
                .user_repo
                .get_by_email(&input.username_or_email)
                .await
                .map_err(|e| match e {
                    CprError::NotFound { .. } => {
                        warn!(login = %input.username_or_email, "login for unknown account");
                        AuthError::InvalidCredentials.into()
                    }
                    other => other,
                })?,
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        if !user.is_active() {
            warn!(user_id = %user.id, "login to inactive account");
            return Err(AuthError::AccountInactive.into());
        }

        let access_token = token::issue_access_token(&user, &self.config)?;
        info!(user_id = %user.id, role = %user.role, "user logged in");

        Ok(LoginOutput {
            access_token,
            expires_in: self.config.access_token_lifetime_secs,
            user,
        })
    }

    /// Resolve a bearer token into the caller's identity.
    ///
    /// The role and organization come from the stored user, so changes
    /// made by a sysadmin apply to tokens already issued.
    pub async fn authenticate(&self, raw_token: &str) -> CprResult<AuthContext> {
        let claims = token::decode_access_token(raw_token, &self.config)?;

        let token_hash = token::hash_token(raw_token);
        if self.blacklist_repo.is_blacklisted(&token_hash).await? {
            return Err(AuthError::TokenRevoked.into());
        }

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| AuthError::TokenInvalid(format!("bad subject: {e}")))?;
        let user = match self.user_repo.get_by_id(user_id).await {
            Ok(u) => u,
            Err(CprError::NotFound { .. }) => {
                return Err(AuthError::TokenInvalid("unknown subject".into()).into());
            }
            Err(e) => return Err(e),
        };
        if !user.is_active() {
            return Err(AuthError::AccountInactive.into());
        }

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::TokenInvalid("bad expiry".into()))?;

        Ok(AuthContext {
            user_id: user.id,
            role: user.role,
            organization_id: user.organization_id,
            token_hash,
            expires_at,
        })
    }

    /// Invalidate the caller's token until it would have expired anyway.
    pub async fn logout(&self, ctx: &AuthContext) -> CprResult<()> {
        self.blacklist_repo
            .add(&ctx.token_hash, ctx.user_id, ctx.expires_at)
            .await?;
        info!(user_id = %ctx.user_id, "user logged out");
        Ok(())
    }

    /// Drop blacklist rows for tokens that have expired.
    pub async fn cleanup_expired(&self) -> CprResult<u64> {
        let removed = self.blacklist_repo.cleanup_expired().await?;
        if removed > 0 {
            info!(removed, "expired blacklist entries removed");
        }
        Ok(removed)
    }

    /// Enforce the configured password policy.
    pub fn check_password(&self, password: &str) -> CprResult<()> {
        password::check_policy(password, self.config.min_password_length)?;
        Ok(())
    }
}
