//! Login, logout and the caller's own account.

use axum::extract::State;
use cprhub_auth::LoginInput;
use cprhub_core::models::user::User;
use cprhub_core::repository::UserRepository;
use serde_json::{json, Value};

use crate::dto::{LoginRequest, LoginResponse};
use crate::envelope::{ok, ApiJson, Reply};
use crate::extract::AuthUser;
use crate::state::AppState;

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Reply<LoginResponse> {
    let out = state
        .auth
        .login(LoginInput {
            username_or_email: req.username,
            password: req.password,
        })
        .await?;

    ok(LoginResponse {
        access_token: out.access_token,
        token_type: "Bearer",
        expires_in: out.expires_in,
        user: out.user,
    })
}

pub async fn logout(State(state): State<AppState>, user: AuthUser) -> Reply<Value> {
    state.auth.logout(&user.0).await?;
    ok(json!({ "logged_out": true }))
}

pub async fn me(State(state): State<AppState>, user: AuthUser) -> Reply<User> {
    ok(state.users.get_by_id(user.id()).await?)
}
