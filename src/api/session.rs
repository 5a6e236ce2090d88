/// Session endpoints: register, login, refresh, logout, session introspection
use crate::{
    account::{LoginRequest, RefreshSessionRequest, RegisterRequest, SessionResponse, UserState},
    auth::AuthContext,
    authz::{self, Capability, Role},
    context::AppContext,
    error::{HubError, HubResult},
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeSet;
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(current_session))
}

/// What the dashboard needs to gate its navigation
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub state: UserState,
    pub role: Role,
    pub capabilities: BTreeSet<Capability>,
}

async fn register(
    State(ctx): State<AppContext>,
    Json(request): Json<RegisterRequest>,
) -> HubResult<Json<SessionResponse>> {
    request
        .validate()
        .map_err(|e| HubError::Validation(e.to_string()))?;

    let profile = ctx
        .account_manager
        .register(&request.email, &request.password, request.full_name)
        .await?;
    let session = ctx.account_manager.create_session(&profile.id).await?;

    tracing::info!(user_id = %profile.id, "Account registered");

    Ok(Json(SessionResponse {
        user_id: profile.id,
        email: profile.email,
        state: profile.state,
        access_token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

async fn login(
    State(ctx): State<AppContext>,
    Json(request): Json<LoginRequest>,
) -> HubResult<Json<SessionResponse>> {
    let (profile, session) = ctx
        .account_manager
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(SessionResponse {
        user_id: profile.id,
        email: profile.email,
        state: profile.state,
        access_token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

async fn refresh(
    State(ctx): State<AppContext>,
    Json(request): Json<RefreshSessionRequest>,
) -> HubResult<Json<SessionResponse>> {
    let session = ctx
        .account_manager
        .refresh_session(&request.refresh_token)
        .await?;
    let profile = ctx.account_manager.get_profile(&session.user_id).await?;

    Ok(Json(SessionResponse {
        user_id: profile.id,
        email: profile.email,
        state: profile.state,
        access_token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

async fn logout(State(ctx): State<AppContext>, auth: AuthContext) -> HubResult<Json<serde_json::Value>> {
    ctx.account_manager
        .delete_session(&auth.session.session_id)
        .await?;

    Ok(Json(serde_json::json!({ "success": true })))
}

async fn current_session(auth: AuthContext) -> Json<SessionInfo> {
    let capabilities = authz::permitted_actions(auth.role, auth.profile.state);

    Json(SessionInfo {
        user_id: auth.user_id,
        email: auth.profile.email,
        full_name: auth.profile.full_name,
        state: auth.profile.state,
        role: auth.role,
        capabilities,
    })
}
