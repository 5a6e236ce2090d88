/// Admin panel endpoints
use crate::{
    account::UserState,
    auth::AdminAuthContext,
    authz::Role,
    context::AppContext,
    error::{HubError, HubResult},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id/state", post(set_user_state))
        .route("/api/admin/users/:id/role", post(set_user_role))
        .route("/api/admin/kyc/pending", get(pending_verifications))
        .route("/api/admin/audit", get(audit_log))
}

/// A user row in the admin panel: profile joined with its role
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminUserRow {
    id: String,
    email: String,
    full_name: Option<String>,
    state: UserState,
    role: Role,
    created_at: DateTime<Utc>,
}

async fn list_users(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
) -> HubResult<Json<Vec<AdminUserRow>>> {
    let profiles = ctx.account_manager.list_profiles().await?;
    let assignments = ctx.role_manager.list_assignments().await?;

    let roles: HashMap<String, Role> = assignments
        .into_iter()
        .map(|a| (a.user_id, a.role))
        .collect();

    let rows = profiles
        .into_iter()
        .map(|p| AdminUserRow {
            role: roles.get(&p.id).copied().unwrap_or(Role::User),
            id: p.id,
            email: p.email,
            full_name: p.full_name,
            state: p.state,
            created_at: p.created_at,
        })
        .collect();

    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct SetStateRequest {
    state: String,
    reason: Option<String>,
}

async fn set_user_state(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(user_id): Path<String>,
    Json(request): Json<SetStateRequest>,
) -> HubResult<Json<crate::admin::StateChangeOutcome>> {
    let target = UserState::from_str(&request.state)?;

    let outcome = ctx
        .lifecycle_manager
        .set_account_state(
            &admin.auth.user_id,
            admin.auth.role,
            admin.auth.profile.state,
            &user_id,
            target,
            request.reason.as_deref(),
        )
        .await?;

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct SetRoleRequest {
    role: String,
}

async fn set_user_role(
    State(ctx): State<AppContext>,
    admin: AdminAuthContext,
    Path(user_id): Path<String>,
    Json(request): Json<SetRoleRequest>,
) -> HubResult<Json<crate::admin::RoleChangeOutcome>> {
    let new_role = Role::from_str(&request.role)?;

    let outcome = ctx
        .role_manager
        .set_role(
            &admin.auth.user_id,
            admin.auth.role,
            admin.auth.profile.state,
            &user_id,
            new_role,
        )
        .await?;

    Ok(Json(outcome))
}

async fn pending_verifications(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
) -> HubResult<Json<Vec<crate::kyc::PendingVerification>>> {
    let pending = ctx.kyc_manager.pending_verifications().await?;
    Ok(Json(pending))
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    limit: Option<i64>,
}

async fn audit_log(
    State(ctx): State<AppContext>,
    _admin: AdminAuthContext,
    Query(query): Query<AuditQuery>,
) -> HubResult<Json<Vec<crate::audit::AuditEntry>>> {
    let limit = query.limit.unwrap_or(100);
    if !(1..=1000).contains(&limit) {
        return Err(HubError::Validation(
            "limit must be between 1 and 1000".to_string(),
        ));
    }

    let entries = ctx.audit_log.list_recent(limit).await?;
    Ok(Json(entries))
}
