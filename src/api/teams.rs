/// Team endpoints
use crate::{
    auth::AuthContext,
    content::teams::{NewTeam, Team, TeamMember},
    context::AppContext,
    error::HubResult,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/teams", get(list_teams))
        .route("/api/teams", post(create_team))
        .route("/api/teams/:id", delete(delete_team))
        .route("/api/teams/:id/members", get(members))
        .route("/api/teams/:id/members", post(add_member))
        .route("/api/teams/:id/members/:user_id", delete(remove_member))
}

async fn list_teams(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HubResult<Json<Vec<Team>>> {
    let teams = ctx.team_manager.list_teams(&auth.user_id).await?;
    Ok(Json(teams))
}

async fn create_team(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(request): Json<NewTeam>,
) -> HubResult<Json<Team>> {
    let team = ctx
        .team_manager
        .create_team(&auth.user_id, auth.role, auth.profile.state, request)
        .await?;
    Ok(Json(team))
}

async fn delete_team(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(team_id): Path<String>,
) -> HubResult<Json<serde_json::Value>> {
    ctx.team_manager
        .delete_team(&auth.user_id, auth.role, auth.profile.state, &team_id)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn members(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(team_id): Path<String>,
) -> HubResult<Json<Vec<TeamMember>>> {
    let members = ctx.team_manager.members(&auth.user_id, &team_id).await?;
    Ok(Json(members))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddMemberRequest {
    user_id: String,
    role: Option<String>,
}

async fn add_member(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(team_id): Path<String>,
    Json(request): Json<AddMemberRequest>,
) -> HubResult<Json<TeamMember>> {
    let member_role = request.role.as_deref().unwrap_or("editor");
    let member = ctx
        .team_manager
        .add_member(
            &auth.user_id,
            auth.role,
            auth.profile.state,
            &team_id,
            &request.user_id,
            member_role,
        )
        .await?;
    Ok(Json(member))
}

async fn remove_member(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((team_id, user_id)): Path<(String, String)>,
) -> HubResult<Json<serde_json::Value>> {
    ctx.team_manager
        .remove_member(&auth.user_id, auth.role, auth.profile.state, &team_id, &user_id)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
