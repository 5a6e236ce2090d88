/// Dashboard overview endpoint
use crate::{
    account::UserState,
    auth::AuthContext,
    authz::{self, Capability},
    context::AppContext,
    error::HubResult,
    kyc::KycDecision,
};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/dashboard/overview", get(overview))
}

/// Counters and status for the landing page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardOverview {
    state: UserState,
    kyc_decision: Option<KycDecision>,
    can_submit_kyc: bool,
    is_admin: bool,
    channel_count: usize,
    team_count: usize,
    open_task_count: usize,
    unread_message_count: i64,
}

async fn overview(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HubResult<Json<DashboardOverview>> {
    let capabilities = authz::permitted_actions(auth.role, auth.profile.state);

    let verification = ctx.kyc_manager.latest_verification(&auth.user_id).await?;
    let channels = ctx.channel_manager.list_channels(&auth.user_id).await?;
    let teams = ctx.team_manager.list_teams(&auth.user_id).await?;
    let tasks = ctx.task_manager.list_tasks(&auth.user_id).await?;
    let unread = ctx.message_manager.unread_count(&auth.user_id).await?;

    let open_tasks = tasks
        .iter()
        .filter(|t| t.status != crate::content::tasks::TaskStatus::Done)
        .count();

    Ok(Json(DashboardOverview {
        state: auth.profile.state,
        kyc_decision: verification.map(|v| v.decision),
        can_submit_kyc: capabilities.contains(&Capability::SubmitKyc),
        is_admin: capabilities.contains(&Capability::AccessAdminPanel),
        channel_count: channels.len(),
        team_count: teams.len(),
        open_task_count: open_tasks,
        unread_message_count: unread,
    }))
}
