/// Channel tracking and analytics pass-through endpoints
use crate::{
    auth::AuthContext,
    content::channels::{Channel, ChannelStats, NewChannel, StatsSnapshot},
    context::AppContext,
    error::{HubError, HubResult},
};
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/channels", get(list_channels))
        .route("/api/channels", post(add_channel))
        .route("/api/channels/:id", delete(delete_channel))
        .route("/api/channels/:id/stats", post(record_stats))
        .route("/api/channels/:id/snapshots", get(snapshots))
}

async fn list_channels(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HubResult<Json<Vec<Channel>>> {
    let channels = ctx.channel_manager.list_channels(&auth.user_id).await?;
    Ok(Json(channels))
}

async fn add_channel(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(request): Json<NewChannel>,
) -> HubResult<Json<Channel>> {
    let channel = ctx
        .channel_manager
        .add_channel(&auth.user_id, auth.role, auth.profile.state, request)
        .await?;
    Ok(Json(channel))
}

async fn delete_channel(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(channel_id): Path<String>,
) -> HubResult<Json<serde_json::Value>> {
    ctx.channel_manager
        .delete_channel(&auth.user_id, auth.role, auth.profile.state, &channel_id)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn record_stats(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(channel_id): Path<String>,
    Json(stats): Json<ChannelStats>,
) -> HubResult<Json<Channel>> {
    let channel = ctx
        .channel_manager
        .record_stats(&auth.user_id, auth.role, auth.profile.state, &channel_id, stats)
        .await?;
    Ok(Json(channel))
}

#[derive(Debug, Deserialize)]
struct SnapshotQuery {
    limit: Option<i64>,
}

async fn snapshots(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(channel_id): Path<String>,
    Query(query): Query<SnapshotQuery>,
) -> HubResult<Json<Vec<StatsSnapshot>>> {
    let limit = query.limit.unwrap_or(90);
    if !(1..=365).contains(&limit) {
        return Err(HubError::Validation(
            "limit must be between 1 and 365".to_string(),
        ));
    }

    let snapshots = ctx
        .channel_manager
        .snapshots(&auth.user_id, &channel_id, limit)
        .await?;
    Ok(Json(snapshots))
}
