/// Community discussion endpoints
use crate::{
    auth::AuthContext,
    content::community::{Discussion, DiscussionReply, NewDiscussion},
    context::AppContext,
    error::{HubError, HubResult},
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/discussions", get(list_discussions))
        .route("/api/discussions", post(create_discussion))
        .route("/api/discussions/:id", get(get_discussion))
        .route("/api/discussions/:id/replies", post(add_reply))
        .route("/api/discussions/:id/pin", post(set_pinned))
        .route("/api/discussions/:id/lock", post(set_locked))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    category: Option<String>,
    limit: Option<i64>,
}

async fn list_discussions(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Query(query): Query<ListQuery>,
) -> HubResult<Json<Vec<Discussion>>> {
    let limit = query.limit.unwrap_or(50);
    if !(1..=200).contains(&limit) {
        return Err(HubError::Validation(
            "limit must be between 1 and 200".to_string(),
        ));
    }

    let discussions = ctx
        .community_manager
        .list_discussions(query.category.as_deref(), limit)
        .await?;
    Ok(Json(discussions))
}

async fn create_discussion(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(request): Json<NewDiscussion>,
) -> HubResult<Json<Discussion>> {
    let discussion = ctx
        .community_manager
        .create_discussion(&auth.user_id, auth.role, auth.profile.state, request)
        .await?;
    Ok(Json(discussion))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscussionDetail {
    discussion: Discussion,
    replies: Vec<DiscussionReply>,
}

async fn get_discussion(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Path(discussion_id): Path<String>,
) -> HubResult<Json<DiscussionDetail>> {
    let discussion = ctx.community_manager.get_discussion(&discussion_id).await?;
    let replies = ctx.community_manager.list_replies(&discussion_id).await?;

    Ok(Json(DiscussionDetail {
        discussion,
        replies,
    }))
}

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    content: String,
}

async fn add_reply(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(discussion_id): Path<String>,
    Json(request): Json<ReplyRequest>,
) -> HubResult<Json<DiscussionReply>> {
    let reply = ctx
        .community_manager
        .add_reply(
            &auth.user_id,
            auth.role,
            auth.profile.state,
            &discussion_id,
            &request.content,
        )
        .await?;
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
struct PinRequest {
    pinned: bool,
}

async fn set_pinned(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(discussion_id): Path<String>,
    Json(request): Json<PinRequest>,
) -> HubResult<Json<serde_json::Value>> {
    ctx.community_manager
        .set_pinned(auth.role, auth.profile.state, &discussion_id, request.pinned)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
struct LockRequest {
    locked: bool,
}

async fn set_locked(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(discussion_id): Path<String>,
    Json(request): Json<LockRequest>,
) -> HubResult<Json<serde_json::Value>> {
    ctx.community_manager
        .set_locked(auth.role, auth.profile.state, &discussion_id, request.locked)
        .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
