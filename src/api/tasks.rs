/// Task endpoints
use crate::{
    auth::AuthContext,
    content::tasks::{NewTask, Task, TaskStatus},
    context::AppContext,
    error::HubResult,
};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks", post(create_task))
        .route("/api/tasks/:id/status", put(update_status))
        .route("/api/tasks/:id", delete(delete_task))
}

async fn list_tasks(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HubResult<Json<Vec<Task>>> {
    let tasks = ctx.task_manager.list_tasks(&auth.user_id).await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(request): Json<NewTask>,
) -> HubResult<Json<Task>> {
    let task = ctx
        .task_manager
        .create_task(&auth.user_id, auth.role, auth.profile.state, request)
        .await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: String,
}

async fn update_status(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(task_id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> HubResult<Json<Task>> {
    let status = TaskStatus::from_str(&request.status)?;
    let task = ctx
        .task_manager
        .update_status(&auth.user_id, &task_id, status)
        .await?;
    Ok(Json(task))
}

async fn delete_task(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(task_id): Path<String>,
) -> HubResult<Json<serde_json::Value>> {
    ctx.task_manager.delete_task(&auth.user_id, &task_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
