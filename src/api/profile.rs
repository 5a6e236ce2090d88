/// Profile settings endpoints
use crate::{
    account::{Profile, UpdateProfileRequest},
    auth::AuthContext,
    context::AppContext,
    error::{HubError, HubResult},
};
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/profile", get(get_profile))
        .route("/api/profile", put(update_profile))
}

async fn get_profile(auth: AuthContext) -> Json<Profile> {
    Json(auth.profile)
}

async fn update_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(request): Json<UpdateProfileRequest>,
) -> HubResult<Json<Profile>> {
    request
        .validate()
        .map_err(|e| HubError::Validation(e.to_string()))?;

    let profile = ctx
        .account_manager
        .update_profile(&auth.user_id, request.full_name, request.avatar_url)
        .await?;

    Ok(Json(profile))
}
