/// Background task implementations
use crate::{context::AppContext, error::HubResult};

/// Cleanup expired sessions and refresh tokens
pub async fn cleanup_expired_sessions(ctx: &AppContext) -> HubResult<u64> {
    let (sessions_deleted, refresh_tokens_deleted) =
        ctx.account_manager.cleanup_expired_sessions().await?;

    Ok(sessions_deleted + refresh_tokens_deleted)
}

/// Health check: verify database connectivity
pub async fn health_check(ctx: &AppContext) -> HubResult<()> {
    sqlx::query("SELECT 1").fetch_one(&ctx.db).await?;
    Ok(())
}
