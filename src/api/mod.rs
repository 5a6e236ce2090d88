/// API routes and handlers
pub mod admin;
pub mod channels;
pub mod community;
pub mod dashboard;
pub mod kyc;
pub mod messages;
pub mod middleware;
pub mod profile;
pub mod session;
pub mod tasks;
pub mod teams;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(session::routes())
        .merge(profile::routes())
        .merge(kyc::routes())
        .merge(admin::routes())
        .merge(dashboard::routes())
        .merge(channels::routes())
        .merge(teams::routes())
        .merge(community::routes())
        .merge(tasks::routes())
        .merge(messages::routes())
}
