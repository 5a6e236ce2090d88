/// CreatorHub - creator-management dashboard server
///
/// Accounts with a KYC-gated lifecycle, role-based admin tooling with an
/// append-only audit trail, and collaboration features (channels, teams,
/// community, tasks, direct messages with realtime delivery).
mod account;
mod admin;
mod api;
mod audit;
mod auth;
mod authz;
mod config;
mod content;
mod context;
mod db;
mod doc_store;
mod error;
mod jobs;
mod kyc;
mod rate_limit;
mod realtime;
mod server;

use config::ServerConfig;
use context::AppContext;
use error::HubResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> HubResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "creatorhub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let ctx = AppContext::new(config).await?;
    let ctx = Arc::new(ctx);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}
