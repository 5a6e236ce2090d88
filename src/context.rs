/// Application context and dependency injection
use crate::{
    account::AccountManager,
    admin::{AccountLifecycleManager, RoleManager},
    audit::AuditLogManager,
    config::ServerConfig,
    content::{ChannelManager, CommunityManager, MessageManager, TaskManager, TeamManager},
    db,
    doc_store::DiskDocumentBackend,
    error::HubResult,
    kyc::KycManager,
    rate_limit::{RateLimitConfig, RateLimiter},
    realtime::RealtimeHub,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub account_manager: Arc<AccountManager>,
    pub role_manager: Arc<RoleManager>,
    pub lifecycle_manager: Arc<AccountLifecycleManager>,
    pub audit_log: Arc<AuditLogManager>,
    pub kyc_manager: Arc<KycManager>,
    pub channel_manager: Arc<ChannelManager>,
    pub team_manager: Arc<TeamManager>,
    pub community_manager: Arc<CommunityManager>,
    pub task_manager: Arc<TaskManager>,
    pub message_manager: Arc<MessageManager>,
    pub realtime: RealtimeHub,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> HubResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let config = Arc::new(config);

        let account_manager = Arc::new(AccountManager::new(pool.clone(), Arc::clone(&config)));
        let role_manager = Arc::new(RoleManager::new(pool.clone()));
        let lifecycle_manager = Arc::new(AccountLifecycleManager::new(pool.clone()));
        let audit_log = Arc::new(AuditLogManager::new(pool.clone()));

        let document_backend = Arc::new(DiskDocumentBackend::new(
            config.storage.document_directory.clone(),
        ));
        let kyc_manager = Arc::new(KycManager::new(
            pool.clone(),
            document_backend,
            config.service.document_upload_limit,
        ));

        let realtime = RealtimeHub::new();

        let channel_manager = Arc::new(ChannelManager::new(pool.clone()));
        let team_manager = Arc::new(TeamManager::new(pool.clone()));
        let community_manager = Arc::new(CommunityManager::new(pool.clone()));
        let task_manager = Arc::new(TaskManager::new(pool.clone()));
        let message_manager = Arc::new(MessageManager::new(pool.clone(), realtime.clone()));

        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            authenticated_rps: config.rate_limit.authenticated_rps,
            unauthenticated_rps: config.rate_limit.unauthenticated_rps,
            admin_rps: config.rate_limit.admin_rps,
            burst_size: config.rate_limit.burst_size,
        }));

        Ok(Self {
            config,
            db: pool,
            account_manager,
            role_manager,
            lifecycle_manager,
            audit_log,
            kyc_manager,
            channel_manager,
            team_manager,
            community_manager,
            task_manager,
            message_manager,
            realtime,
            rate_limiter,
        })
    }

    async fn ensure_directories(config: &ServerConfig) -> HubResult<()> {
        tokio::fs::create_dir_all(&config.storage.data_directory).await?;
        tokio::fs::create_dir_all(&config.storage.document_directory).await?;
        Ok(())
    }
}
