/// Configuration management for the CreatorHub server
use crate::error::{HubError, HubResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    pub document_upload_limit: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub document_directory: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub access_token_ttl: i64,
    /// Refresh token lifetime in seconds
    pub refresh_token_ttl: i64,
    /// Emails treated as admins regardless of user_roles rows (bootstrap)
    pub admin_emails: Vec<String>,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
    pub admin_rps: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> HubResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("HUB_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("HUB_PORT")
            .unwrap_or_else(|_| "8700".to_string())
            .parse()
            .map_err(|_| HubError::Validation("Invalid port number".to_string()))?;
        let version = env::var("HUB_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let document_upload_limit = env::var("HUB_DOCUMENT_UPLOAD_LIMIT")
            .unwrap_or_else(|_| "10485760".to_string())
            .parse()
            .unwrap_or(10_485_760);

        let data_directory: PathBuf = env::var("HUB_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("HUB_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("creatorhub.sqlite"));
        let document_directory = env::var("HUB_DOCUMENT_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("documents"));

        let jwt_secret = env::var("HUB_JWT_SECRET")
            .map_err(|_| HubError::Validation("JWT secret required".to_string()))?;
        let access_token_ttl = env::var("HUB_ACCESS_TOKEN_TTL")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);
        let refresh_token_ttl = env::var("HUB_REFRESH_TOKEN_TTL")
            .unwrap_or_else(|_| "2592000".to_string())
            .parse()
            .unwrap_or(2_592_000);

        // Parse bootstrap admin emails from comma-separated list
        let admin_emails = env::var("HUB_ADMIN_EMAILS")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<String>>();

        let rate_limit_enabled = env::var("HUB_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let authenticated_rps = env::var("HUB_RATE_LIMIT_AUTHENTICATED_RPS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);
        let unauthenticated_rps = env::var("HUB_RATE_LIMIT_UNAUTHENTICATED_RPS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let admin_rps = env::var("HUB_RATE_LIMIT_ADMIN_RPS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .unwrap_or(1000);
        let burst_size = env::var("HUB_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                document_upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                database,
                document_directory,
            },
            authentication: AuthConfig {
                jwt_secret,
                access_token_ttl,
                refresh_token_ttl,
                admin_emails,
            },
            rate_limit: RateLimitSettings {
                enabled: rate_limit_enabled,
                authenticated_rps,
                unauthenticated_rps,
                admin_rps,
                burst_size,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> HubResult<()> {
        if self.service.hostname.is_empty() {
            return Err(HubError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(HubError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.access_token_ttl <= 0 {
            return Err(HubError::Validation(
                "Access token TTL must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
