/// Request rate limiting
use crate::error::{HubError, HubResult};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
    pub admin_rps: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            authenticated_rps: 100,
            unauthenticated_rps: 10,
            admin_rps: 1000,
            burst_size: 50,
        }
    }
}

fn nonzero(value: u32, fallback: u32) -> NonZeroU32 {
    NonZeroU32::new(value)
        .or(NonZeroU32::new(fallback))
        .unwrap_or(NonZeroU32::MIN)
}

/// Three quota classes: unauthenticated, authenticated, admin
#[derive(Clone)]
pub struct RateLimiter {
    authenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    unauthenticated: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    admin: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let auth_quota = Quota::per_second(nonzero(config.authenticated_rps, 100))
            .allow_burst(nonzero(config.burst_size, 50));
        let unauth_quota = Quota::per_second(nonzero(config.unauthenticated_rps, 10))
            .allow_burst(nonzero(config.burst_size / 5, 10));
        let admin_quota = Quota::per_second(nonzero(config.admin_rps, 1000))
            .allow_burst(nonzero(config.burst_size.saturating_mul(2), 100));

        Self {
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
            admin: Arc::new(GovernorLimiter::direct(admin_quota)),
        }
    }

    pub fn check_authenticated(&self) -> HubResult<()> {
        match self.authenticated.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(HubError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }

    pub fn check_unauthenticated(&self) -> HubResult<()> {
        match self.unauthenticated.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(HubError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }

    pub fn check_admin(&self) -> HubResult<()> {
        match self.admin.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(HubError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }
}

/// Rate limiting middleware. Admin routes with credentials get the admin
/// quota, other credentialed requests the authenticated quota, everything
/// else the unauthenticated quota.
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !ctx.config.rate_limit.enabled {
        return Ok(next.run(request).await);
    }

    let is_admin = request.uri().path().starts_with("/api/admin");
    let has_auth_header = request.headers().get("authorization").is_some();

    let result = if is_admin && has_auth_header {
        ctx.rate_limiter.check_admin()
    } else if has_auth_header {
        ctx.rate_limiter.check_authenticated()
    } else {
        ctx.rate_limiter.check_unauthenticated()
    };

    match result {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => Err(StatusCode::TOO_MANY_REQUESTS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(RateLimitConfig::default());

        assert!(limiter.check_authenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_ok());
        assert!(limiter.check_admin().is_ok());
    }

    #[test]
    fn test_burst_limit() {
        let config = RateLimitConfig {
            authenticated_rps: 10,
            unauthenticated_rps: 5,
            admin_rps: 100,
            burst_size: 5,
        };
        let limiter = RateLimiter::new(config);

        for _ in 0..5 {
            assert!(limiter.check_authenticated().is_ok());
        }
        assert!(limiter.check_authenticated().is_err());
    }

    #[test]
    fn test_zero_config_falls_back() {
        let config = RateLimitConfig {
            authenticated_rps: 0,
            unauthenticated_rps: 0,
            admin_rps: 0,
            burst_size: 0,
        };
        let limiter = RateLimiter::new(config);
        assert!(limiter.check_authenticated().is_ok());
    }
}
