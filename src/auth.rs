/// Authentication extractors
///
/// Each extractor loads the profile and role fresh from the database, so a
/// suspension or demotion applied mid-session takes effect on the very next
/// request.
use crate::{
    account::{Profile, ValidatedSession},
    api::middleware::extract_bearer_token,
    authz::{self, Capability, Role},
    context::AppContext,
    error::HubError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context: validated session plus fresh profile and role
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub session: ValidatedSession,
    pub profile: Profile,
    pub role: Role,
}

impl AuthContext {
    async fn load(state: &AppContext, token: &str) -> Result<Self, HubError> {
        let session = state.account_manager.validate_access_token(token).await?;
        let profile = state.account_manager.get_profile(&session.user_id).await?;

        let mut role = state.role_manager.get_role(&session.user_id).await?;
        if role != Role::Admin && state.account_manager.is_bootstrap_admin(&profile.email) {
            role = Role::Admin;
        }

        Ok(AuthContext {
            user_id: session.user_id.clone(),
            session,
            profile,
            role,
        })
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = HubError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| HubError::Authentication("Missing authorization header".to_string()))?;

        Self::load(state, &token).await
    }
}

/// Optional authenticated context - does not fail if no auth provided
#[derive(Debug, Clone)]
pub struct OptionalAuthContext {
    pub auth: Option<AuthContext>,
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthContext {
    type Rejection = HubError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = match extract_bearer_token(&parts.headers) {
            Some(token) => AuthContext::load(state, &token).await.ok(),
            None => None,
        };

        Ok(OptionalAuthContext { auth })
    }
}

/// Admin authentication context - requires the admin panel capability
#[derive(Debug, Clone)]
pub struct AdminAuthContext {
    pub auth: AuthContext,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminAuthContext {
    type Rejection = HubError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;

        // A suspended admin fails this check like anyone else
        authz::require(auth.role, auth.profile.state, Capability::AccessAdminPanel)?;

        Ok(AdminAuthContext { auth })
    }
}
