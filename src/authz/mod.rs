/// Role and capability model
///
/// `permitted_actions` is the single authority for what a (role, state) pair
/// may do. Handlers and the route guard consult this table instead of
/// scattering ad-hoc role checks.
use crate::{
    account::state::UserState,
    error::{HubError, HubResult},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Application roles. Absence of a user_roles row means `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> HubResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            _ => Err(HubError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named permitted operations, derived from (role, account state)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewDashboard,
    ManageChannels,
    ManageTeam,
    ParticipateCommunity,
    SubmitKyc,
    AccessAdminPanel,
    ManageRoles,
    ManageUserState,
}

/// The full capability set for a role and account state.
///
/// Rules:
/// - `ViewDashboard` comes with any valid session.
/// - `SubmitKyc` requires state REGISTERED or REJECTED.
/// - Creator mutation capabilities require state APPROVED, for every role;
///   admins are not exempt from the approval gate on mutation.
/// - Admin capabilities require the admin role and a non-suspended account;
///   suspension overrides role.
pub fn permitted_actions(role: Role, state: UserState) -> BTreeSet<Capability> {
    let mut caps = BTreeSet::new();

    caps.insert(Capability::ViewDashboard);

    if state.accepts_kyc_submission() {
        caps.insert(Capability::SubmitKyc);
    }

    if state == UserState::Approved {
        caps.insert(Capability::ManageChannels);
        caps.insert(Capability::ManageTeam);
        caps.insert(Capability::ParticipateCommunity);
    }

    if role == Role::Admin && state != UserState::Suspended {
        caps.insert(Capability::AccessAdminPanel);
        caps.insert(Capability::ManageRoles);
        caps.insert(Capability::ManageUserState);
    }

    caps
}

/// Check a single capability, returning `Unauthorized` when missing
pub fn require(role: Role, state: UserState, cap: Capability) -> HubResult<()> {
    if permitted_actions(role, state).contains(&cap) {
        Ok(())
    } else {
        Err(HubError::Unauthorized(format!(
            "Capability {:?} not permitted for role {} in state {}",
            cap, role, state
        )))
    }
}

/// Route guard outcome for a navigation target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    Render,
    RedirectToAuth,
    RedirectToDashboard,
}

/// Decide whether a protected route may render for the given session.
///
/// Pure: callers re-evaluate with a freshly loaded (role, state) pair, so a
/// demotion or suspension applied to an active session takes effect on the
/// next evaluation.
pub fn evaluate_route(session: Option<(Role, UserState)>, requires_admin: bool) -> RouteDecision {
    match session {
        None => RouteDecision::RedirectToAuth,
        Some((role, state)) => {
            if requires_admin
                && !permitted_actions(role, state).contains(&Capability::AccessAdminPanel)
            {
                RouteDecision::RedirectToDashboard
            } else {
                RouteDecision::Render
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("ADMIN").unwrap(), Role::Admin);
        assert_eq!(Role::from_str("manager").unwrap(), Role::Manager);
        assert_eq!(Role::from_str("moderator").unwrap(), Role::Moderator);
        assert_eq!(Role::from_str("user").unwrap(), Role::User);
        assert!(Role::from_str("superuser").is_err());
    }

    #[test]
    fn test_registered_user_capabilities() {
        let caps = permitted_actions(Role::User, UserState::Registered);
        assert!(caps.contains(&Capability::ViewDashboard));
        assert!(caps.contains(&Capability::SubmitKyc));
        assert!(!caps.contains(&Capability::ManageChannels));
        assert!(!caps.contains(&Capability::ManageTeam));
        assert!(!caps.contains(&Capability::AccessAdminPanel));
    }

    #[test]
    fn test_approved_user_capabilities() {
        let caps = permitted_actions(Role::User, UserState::Approved);
        assert!(caps.contains(&Capability::ManageChannels));
        assert!(caps.contains(&Capability::ManageTeam));
        assert!(caps.contains(&Capability::ParticipateCommunity));
        assert!(!caps.contains(&Capability::SubmitKyc));
        assert!(!caps.contains(&Capability::AccessAdminPanel));
    }

    #[test]
    fn test_suspended_admin_loses_everything_but_viewing() {
        // Suspension overrides role: no creator capabilities, no admin panel
        let caps = permitted_actions(Role::Admin, UserState::Suspended);
        assert!(caps.contains(&Capability::ViewDashboard));
        assert!(!caps.contains(&Capability::ManageChannels));
        assert!(!caps.contains(&Capability::ManageTeam));
        assert!(!caps.contains(&Capability::ParticipateCommunity));
        assert!(!caps.contains(&Capability::AccessAdminPanel));
        assert!(!caps.contains(&Capability::ManageRoles));
        assert!(!caps.contains(&Capability::ManageUserState));
    }

    #[test]
    fn test_admin_not_exempt_from_approval_gate() {
        let caps = permitted_actions(Role::Admin, UserState::Registered);
        assert!(caps.contains(&Capability::AccessAdminPanel));
        assert!(caps.contains(&Capability::ManageUserState));
        assert!(!caps.contains(&Capability::ManageChannels));
        assert!(!caps.contains(&Capability::ManageTeam));
    }

    #[test]
    fn test_manager_and_moderator_are_not_admins() {
        for role in [Role::Manager, Role::Moderator] {
            let caps = permitted_actions(role, UserState::Approved);
            assert!(!caps.contains(&Capability::AccessAdminPanel));
            assert!(!caps.contains(&Capability::ManageRoles));
        }
    }

    #[test]
    fn test_rejected_user_can_resubmit() {
        let caps = permitted_actions(Role::User, UserState::Rejected);
        assert!(caps.contains(&Capability::SubmitKyc));
        assert!(!caps.contains(&Capability::ManageChannels));
    }

    #[test]
    fn test_route_guard_no_session() {
        assert_eq!(evaluate_route(None, false), RouteDecision::RedirectToAuth);
        assert_eq!(evaluate_route(None, true), RouteDecision::RedirectToAuth);
    }

    #[test]
    fn test_route_guard_admin_flag() {
        let user = Some((Role::User, UserState::Approved));
        assert_eq!(evaluate_route(user, false), RouteDecision::Render);
        assert_eq!(
            evaluate_route(user, true),
            RouteDecision::RedirectToDashboard
        );

        let admin = Some((Role::Admin, UserState::Approved));
        assert_eq!(evaluate_route(admin, true), RouteDecision::Render);
    }

    #[test]
    fn test_route_guard_reacts_to_suspension() {
        // Same session identity, state changed underneath: admin panel closes
        let before = Some((Role::Admin, UserState::Approved));
        let after = Some((Role::Admin, UserState::Suspended));
        assert_eq!(evaluate_route(before, true), RouteDecision::Render);
        assert_eq!(
            evaluate_route(after, true),
            RouteDecision::RedirectToDashboard
        );
    }

    #[test]
    fn test_require_reports_unauthorized() {
        assert!(require(Role::User, UserState::Approved, Capability::ManageChannels).is_ok());
        let err = require(Role::User, UserState::Registered, Capability::ManageChannels)
            .unwrap_err();
        assert!(matches!(err, crate::error::HubError::Unauthorized(_)));
    }
}
