/// Account lifecycle state machine
///
/// REGISTERED is the initial state. Owners move REGISTERED/REJECTED to
/// KYC_SUBMITTED by submitting verification documents; admins resolve
/// KYC_SUBMITTED to APPROVED or REJECTED, and may set APPROVED, REJECTED,
/// or SUSPENDED directly from any state.
use crate::error::{HubError, HubResult};
use serde::{Deserialize, Serialize};

/// Account lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserState {
    Registered,
    KycSubmitted,
    Approved,
    Rejected,
    Suspended,
}

impl UserState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserState::Registered => "REGISTERED",
            UserState::KycSubmitted => "KYC_SUBMITTED",
            UserState::Approved => "APPROVED",
            UserState::Rejected => "REJECTED",
            UserState::Suspended => "SUSPENDED",
        }
    }

    pub fn from_str(s: &str) -> HubResult<Self> {
        match s {
            "REGISTERED" => Ok(UserState::Registered),
            "KYC_SUBMITTED" => Ok(UserState::KycSubmitted),
            "APPROVED" => Ok(UserState::Approved),
            "REJECTED" => Ok(UserState::Rejected),
            "SUSPENDED" => Ok(UserState::Suspended),
            _ => Err(HubError::Validation(format!("Invalid account state: {}", s))),
        }
    }

    /// States an account owner may submit KYC documents from
    pub fn accepts_kyc_submission(&self) -> bool {
        matches!(self, UserState::Registered | UserState::Rejected)
    }

    /// States an admin may set directly. Everything except the two
    /// owner-driven states is reachable from anywhere.
    pub fn admin_settable(&self) -> bool {
        matches!(
            self,
            UserState::Approved | UserState::Rejected | UserState::Suspended
        )
    }
}

impl std::fmt::Display for UserState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit action name for an admin transition to `target`
pub fn audit_action_for(target: UserState) -> &'static str {
    match target {
        UserState::Approved => "user_approve",
        UserState::Rejected => "user_reject",
        UserState::Suspended => "user_suspend",
        // Owner-driven states never reach the admin dispatcher
        UserState::Registered | UserState::KycSubmitted => "user_state_change",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for state in [
            UserState::Registered,
            UserState::KycSubmitted,
            UserState::Approved,
            UserState::Rejected,
            UserState::Suspended,
        ] {
            assert_eq!(UserState::from_str(state.as_str()).unwrap(), state);
        }
        assert!(UserState::from_str("DELETED").is_err());
        assert!(UserState::from_str("approved").is_err());
    }

    #[test]
    fn test_kyc_submission_gate() {
        assert!(UserState::Registered.accepts_kyc_submission());
        assert!(UserState::Rejected.accepts_kyc_submission());
        assert!(!UserState::KycSubmitted.accepts_kyc_submission());
        assert!(!UserState::Approved.accepts_kyc_submission());
        assert!(!UserState::Suspended.accepts_kyc_submission());
    }

    #[test]
    fn test_admin_settable_states() {
        assert!(UserState::Approved.admin_settable());
        assert!(UserState::Rejected.admin_settable());
        assert!(UserState::Suspended.admin_settable());
        assert!(!UserState::Registered.admin_settable());
        assert!(!UserState::KycSubmitted.admin_settable());
    }

    #[test]
    fn test_audit_action_names() {
        assert_eq!(audit_action_for(UserState::Approved), "user_approve");
        assert_eq!(audit_action_for(UserState::Rejected), "user_reject");
        assert_eq!(audit_action_for(UserState::Suspended), "user_suspend");
    }
}
