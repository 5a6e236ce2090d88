/// Tests for the admin API wire contracts
///
/// Note: These are unit tests that verify the contracts are correct.
/// Integration tests would require a running server.

#[cfg(test)]
mod tests {
    use serde_json::json;

    #[test]
    fn test_authorization_header_parsing() {
        let auth_header = "Bearer abc123token";
        let token = auth_header.strip_prefix("Bearer ");
        assert_eq!(token, Some("abc123token"));

        let invalid_header = "abc123token";
        let token = invalid_header.strip_prefix("Bearer ");
        assert_eq!(token, None);
    }

    #[test]
    fn test_state_strings_are_screaming_snake_case() {
        // Profile states travel as uppercase strings on the wire
        let states = [
            "REGISTERED",
            "KYC_SUBMITTED",
            "APPROVED",
            "REJECTED",
            "SUSPENDED",
        ];
        for state in states {
            assert_eq!(state, state.to_uppercase());
            assert!(state.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
        // while verification decisions travel lowercase
        for decision in ["pending_review", "approved", "rejected"] {
            assert_eq!(decision, decision.to_lowercase());
        }
    }

    #[test]
    fn test_role_change_details_shape() {
        let details = json!({
            "previous_role": "user",
            "new_role": "moderator",
        });

        assert!(details["previous_role"].is_string());
        assert!(details["new_role"].is_string());
        assert_ne!(details["previous_role"], details["new_role"]);
    }

    #[test]
    fn test_state_change_details_shape() {
        let with_reason = json!({ "reason": "docs verified" });
        assert_eq!(with_reason["reason"], "docs verified");

        // A decision without a reason carries no details object at all
        let without: Option<serde_json::Value> = None;
        assert!(without.is_none());
    }

    #[test]
    fn test_set_state_request_shape() {
        let body = json!({
            "state": "APPROVED",
            "reason": "docs verified",
        });
        assert_eq!(body["state"], "APPROVED");

        // reason is optional
        let minimal = json!({ "state": "SUSPENDED" });
        assert!(minimal.get("reason").is_none());
    }
}
