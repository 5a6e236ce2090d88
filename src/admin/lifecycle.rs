/// Admin-driven account lifecycle transitions
use crate::{
    account::state::{audit_action_for, UserState},
    audit::{AuditLogManager, NewAuditEntry},
    authz::{self, Capability, Role},
    error::{HubError, HubResult},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sqlx::{Row, SqlitePool};

/// Result of an admin state change
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeOutcome {
    pub user_id: String,
    pub previous_state: UserState,
    pub new_state: UserState,
    pub changed: bool,
}

/// Applies admin decisions to account state
#[derive(Debug, Clone)]
pub struct AccountLifecycleManager {
    db: SqlitePool,
}

impl AccountLifecycleManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Move an account to `target` on behalf of an admin.
    ///
    /// One transaction covers the profile update, resolution of any pending
    /// verification (for approve/reject), and the audit entry. Setting the
    /// state the account is already in changes nothing but is still audited,
    /// so repeated decisions remain visible in the trail.
    pub async fn set_account_state(
        &self,
        actor_id: &str,
        actor_role: Role,
        actor_state: UserState,
        target_user_id: &str,
        target: UserState,
        reason: Option<&str>,
    ) -> HubResult<StateChangeOutcome> {
        authz::require(actor_role, actor_state, Capability::ManageUserState)?;

        if !target.admin_settable() {
            return Err(HubError::Validation(format!(
                "State {} cannot be set by an admin",
                target
            )));
        }

        let mut tx = self.db.begin().await?;

        let row = sqlx::query("SELECT state FROM profiles WHERE id = ?")
            .bind(target_user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let previous_state = match row {
            Some(row) => UserState::from_str(row.get("state"))?,
            None => {
                return Err(HubError::NotFound(format!(
                    "No account with id {}",
                    target_user_id
                )))
            }
        };

        let now = Utc::now();
        let changed = previous_state != target;

        if changed {
            sqlx::query("UPDATE profiles SET state = ?, updated_at = ? WHERE id = ?")
                .bind(target.as_str())
                .bind(now)
                .bind(target_user_id)
                .execute(&mut *tx)
                .await?;
        }

        // An approve or reject decision also resolves any verification still
        // awaiting review, so the queue and the account never disagree.
        let decision = match target {
            UserState::Approved => Some("approved"),
            UserState::Rejected => Some("rejected"),
            _ => None,
        };
        if let Some(decision) = decision {
            sqlx::query(
                "UPDATE kyc_verifications
                 SET decision = ?, admin_id = ?, reason = ?, reviewed_at = ?
                 WHERE user_id = ? AND decision = 'pending_review'",
            )
            .bind(decision)
            .bind(actor_id)
            .bind(reason)
            .bind(now)
            .bind(target_user_id)
            .execute(&mut *tx)
            .await?;
        }

        let mut entry = NewAuditEntry::new(audit_action_for(target), "user")
            .entity(target_user_id)
            .actor(actor_id);
        if let Some(reason) = reason {
            entry = entry.details(json!({ "reason": reason }));
        }
        AuditLogManager::append_in_tx(&mut tx, entry).await?;

        tx.commit().await?;

        tracing::info!(
            target_user_id = %target_user_id,
            previous_state = %previous_state,
            new_state = %target,
            changed = changed,
            "Account state set"
        );

        Ok(StateChangeOutcome {
            user_id: target_user_id.to_string(),
            previous_state,
            new_state: target,
            changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;

    async fn insert_profile(pool: &SqlitePool, id: &str, state: &str) {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO profiles (id, email, password_hash, state, created_at, updated_at)
             VALUES (?, ?, 'x', ?, ?, ?)",
        )
        .bind(id)
        .bind(format!("{}@example.com", id))
        .bind(state)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn profile_state(pool: &SqlitePool, id: &str) -> String {
        sqlx::query("SELECT state FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
            .get("state")
    }

    #[tokio::test]
    async fn test_approve_changes_state_and_audits() {
        let pool = memory_pool().await;
        let manager = AccountLifecycleManager::new(pool.clone());
        insert_profile(&pool, "admin-1", "APPROVED").await;
        insert_profile(&pool, "target", "KYC_SUBMITTED").await;

        let outcome = manager
            .set_account_state(
                "admin-1",
                Role::Admin,
                UserState::Approved,
                "target",
                UserState::Approved,
                Some("docs verified"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.previous_state, UserState::KycSubmitted);
        assert!(outcome.changed);
        assert_eq!(profile_state(&pool, "target").await, "APPROVED");

        let audit = AuditLogManager::new(pool);
        let entries = audit.list_for_entity("user", "target").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "user_approve");
        assert_eq!(entries[0].details.as_ref().unwrap()["reason"], "docs verified");
    }

    #[tokio::test]
    async fn test_same_state_is_noop_but_audited() {
        let pool = memory_pool().await;
        let manager = AccountLifecycleManager::new(pool.clone());
        insert_profile(&pool, "admin-1", "APPROVED").await;
        insert_profile(&pool, "target", "KYC_SUBMITTED").await;

        for _ in 0..2 {
            manager
                .set_account_state(
                    "admin-1",
                    Role::Admin,
                    UserState::Approved,
                    "target",
                    UserState::Approved,
                    None,
                )
                .await
                .unwrap();
        }

        assert_eq!(profile_state(&pool, "target").await, "APPROVED");
        let audit = AuditLogManager::new(pool);
        assert_eq!(audit.count_for_entity("user", "target").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_suspend_without_reason() {
        let pool = memory_pool().await;
        let manager = AccountLifecycleManager::new(pool.clone());
        insert_profile(&pool, "admin-1", "APPROVED").await;
        insert_profile(&pool, "target", "APPROVED").await;

        manager
            .set_account_state(
                "admin-1",
                Role::Admin,
                UserState::Approved,
                "target",
                UserState::Suspended,
                None,
            )
            .await
            .unwrap();

        assert_eq!(profile_state(&pool, "target").await, "SUSPENDED");
        let audit = AuditLogManager::new(pool);
        let entries = audit.list_for_entity("user", "target").await.unwrap();
        assert_eq!(entries[0].action, "user_suspend");
        assert!(entries[0].details.is_none());
    }

    #[tokio::test]
    async fn test_non_admin_leaves_no_trace() {
        let pool = memory_pool().await;
        let manager = AccountLifecycleManager::new(pool.clone());
        insert_profile(&pool, "user-1", "APPROVED").await;
        insert_profile(&pool, "target", "KYC_SUBMITTED").await;

        let err = manager
            .set_account_state(
                "user-1",
                Role::User,
                UserState::Approved,
                "target",
                UserState::Rejected,
                Some("nope"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Unauthorized(_)));

        assert_eq!(profile_state(&pool, "target").await, "KYC_SUBMITTED");
        let audit = AuditLogManager::new(pool);
        assert!(audit.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_owner_states_not_admin_settable() {
        let pool = memory_pool().await;
        let manager = AccountLifecycleManager::new(pool.clone());
        insert_profile(&pool, "admin-1", "APPROVED").await;
        insert_profile(&pool, "target", "APPROVED").await;

        let err = manager
            .set_account_state(
                "admin-1",
                Role::Admin,
                UserState::Approved,
                "target",
                UserState::Registered,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_target_not_found() {
        let pool = memory_pool().await;
        let manager = AccountLifecycleManager::new(pool.clone());
        insert_profile(&pool, "admin-1", "APPROVED").await;

        let err = manager
            .set_account_state(
                "admin-1",
                Role::Admin,
                UserState::Approved,
                "ghost",
                UserState::Suspended,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_full_submission_and_approval_flow() {
        use crate::doc_store::DiskDocumentBackend;
        use crate::kyc::{KycDecision, KycManager};
        use std::sync::Arc;
        use tempfile::tempdir;

        let pool = memory_pool().await;
        let lifecycle = AccountLifecycleManager::new(pool.clone());
        let dir = tempdir().unwrap();
        let kyc = KycManager::new(
            pool.clone(),
            Arc::new(DiskDocumentBackend::new(dir.path().to_path_buf())),
            1024,
        );
        insert_profile(&pool, "admin-1", "APPROVED").await;
        insert_profile(&pool, "creator", "REGISTERED").await;

        kyc.upload_document(
            "creator",
            Role::User,
            UserState::Registered,
            "passport",
            "p.png",
            None,
            b"scan".to_vec(),
        )
        .await
        .unwrap();
        kyc.submit("creator", Role::User, UserState::Registered)
            .await
            .unwrap();
        assert_eq!(profile_state(&pool, "creator").await, "KYC_SUBMITTED");

        let outcome = lifecycle
            .set_account_state(
                "admin-1",
                Role::Admin,
                UserState::Approved,
                "creator",
                UserState::Approved,
                Some("docs verified"),
            )
            .await
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(profile_state(&pool, "creator").await, "APPROVED");

        // The queue is empty and the verification carries the decision
        assert!(kyc.pending_verifications().await.unwrap().is_empty());
        let verification = kyc.latest_verification("creator").await.unwrap().unwrap();
        assert_eq!(verification.decision, KycDecision::Approved);
        assert_eq!(verification.admin_id.as_deref(), Some("admin-1"));
        assert_eq!(verification.reason.as_deref(), Some("docs verified"));

        let audit = AuditLogManager::new(pool);
        let entries = audit.list_for_entity("user", "creator").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "user_approve");
    }

    #[tokio::test]
    async fn test_reject_resolves_pending_verification() {
        let pool = memory_pool().await;
        let manager = AccountLifecycleManager::new(pool.clone());
        insert_profile(&pool, "admin-1", "APPROVED").await;
        insert_profile(&pool, "target", "KYC_SUBMITTED").await;
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO kyc_verifications (id, user_id, decision, created_at)
             VALUES ('v1', 'target', 'pending_review', ?)",
        )
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        manager
            .set_account_state(
                "admin-1",
                Role::Admin,
                UserState::Approved,
                "target",
                UserState::Rejected,
                Some("document illegible"),
            )
            .await
            .unwrap();

        let row = sqlx::query("SELECT decision, admin_id, reason FROM kyc_verifications WHERE id = 'v1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("decision"), "rejected");
        assert_eq!(row.get::<String, _>("admin_id"), "admin-1");
        assert_eq!(row.get::<String, _>("reason"), "document illegible");
    }
}
