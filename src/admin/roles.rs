/// Role assignment management
use crate::{
    account::UserState,
    audit::{AuditLogManager, NewAuditEntry},
    authz::{self, Capability, Role},
    error::{HubError, HubResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{Row, SqlitePool};

/// A user's explicit role assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a role change
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChangeOutcome {
    pub user_id: String,
    pub previous_role: Role,
    pub new_role: Role,
    pub changed: bool,
}

/// Manages the user_roles table
#[derive(Debug, Clone)]
pub struct RoleManager {
    db: SqlitePool,
}

impl RoleManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Effective role for a user. Absence of a row means `User`.
    pub async fn get_role(&self, user_id: &str) -> HubResult<Role> {
        let row = sqlx::query("SELECT role FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(row) => Role::from_str(row.get("role")),
            None => Ok(Role::User),
        }
    }

    /// Roles for a batch of users, for the admin user listing
    pub async fn list_assignments(&self) -> HubResult<Vec<RoleAssignment>> {
        let rows = sqlx::query(
            "SELECT user_id, role, created_at, updated_at FROM user_roles ORDER BY updated_at DESC",
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(RoleAssignment {
                    user_id: row.get("user_id"),
                    role: Role::from_str(row.get("role"))?,
                    created_at: row.get("created_at"),
                    updated_at: row.get("updated_at"),
                })
            })
            .collect()
    }

    /// Assign a role to a user.
    ///
    /// The capability check happens before any database write, so an
    /// unauthorized call leaves no trace. The upsert and its audit entry
    /// commit together. Assigning the role the user already holds is a
    /// no-op for user_roles but is still audited.
    pub async fn set_role(
        &self,
        actor_id: &str,
        actor_role: Role,
        actor_state: UserState,
        target_user_id: &str,
        new_role: Role,
    ) -> HubResult<RoleChangeOutcome> {
        authz::require(actor_role, actor_state, Capability::ManageRoles)?;

        let mut tx = self.db.begin().await?;

        let target = sqlx::query("SELECT id FROM profiles WHERE id = ?")
            .bind(target_user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if target.is_none() {
            return Err(HubError::NotFound(format!(
                "No account with id {}",
                target_user_id
            )));
        }

        let previous = sqlx::query("SELECT role FROM user_roles WHERE user_id = ?")
            .bind(target_user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let previous_role = match previous {
            Some(row) => Role::from_str(row.get("role"))?,
            None => Role::User,
        };

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO user_roles (id, user_id, role, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(target_user_id)
        .bind(new_role.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        AuditLogManager::append_in_tx(
            &mut tx,
            NewAuditEntry::new("role_change", "user")
                .entity(target_user_id)
                .actor(actor_id)
                .details(json!({
                    "previous_role": previous_role.as_str(),
                    "new_role": new_role.as_str(),
                })),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            target_user_id = %target_user_id,
            previous_role = %previous_role,
            new_role = %new_role,
            "Role changed"
        );

        Ok(RoleChangeOutcome {
            user_id: target_user_id.to_string(),
            previous_role,
            new_role,
            changed: previous_role != new_role,
        })
    }
}
