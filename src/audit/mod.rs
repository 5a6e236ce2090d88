/// Append-only audit trail
///
/// Every privileged mutation writes an entry in the same transaction as the
/// mutation itself, so a committed change always has its audit row and a
/// rolled-back change leaves none.
use crate::error::HubResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

/// A recorded audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub actor_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// An entry to be appended
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub actor_id: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl NewAuditEntry {
    pub fn new(action: &str, entity_type: &str) -> Self {
        Self {
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: None,
            actor_id: None,
            details: None,
        }
    }

    pub fn entity(mut self, entity_id: &str) -> Self {
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn actor(mut self, actor_id: &str) -> Self {
        self.actor_id = Some(actor_id.to_string());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Manages the audit_logs table
#[derive(Debug, Clone)]
pub struct AuditLogManager {
    db: SqlitePool,
}

impl AuditLogManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Append an entry inside a caller-owned transaction.
    ///
    /// Admin dispatchers use this so the audit row commits or rolls back
    /// together with the state change it records.
    pub async fn append_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        entry: NewAuditEntry,
    ) -> HubResult<i64> {
        let details = entry
            .details
            .as_ref()
            .map(|d| d.to_string());

        let result = sqlx::query(
            "INSERT INTO audit_logs (action, entity_type, entity_id, actor_id, details, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.actor_id)
        .bind(&details)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Append an entry outside any transaction
    pub async fn append(&self, entry: NewAuditEntry) -> HubResult<i64> {
        let mut tx = self.db.begin().await?;
        let id = Self::append_in_tx(&mut tx, entry).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Most recent entries, newest first
    pub async fn list_recent(&self, limit: i64) -> HubResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            "SELECT id, action, entity_type, entity_id, actor_id, details, created_at
             FROM audit_logs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_audit_row).collect()
    }

    /// Entries for a single entity, newest first
    pub async fn list_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> HubResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            "SELECT id, action, entity_type, entity_id, actor_id, details, created_at
             FROM audit_logs WHERE entity_type = ? AND entity_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_audit_row).collect()
    }

    /// Number of entries recorded for an entity
    pub async fn count_for_entity(&self, entity_type: &str, entity_id: &str) -> HubResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM audit_logs WHERE entity_type = ? AND entity_id = ?",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.get("count"))
    }
}

fn parse_audit_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<AuditEntry> {
    let details: Option<String> = row.get("details");
    let details = match details {
        Some(raw) => Some(serde_json::from_str(&raw)?),
        None => None,
    };

    Ok(AuditEntry {
        id: row.get("id"),
        action: row.get("action"),
        entity_type: row.get("entity_type"),
        entity_id: row.get("entity_id"),
        actor_id: row.get("actor_id"),
        details,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_list() {
        let manager = AuditLogManager::new(memory_pool().await);

        manager
            .append(
                NewAuditEntry::new("user_approve", "user")
                    .entity("user-1")
                    .actor("admin-1")
                    .details(json!({"reason": "docs verified"})),
            )
            .await
            .unwrap();
        manager
            .append(NewAuditEntry::new("user_suspend", "user").entity("user-1"))
            .await
            .unwrap();

        let entries = manager.list_recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        // Newest first
        assert_eq!(entries[0].action, "user_suspend");
        assert_eq!(entries[1].action, "user_approve");
        assert_eq!(
            entries[1].details.as_ref().unwrap()["reason"],
            "docs verified"
        );
        assert!(entries[0].details.is_none());
    }

    #[tokio::test]
    async fn test_rollback_discards_entry() {
        let pool = memory_pool().await;
        let manager = AuditLogManager::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        AuditLogManager::append_in_tx(&mut tx, NewAuditEntry::new("role_change", "user"))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(manager.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_for_entity_filters() {
        let manager = AuditLogManager::new(memory_pool().await);
        manager
            .append(NewAuditEntry::new("user_approve", "user").entity("a"))
            .await
            .unwrap();
        manager
            .append(NewAuditEntry::new("user_reject", "user").entity("b"))
            .await
            .unwrap();

        let entries = manager.list_for_entity("user", "a").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "user_approve");
        assert_eq!(manager.count_for_entity("user", "b").await.unwrap(), 1);
    }
}
