/// Direct messages
use crate::{
    account::UserState,
    authz::{self, Capability, Role},
    error::{HubError, HubResult},
    realtime::{MessageEvent, RealtimeHub},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// A direct message between two accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A conversation partner with the time of the latest exchange
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPartner {
    pub user_id: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: i64,
}

/// Manages direct_messages; publishes a realtime event on each send
#[derive(Debug, Clone)]
pub struct MessageManager {
    db: SqlitePool,
    realtime: RealtimeHub,
}

impl MessageManager {
    pub fn new(db: SqlitePool, realtime: RealtimeHub) -> Self {
        Self { db, realtime }
    }

    /// Store and fan out a message. The row insert is the source of truth;
    /// the realtime event is fire-and-forget on top of it.
    pub async fn send(
        &self,
        sender_id: &str,
        role: Role,
        state: UserState,
        receiver_id: &str,
        content: &str,
    ) -> HubResult<DirectMessage> {
        authz::require(role, state, Capability::ParticipateCommunity)?;

        if content.trim().is_empty() {
            return Err(HubError::Validation("Message cannot be empty".to_string()));
        }
        if sender_id == receiver_id {
            return Err(HubError::Validation(
                "Cannot message your own account".to_string(),
            ));
        }

        let receiver = sqlx::query("SELECT id FROM profiles WHERE id = ?")
            .bind(receiver_id)
            .fetch_optional(&self.db)
            .await?;
        if receiver.is_none() {
            return Err(HubError::NotFound(format!(
                "No account with id {}",
                receiver_id
            )));
        }

        let message = DirectMessage {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            content: content.to_string(),
            is_read: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO direct_messages (id, sender_id, receiver_id, content, is_read, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(&message.id)
        .bind(&message.sender_id)
        .bind(&message.receiver_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.db)
        .await?;

        self.realtime.publish(MessageEvent {
            message: message.clone(),
        });

        Ok(message)
    }

    /// Messages between the user and one peer, oldest first
    pub async fn conversation(
        &self,
        user_id: &str,
        peer_id: &str,
        limit: i64,
    ) -> HubResult<Vec<DirectMessage>> {
        let rows = sqlx::query(
            "SELECT * FROM direct_messages
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
             ORDER BY created_at ASC LIMIT ?",
        )
        .bind(user_id)
        .bind(peer_id)
        .bind(peer_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_message_row).collect()
    }

    /// Everyone the user has exchanged messages with, most recent first
    pub async fn partners(&self, user_id: &str) -> HubResult<Vec<ConversationPartner>> {
        let rows = sqlx::query(
            "SELECT peer, MAX(created_at) as last_message_at,
                    SUM(CASE WHEN receiver_id = ?1 AND is_read = 0 THEN 1 ELSE 0 END) as unread
             FROM (
                 SELECT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END as peer,
                        receiver_id, is_read, created_at
                 FROM direct_messages
                 WHERE sender_id = ?1 OR receiver_id = ?1
             )
             GROUP BY peer
             ORDER BY last_message_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ConversationPartner {
                user_id: row.get("peer"),
                last_message_at: row.get("last_message_at"),
                unread_count: row.get("unread"),
            })
            .collect())
    }

    /// Mark everything a peer sent to the user as read
    pub async fn mark_read(&self, user_id: &str, peer_id: &str) -> HubResult<u64> {
        let result = sqlx::query(
            "UPDATE direct_messages SET is_read = 1
             WHERE receiver_id = ? AND sender_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .bind(peer_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Total unread messages for the user
    pub async fn unread_count(&self, user_id: &str) -> HubResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM direct_messages WHERE receiver_id = ? AND is_read = 0",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row.get("count"))
    }
}

fn parse_message_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<DirectMessage> {
    Ok(DirectMessage {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;

    async fn insert_profile(pool: &SqlitePool, id: &str) {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO profiles (id, email, password_hash, state, created_at, updated_at)
             VALUES (?, ?, 'x', 'APPROVED', ?, ?)",
        )
        .bind(id)
        .bind(format!("{}@example.com", id))
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn setup() -> (MessageManager, SqlitePool, RealtimeHub) {
        let pool = memory_pool().await;
        let hub = RealtimeHub::new();
        let manager = MessageManager::new(pool.clone(), hub.clone());
        insert_profile(&pool, "alice").await;
        insert_profile(&pool, "bob").await;
        (manager, pool, hub)
    }

    #[tokio::test]
    async fn test_send_and_read_conversation() {
        let (manager, _pool, _hub) = setup().await;

        manager
            .send("alice", Role::User, UserState::Approved, "bob", "hi")
            .await
            .unwrap();
        manager
            .send("bob", Role::User, UserState::Approved, "alice", "hey")
            .await
            .unwrap();

        let conversation = manager.conversation("alice", "bob", 50).await.unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].content, "hi");
        assert_eq!(conversation[1].content, "hey");
    }

    #[tokio::test]
    async fn test_send_publishes_realtime_event() {
        let (manager, _pool, hub) = setup().await;
        let mut rx = hub.subscribe();

        manager
            .send("alice", Role::User, UserState::Approved, "bob", "hi")
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.message.content, "hi");
        assert!(event.concerns("bob"));
        assert!(!event.concerns("carol"));
    }

    #[tokio::test]
    async fn test_unread_tracking() {
        let (manager, _pool, _hub) = setup().await;

        manager
            .send("alice", Role::User, UserState::Approved, "bob", "one")
            .await
            .unwrap();
        manager
            .send("alice", Role::User, UserState::Approved, "bob", "two")
            .await
            .unwrap();

        assert_eq!(manager.unread_count("bob").await.unwrap(), 2);
        let partners = manager.partners("bob").await.unwrap();
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].user_id, "alice");
        assert_eq!(partners[0].unread_count, 2);

        assert_eq!(manager.mark_read("bob", "alice").await.unwrap(), 2);
        assert_eq!(manager.unread_count("bob").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_validations() {
        let (manager, _pool, _hub) = setup().await;

        let err = manager
            .send("alice", Role::User, UserState::Approved, "alice", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));

        let err = manager
            .send("alice", Role::User, UserState::Approved, "ghost", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));

        let err = manager
            .send("alice", Role::User, UserState::Registered, "bob", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Unauthorized(_)));
    }
}
