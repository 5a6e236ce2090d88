/// Tracked channels and their stats snapshots
use crate::{
    account::UserState,
    authz::{self, Capability, Role},
    error::{HubError, HubResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use validator::Validate;

/// A tracked channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub user_id: String,
    pub channel_url: String,
    pub channel_name: Option<String>,
    pub channel_niche: Option<String>,
    pub channel_role: Option<String>,
    pub subscriber_count: Option<i64>,
    pub view_count: Option<i64>,
    pub video_count: Option<i64>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A point-in-time stats snapshot, the raw material for analytics charts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub id: String,
    pub channel_id: String,
    pub snapshot_date: DateTime<Utc>,
    pub subscriber_count: Option<i64>,
    pub view_count: Option<i64>,
    pub video_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Request to track a new channel
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewChannel {
    #[validate(url)]
    pub channel_url: String,
    #[validate(length(max = 200))]
    pub channel_name: Option<String>,
    pub channel_niche: Option<String>,
    pub channel_role: Option<String>,
}

/// Updated counters from a stats sync
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub subscriber_count: Option<i64>,
    pub view_count: Option<i64>,
    pub video_count: Option<i64>,
}

/// Manages the channels and channel_stats_snapshots tables
#[derive(Debug, Clone)]
pub struct ChannelManager {
    db: SqlitePool,
}

impl ChannelManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Track a new channel for the owner
    pub async fn add_channel(
        &self,
        owner_id: &str,
        role: Role,
        state: UserState,
        request: NewChannel,
    ) -> HubResult<Channel> {
        authz::require(role, state, Capability::ManageChannels)?;
        request
            .validate()
            .map_err(|e| HubError::Validation(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO channels
             (id, user_id, channel_url, channel_name, channel_niche, channel_role, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(&request.channel_url)
        .bind(&request.channel_name)
        .bind(&request.channel_niche)
        .bind(&request.channel_role)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Channel {
            id,
            user_id: owner_id.to_string(),
            channel_url: request.channel_url,
            channel_name: request.channel_name,
            channel_niche: request.channel_niche,
            channel_role: request.channel_role,
            subscriber_count: None,
            view_count: None,
            video_count: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Channels tracked by an owner, newest first
    pub async fn list_channels(&self, owner_id: &str) -> HubResult<Vec<Channel>> {
        let rows = sqlx::query(
            "SELECT * FROM channels WHERE user_id = ? ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_channel_row).collect()
    }

    /// Record a stats sync: update the channel's counters and append a
    /// snapshot row in one transaction, so the chart history never skips
    /// a sync that the channel row reflects.
    pub async fn record_stats(
        &self,
        owner_id: &str,
        role: Role,
        state: UserState,
        channel_id: &str,
        stats: ChannelStats,
    ) -> HubResult<Channel> {
        authz::require(role, state, Capability::ManageChannels)?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query("SELECT user_id FROM channels WHERE id = ?")
            .bind(channel_id)
            .fetch_optional(&mut *tx)
            .await?;
        match row {
            None => {
                return Err(HubError::NotFound(format!(
                    "No channel with id {}",
                    channel_id
                )))
            }
            Some(row) => {
                let channel_owner: String = row.get("user_id");
                if channel_owner != owner_id {
                    return Err(HubError::Unauthorized(
                        "Channel belongs to another account".to_string(),
                    ));
                }
            }
        }

        let now = Utc::now();

        sqlx::query(
            "UPDATE channels
             SET subscriber_count = ?, view_count = ?, video_count = ?,
                 last_synced_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(stats.subscriber_count)
        .bind(stats.view_count)
        .bind(stats.video_count)
        .bind(now)
        .bind(now)
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO channel_stats_snapshots
             (id, channel_id, snapshot_date, subscriber_count, view_count, video_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(channel_id)
        .bind(now)
        .bind(stats.subscriber_count)
        .bind(stats.view_count)
        .bind(stats.video_count)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let row = sqlx::query("SELECT * FROM channels WHERE id = ?")
            .bind(channel_id)
            .fetch_one(&self.db)
            .await?;
        parse_channel_row(&row)
    }

    /// Snapshot history for a channel, oldest first. Read-only, so any
    /// session belonging to the channel owner may fetch it.
    pub async fn snapshots(
        &self,
        owner_id: &str,
        channel_id: &str,
        limit: i64,
    ) -> HubResult<Vec<StatsSnapshot>> {
        self.fetch_owned(channel_id, owner_id).await?;

        let rows = sqlx::query(
            "SELECT * FROM channel_stats_snapshots WHERE channel_id = ?
             ORDER BY snapshot_date ASC LIMIT ?",
        )
        .bind(channel_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(StatsSnapshot {
                    id: row.get("id"),
                    channel_id: row.get("channel_id"),
                    snapshot_date: row.get("snapshot_date"),
                    subscriber_count: row.get("subscriber_count"),
                    view_count: row.get("view_count"),
                    video_count: row.get("video_count"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    /// Untrack a channel and its snapshot history
    pub async fn delete_channel(
        &self,
        owner_id: &str,
        role: Role,
        state: UserState,
        channel_id: &str,
    ) -> HubResult<()> {
        authz::require(role, state, Capability::ManageChannels)?;
        self.fetch_owned(channel_id, owner_id).await?;

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM channel_stats_snapshots WHERE channel_id = ?")
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM channels WHERE id = ?")
            .bind(channel_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn fetch_owned(&self, channel_id: &str, owner_id: &str) -> HubResult<Channel> {
        let row = sqlx::query("SELECT * FROM channels WHERE id = ?")
            .bind(channel_id)
            .fetch_optional(&self.db)
            .await?;
        let channel = match row {
            Some(row) => parse_channel_row(&row)?,
            None => {
                return Err(HubError::NotFound(format!(
                    "No channel with id {}",
                    channel_id
                )))
            }
        };
        if channel.user_id != owner_id {
            return Err(HubError::Unauthorized(
                "Channel belongs to another account".to_string(),
            ));
        }
        Ok(channel)
    }
}

fn parse_channel_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<Channel> {
    Ok(Channel {
        id: row.get("id"),
        user_id: row.get("user_id"),
        channel_url: row.get("channel_url"),
        channel_name: row.get("channel_name"),
        channel_niche: row.get("channel_niche"),
        channel_role: row.get("channel_role"),
        subscriber_count: row.get("subscriber_count"),
        view_count: row.get("view_count"),
        video_count: row.get("video_count"),
        last_synced_at: row.get("last_synced_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
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

    fn new_channel(url: &str) -> NewChannel {
        NewChannel {
            channel_url: url.to_string(),
            channel_name: Some("Main".to_string()),
            channel_niche: None,
            channel_role: None,
        }
    }

    #[tokio::test]
    async fn test_add_and_list_channels() {
        let pool = memory_pool().await;
        let manager = ChannelManager::new(pool.clone());
        insert_profile(&pool, "owner").await;

        manager
            .add_channel(
                "owner",
                Role::User,
                UserState::Approved,
                new_channel("https://example.com/c/main"),
            )
            .await
            .unwrap();

        let channels = manager.list_channels("owner").await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].channel_name.as_deref(), Some("Main"));
        assert!(channels[0].subscriber_count.is_none());
    }

    #[tokio::test]
    async fn test_unapproved_cannot_add() {
        let pool = memory_pool().await;
        let manager = ChannelManager::new(pool.clone());
        insert_profile(&pool, "owner").await;

        let err = manager
            .add_channel(
                "owner",
                Role::User,
                UserState::Registered,
                new_channel("https://example.com/c/main"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_record_stats_appends_snapshot() {
        let pool = memory_pool().await;
        let manager = ChannelManager::new(pool.clone());
        insert_profile(&pool, "owner").await;
        let channel = manager
            .add_channel(
                "owner",
                Role::User,
                UserState::Approved,
                new_channel("https://example.com/c/main"),
            )
            .await
            .unwrap();

        for count in [100, 150] {
            manager
                .record_stats(
                    "owner",
                    Role::User,
                    UserState::Approved,
                    &channel.id,
                    ChannelStats {
                        subscriber_count: Some(count),
                        view_count: Some(count * 10),
                        video_count: Some(3),
                    },
                )
                .await
                .unwrap();
        }

        let channels = manager.list_channels("owner").await.unwrap();
        assert_eq!(channels[0].subscriber_count, Some(150));
        assert!(channels[0].last_synced_at.is_some());

        let snapshots = manager.snapshots("owner", &channel.id, 30).await.unwrap();
        assert_eq!(snapshots.len(), 2);
        // Oldest first
        assert_eq!(snapshots[0].subscriber_count, Some(100));
    }

    #[tokio::test]
    async fn test_cannot_touch_foreign_channel() {
        let pool = memory_pool().await;
        let manager = ChannelManager::new(pool.clone());
        insert_profile(&pool, "owner").await;
        insert_profile(&pool, "other").await;
        let channel = manager
            .add_channel(
                "owner",
                Role::User,
                UserState::Approved,
                new_channel("https://example.com/c/main"),
            )
            .await
            .unwrap();

        let err = manager
            .record_stats(
                "other",
                Role::User,
                UserState::Approved,
                &channel.id,
                ChannelStats {
                    subscriber_count: Some(1),
                    view_count: None,
                    video_count: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Unauthorized(_)));

        let err = manager
            .delete_channel("other", Role::User, UserState::Approved, &channel.id)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_snapshots() {
        let pool = memory_pool().await;
        let manager = ChannelManager::new(pool.clone());
        insert_profile(&pool, "owner").await;
        let channel = manager
            .add_channel(
                "owner",
                Role::User,
                UserState::Approved,
                new_channel("https://example.com/c/main"),
            )
            .await
            .unwrap();
        manager
            .record_stats(
                "owner",
                Role::User,
                UserState::Approved,
                &channel.id,
                ChannelStats {
                    subscriber_count: Some(1),
                    view_count: None,
                    video_count: None,
                },
            )
            .await
            .unwrap();

        manager
            .delete_channel("owner", Role::User, UserState::Approved, &channel.id)
            .await
            .unwrap();

        assert!(manager.list_channels("owner").await.unwrap().is_empty());
        let err = manager.snapshots("owner", &channel.id, 30).await.unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let pool = memory_pool().await;
        let manager = ChannelManager::new(pool.clone());
        insert_profile(&pool, "owner").await;

        let err = manager
            .add_channel(
                "owner",
                Role::User,
                UserState::Approved,
                new_channel("not a url"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Validation(_)));
    }
}
