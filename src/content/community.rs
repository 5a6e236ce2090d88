/// Community discussions and replies
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

/// A discussion thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discussion {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reply within a thread
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionReply {
    pub id: String,
    pub discussion_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to open a discussion
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewDiscussion {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    pub category: Option<String>,
}

/// Manages discussions and discussion_replies
#[derive(Debug, Clone)]
pub struct CommunityManager {
    db: SqlitePool,
}

impl CommunityManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create_discussion(
        &self,
        author_id: &str,
        role: Role,
        state: UserState,
        request: NewDiscussion,
    ) -> HubResult<Discussion> {
        authz::require(role, state, Capability::ParticipateCommunity)?;
        request
            .validate()
            .map_err(|e| HubError::Validation(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let category = request.category.unwrap_or_else(|| "general".to_string());

        sqlx::query(
            "INSERT INTO discussions (id, author_id, title, content, category, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(author_id)
        .bind(&request.title)
        .bind(&request.content)
        .bind(&category)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Discussion {
            id,
            author_id: author_id.to_string(),
            title: request.title,
            content: request.content,
            category,
            is_pinned: false,
            is_locked: false,
            view_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Threads, pinned first then newest. Reading needs only a session.
    pub async fn list_discussions(
        &self,
        category: Option<&str>,
        limit: i64,
    ) -> HubResult<Vec<Discussion>> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    "SELECT * FROM discussions WHERE category = ?
                     ORDER BY is_pinned DESC, created_at DESC LIMIT ?",
                )
                .bind(category)
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM discussions ORDER BY is_pinned DESC, created_at DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.db)
                .await?
            }
        };

        rows.iter().map(parse_discussion_row).collect()
    }

    /// Fetch a thread and bump its view counter
    pub async fn get_discussion(&self, discussion_id: &str) -> HubResult<Discussion> {
        sqlx::query("UPDATE discussions SET view_count = view_count + 1 WHERE id = ?")
            .bind(discussion_id)
            .execute(&self.db)
            .await?;

        let row = sqlx::query("SELECT * FROM discussions WHERE id = ?")
            .bind(discussion_id)
            .fetch_optional(&self.db)
            .await?;
        match row {
            Some(row) => parse_discussion_row(&row),
            None => Err(HubError::NotFound(format!(
                "No discussion with id {}",
                discussion_id
            ))),
        }
    }

    pub async fn list_replies(&self, discussion_id: &str) -> HubResult<Vec<DiscussionReply>> {
        let rows = sqlx::query(
            "SELECT * FROM discussion_replies WHERE discussion_id = ? ORDER BY created_at ASC",
        )
        .bind(discussion_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_reply_row).collect()
    }

    pub async fn add_reply(
        &self,
        author_id: &str,
        role: Role,
        state: UserState,
        discussion_id: &str,
        content: &str,
    ) -> HubResult<DiscussionReply> {
        authz::require(role, state, Capability::ParticipateCommunity)?;
        if content.trim().is_empty() {
            return Err(HubError::Validation("Reply cannot be empty".to_string()));
        }

        let row = sqlx::query("SELECT is_locked FROM discussions WHERE id = ?")
            .bind(discussion_id)
            .fetch_optional(&self.db)
            .await?;
        match row {
            None => {
                return Err(HubError::NotFound(format!(
                    "No discussion with id {}",
                    discussion_id
                )))
            }
            Some(row) => {
                let locked: bool = row.get("is_locked");
                if locked {
                    return Err(HubError::Conflict("Discussion is locked".to_string()));
                }
            }
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO discussion_replies (id, discussion_id, author_id, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(discussion_id)
        .bind(author_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(DiscussionReply {
            id,
            discussion_id: discussion_id.to_string(),
            author_id: author_id.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Pin or unpin a thread. Admin-only.
    pub async fn set_pinned(
        &self,
        role: Role,
        state: UserState,
        discussion_id: &str,
        pinned: bool,
    ) -> HubResult<()> {
        authz::require(role, state, Capability::AccessAdminPanel)?;
        self.set_flag(discussion_id, "is_pinned", pinned).await
    }

    /// Lock or unlock a thread. Admin-only; locked threads reject replies.
    pub async fn set_locked(
        &self,
        role: Role,
        state: UserState,
        discussion_id: &str,
        locked: bool,
    ) -> HubResult<()> {
        authz::require(role, state, Capability::AccessAdminPanel)?;
        self.set_flag(discussion_id, "is_locked", locked).await
    }

    async fn set_flag(&self, discussion_id: &str, column: &str, value: bool) -> HubResult<()> {
        // column is a fixed identifier chosen by the caller, never user input
        let sql = format!(
            "UPDATE discussions SET {} = ?, updated_at = ? WHERE id = ?",
            column
        );
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(Utc::now())
            .bind(discussion_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HubError::NotFound(format!(
                "No discussion with id {}",
                discussion_id
            )));
        }
        Ok(())
    }
}

fn parse_discussion_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<Discussion> {
    Ok(Discussion {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        content: row.get("content"),
        category: row.get("category"),
        is_pinned: row.get("is_pinned"),
        is_locked: row.get("is_locked"),
        view_count: row.get("view_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn parse_reply_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<DiscussionReply> {
    Ok(DiscussionReply {
        id: row.get("id"),
        discussion_id: row.get("discussion_id"),
        author_id: row.get("author_id"),
        content: row.get("content"),
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

    async fn open_thread(manager: &CommunityManager, author: &str, title: &str) -> Discussion {
        manager
            .create_discussion(
                author,
                Role::User,
                UserState::Approved,
                NewDiscussion {
                    title: title.to_string(),
                    content: "body".to_string(),
                    category: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_reply() {
        let pool = memory_pool().await;
        let manager = CommunityManager::new(pool.clone());
        insert_profile(&pool, "alice").await;
        insert_profile(&pool, "bob").await;

        let thread = open_thread(&manager, "alice", "Thumbnails").await;
        manager
            .add_reply("bob", Role::User, UserState::Approved, &thread.id, "Use contrast")
            .await
            .unwrap();

        let replies = manager.list_replies(&thread.id).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].author_id, "bob");
    }

    #[tokio::test]
    async fn test_view_count_increments() {
        let pool = memory_pool().await;
        let manager = CommunityManager::new(pool.clone());
        insert_profile(&pool, "alice").await;

        let thread = open_thread(&manager, "alice", "Thumbnails").await;
        manager.get_discussion(&thread.id).await.unwrap();
        let again = manager.get_discussion(&thread.id).await.unwrap();
        assert_eq!(again.view_count, 2);
    }

    #[tokio::test]
    async fn test_pinned_threads_sort_first() {
        let pool = memory_pool().await;
        let manager = CommunityManager::new(pool.clone());
        insert_profile(&pool, "alice").await;

        let older = open_thread(&manager, "alice", "Older").await;
        open_thread(&manager, "alice", "Newer").await;

        manager
            .set_pinned(Role::Admin, UserState::Approved, &older.id, true)
            .await
            .unwrap();

        let listing = manager.list_discussions(None, 10).await.unwrap();
        assert_eq!(listing[0].title, "Older");
        assert!(listing[0].is_pinned);
    }

    #[tokio::test]
    async fn test_locked_thread_rejects_replies() {
        let pool = memory_pool().await;
        let manager = CommunityManager::new(pool.clone());
        insert_profile(&pool, "alice").await;

        let thread = open_thread(&manager, "alice", "Heated").await;
        manager
            .set_locked(Role::Admin, UserState::Approved, &thread.id, true)
            .await
            .unwrap();

        let err = manager
            .add_reply("alice", Role::User, UserState::Approved, &thread.id, "more")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_moderate() {
        let pool = memory_pool().await;
        let manager = CommunityManager::new(pool.clone());
        insert_profile(&pool, "alice").await;

        let thread = open_thread(&manager, "alice", "Thumbnails").await;
        let err = manager
            .set_locked(Role::Moderator, UserState::Approved, &thread.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_unapproved_cannot_participate() {
        let pool = memory_pool().await;
        let manager = CommunityManager::new(pool.clone());
        insert_profile(&pool, "alice").await;

        let err = manager
            .create_discussion(
                "alice",
                Role::User,
                UserState::Registered,
                NewDiscussion {
                    title: "hi".to_string(),
                    content: "body".to_string(),
                    category: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Unauthorized(_)));
    }
}
