/// Task tracking
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

/// Task progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> HubResult<Self> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(HubError::Validation(format!("Invalid task status: {}", s))),
        }
    }
}

/// A task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub created_by: String,
    pub assigned_to: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: String,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a task
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Manages the tasks table
#[derive(Debug, Clone)]
pub struct TaskManager {
    db: SqlitePool,
}

impl TaskManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create_task(
        &self,
        creator_id: &str,
        role: Role,
        state: UserState,
        request: NewTask,
    ) -> HubResult<Task> {
        authz::require(role, state, Capability::ManageTeam)?;
        request
            .validate()
            .map_err(|e| HubError::Validation(e.to_string()))?;

        if let Some(assignee) = &request.assigned_to {
            let row = sqlx::query("SELECT id FROM profiles WHERE id = ?")
                .bind(assignee)
                .fetch_optional(&self.db)
                .await?;
            if row.is_none() {
                return Err(HubError::NotFound(format!(
                    "No account with id {}",
                    assignee
                )));
            }
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let priority = request.priority.unwrap_or_else(|| "medium".to_string());

        sqlx::query(
            "INSERT INTO tasks
             (id, created_by, assigned_to, title, description, status, priority, due_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'todo', ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(creator_id)
        .bind(&request.assigned_to)
        .bind(&request.title)
        .bind(&request.description)
        .bind(&priority)
        .bind(request.due_date)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(Task {
            id,
            created_by: creator_id.to_string(),
            assigned_to: request.assigned_to,
            title: request.title,
            description: request.description,
            status: TaskStatus::Todo,
            priority,
            due_date: request.due_date,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Tasks the user created or is assigned to, newest first
    pub async fn list_tasks(&self, user_id: &str) -> HubResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE created_by = ? OR assigned_to = ?
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_task_row).collect()
    }

    /// Move a task to a new status. The creator and the assignee may do
    /// this; completion stamps completed_at, reopening clears it.
    pub async fn update_status(
        &self,
        actor_id: &str,
        task_id: &str,
        status: TaskStatus,
    ) -> HubResult<Task> {
        let task = self.fetch(task_id).await?;
        let is_participant =
            task.created_by == actor_id || task.assigned_to.as_deref() == Some(actor_id);
        if !is_participant {
            return Err(HubError::Unauthorized(
                "Task belongs to another account".to_string(),
            ));
        }

        let now = Utc::now();
        let completed_at = if status == TaskStatus::Done {
            Some(now)
        } else {
            None
        };

        sqlx::query(
            "UPDATE tasks SET status = ?, completed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(completed_at)
        .bind(now)
        .bind(task_id)
        .execute(&self.db)
        .await?;

        self.fetch(task_id).await
    }

    /// Delete a task. Creator only.
    pub async fn delete_task(&self, actor_id: &str, task_id: &str) -> HubResult<()> {
        let task = self.fetch(task_id).await?;
        if task.created_by != actor_id {
            return Err(HubError::Unauthorized(
                "Only the task creator may delete it".to_string(),
            ));
        }

        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn fetch(&self, task_id: &str) -> HubResult<Task> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.db)
            .await?;
        match row {
            Some(row) => parse_task_row(&row),
            None => Err(HubError::NotFound(format!("No task with id {}", task_id))),
        }
    }
}

fn parse_task_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<Task> {
    Ok(Task {
        id: row.get("id"),
        created_by: row.get("created_by"),
        assigned_to: row.get("assigned_to"),
        title: row.get("title"),
        description: row.get("description"),
        status: TaskStatus::from_str(row.get("status"))?,
        priority: row.get("priority"),
        due_date: row.get("due_date"),
        completed_at: row.get("completed_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
