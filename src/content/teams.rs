/// Teams and membership
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

/// A creator team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A membership row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub team_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

/// Request to create a team
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTeam {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// Manages teams and team_members
#[derive(Debug, Clone)]
pub struct TeamManager {
    db: SqlitePool,
}

impl TeamManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a team. The owner also gets a membership row so member
    /// listings always include them.
    pub async fn create_team(
        &self,
        owner_id: &str,
        role: Role,
        state: UserState,
        request: NewTeam,
    ) -> HubResult<Team> {
        authz::require(role, state, Capability::ManageTeam)?;
        request
            .validate()
            .map_err(|e| HubError::Validation(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO teams (id, owner_id, name, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO team_members (id, team_id, user_id, role, joined_at)
             VALUES (?, ?, ?, 'owner', ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(owner_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Team {
            id,
            owner_id: owner_id.to_string(),
            name: request.name,
            description: request.description,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Teams the user belongs to (owned or joined)
    pub async fn list_teams(&self, user_id: &str) -> HubResult<Vec<Team>> {
        let rows = sqlx::query(
            "SELECT DISTINCT t.* FROM teams t
             JOIN team_members m ON m.team_id = t.id
             WHERE m.user_id = ?
             ORDER BY t.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_team_row).collect()
    }

    /// Members of a team. The requester must belong to the team.
    pub async fn members(&self, requester_id: &str, team_id: &str) -> HubResult<Vec<TeamMember>> {
        self.require_membership(requester_id, team_id).await?;

        let rows = sqlx::query(
            "SELECT * FROM team_members WHERE team_id = ? ORDER BY joined_at ASC",
        )
        .bind(team_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(parse_member_row).collect()
    }

    /// Add a member. Only the team owner may do this.
    pub async fn add_member(
        &self,
        actor_id: &str,
        role: Role,
        state: UserState,
        team_id: &str,
        member_user_id: &str,
        member_role: &str,
    ) -> HubResult<TeamMember> {
        authz::require(role, state, Capability::ManageTeam)?;
        self.require_ownership(actor_id, team_id).await?;

        let member = sqlx::query("SELECT id FROM profiles WHERE id = ?")
            .bind(member_user_id)
            .fetch_optional(&self.db)
            .await?;
        if member.is_none() {
            return Err(HubError::NotFound(format!(
                "No account with id {}",
                member_user_id
            )));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO team_members (id, team_id, user_id, role, joined_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(team_id)
        .bind(member_user_id)
        .bind(member_role)
        .bind(now)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(TeamMember {
                id,
                team_id: team_id.to_string(),
                user_id: member_user_id.to_string(),
                role: member_role.to_string(),
                joined_at: now,
            }),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(HubError::Conflict(
                "Already a member of this team".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a member. Only the team owner may do this, and the owner's
    /// own membership cannot be removed.
    pub async fn remove_member(
        &self,
        actor_id: &str,
        role: Role,
        state: UserState,
        team_id: &str,
        member_user_id: &str,
    ) -> HubResult<()> {
        authz::require(role, state, Capability::ManageTeam)?;
        self.require_ownership(actor_id, team_id).await?;

        if member_user_id == actor_id {
            return Err(HubError::Validation(
                "The team owner cannot be removed".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(team_id)
            .bind(member_user_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(HubError::NotFound("Not a member of this team".to_string()));
        }

        Ok(())
    }

    /// Delete a team and its memberships
    pub async fn delete_team(
        &self,
        actor_id: &str,
        role: Role,
        state: UserState,
        team_id: &str,
    ) -> HubResult<()> {
        authz::require(role, state, Capability::ManageTeam)?;
        self.require_ownership(actor_id, team_id).await?;

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM team_members WHERE team_id = ?")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM teams WHERE id = ?")
            .bind(team_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn require_ownership(&self, actor_id: &str, team_id: &str) -> HubResult<()> {
        let row = sqlx::query("SELECT owner_id FROM teams WHERE id = ?")
            .bind(team_id)
            .fetch_optional(&self.db)
            .await?;
        match row {
            None => Err(HubError::NotFound(format!("No team with id {}", team_id))),
            Some(row) => {
                let owner_id: String = row.get("owner_id");
                if owner_id == actor_id {
                    Ok(())
                } else {
                    Err(HubError::Unauthorized(
                        "Only the team owner may do this".to_string(),
                    ))
                }
            }
        }
    }

    async fn require_membership(&self, user_id: &str, team_id: &str) -> HubResult<()> {
        let team = sqlx::query("SELECT id FROM teams WHERE id = ?")
            .bind(team_id)
            .fetch_optional(&self.db)
            .await?;
        if team.is_none() {
            return Err(HubError::NotFound(format!("No team with id {}", team_id)));
        }

        let row = sqlx::query("SELECT id FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(team_id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        if row.is_none() {
            return Err(HubError::Unauthorized(
                "Not a member of this team".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_team_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<Team> {
    Ok(Team {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        description: row.get("description"),
        avatar_url: row.get("avatar_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn parse_member_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<TeamMember> {
    Ok(TeamMember {
        id: row.get("id"),
        team_id: row.get("team_id"),
        user_id: row.get("user_id"),
        role: row.get("role"),
        joined_at: row.get("joined_at"),
    })
}
