/// Account manager implementation using runtime queries
use crate::{
    account::{Profile, Session, UserState, ValidatedSession},
    config::ServerConfig,
    error::{HubError, HubResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Register a new account. The profile starts in state REGISTERED.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> HubResult<Profile> {
        let email = email.trim().to_lowercase();

        if self.email_exists(&email).await? {
            return Err(HubError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO profiles (id, email, full_name, avatar_url, password_hash, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(&email)
        .bind(&full_name)
        .bind(&password_hash)
        .bind(UserState::Registered.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(HubError::Database)?;

        Ok(Profile {
            id,
            email,
            full_name,
            avatar_url: None,
            password_hash,
            state: UserState::Registered,
            created_at: now,
            updated_at: now,
        })
    }

    /// Authenticate account and create a session
    pub async fn login(&self, email: &str, password: &str) -> HubResult<(Profile, Session)> {
        let profile = self
            .get_profile_by_email(&email.trim().to_lowercase())
            .await
            .map_err(|_| HubError::Authentication("Invalid credentials".to_string()))?;

        if !verify_password(password, &profile.password_hash)? {
            return Err(HubError::Authentication("Invalid credentials".to_string()));
        }

        // Suspended accounts may still sign in; the capability table reduces
        // them to read-only.
        let session = self.create_session(&profile.id).await?;

        Ok((profile, session))
    }

    /// Create a session for a user
    pub async fn create_session(&self, user_id: &str) -> HubResult<Session> {
        let session_id = Uuid::new_v4().to_string();

        let access_token = self.generate_token(user_id, &session_id, "access")?;
        let refresh_token = self.generate_token(user_id, &session_id, "refresh")?;

        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.config.authentication.access_token_ttl);

        sqlx::query(
            "INSERT INTO sessions (id, user_id, access_token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(&access_token)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(HubError::Database)?;

        let refresh_expires =
            now + Duration::seconds(self.config.authentication.refresh_token_ttl);

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token, created_at, expires_at, used)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&refresh_token)
        .bind(now)
        .bind(refresh_expires)
        .execute(&self.db)
        .await
        .map_err(HubError::Database)?;

        Ok(Session {
            id: session_id,
            user_id: user_id.to_string(),
            access_token,
            refresh_token,
            created_at: now,
            expires_at,
        })
    }

    /// Validate an access token and return session info
    pub async fn validate_access_token(&self, token: &str) -> HubResult<ValidatedSession> {
        let row = sqlx::query("SELECT id, user_id, expires_at FROM sessions WHERE access_token = ?1")
            .bind(token)
            .fetch_optional(&self.db)
            .await
            .map_err(HubError::Database)?
            .ok_or_else(|| HubError::Authentication("Invalid or expired session".to_string()))?;

        let expires_at: DateTime<Utc> = row.get("expires_at");
        if Utc::now() > expires_at {
            return Err(HubError::Authentication("Session expired".to_string()));
        }

        Ok(ValidatedSession {
            user_id: row.get("user_id"),
            session_id: row.get("id"),
        })
    }

    /// Delete a session (sign-out)
    pub async fn delete_session(&self, session_id: &str) -> HubResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await
            .map_err(HubError::Database)?;

        Ok(())
    }

    /// Exchange a refresh token for a fresh session. Refresh tokens are
    /// single-use.
    pub async fn refresh_session(&self, refresh_token: &str) -> HubResult<Session> {
        let row = sqlx::query(
            "SELECT id, user_id, expires_at, used FROM refresh_tokens WHERE token = ?1",
        )
        .bind(refresh_token)
        .fetch_optional(&self.db)
        .await
        .map_err(HubError::Database)?
        .ok_or_else(|| HubError::Authentication("Invalid refresh token".to_string()))?;

        let token_id: String = row.get("id");
        let user_id: String = row.get("user_id");
        let expires_at: DateTime<Utc> = row.get("expires_at");
        let used: bool = row.get("used");

        if used {
            return Err(HubError::Authentication(
                "Refresh token already used".to_string(),
            ));
        }

        if Utc::now() > expires_at {
            return Err(HubError::Authentication("Refresh token expired".to_string()));
        }

        sqlx::query("UPDATE refresh_tokens SET used = 1, used_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(&token_id)
            .execute(&self.db)
            .await
            .map_err(HubError::Database)?;

        self.create_session(&user_id).await
    }

    /// Get profile by user id
    pub async fn get_profile(&self, user_id: &str) -> HubResult<Profile> {
        let row = sqlx::query(
            "SELECT id, email, full_name, avatar_url, password_hash, state, created_at, updated_at
             FROM profiles WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(HubError::Database)?
        .ok_or_else(|| HubError::NotFound("Account not found".to_string()))?;

        parse_profile_row(&row)
    }

    /// Get profile by email
    pub async fn get_profile_by_email(&self, email: &str) -> HubResult<Profile> {
        let row = sqlx::query(
            "SELECT id, email, full_name, avatar_url, password_hash, state, created_at, updated_at
             FROM profiles WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(HubError::Database)?
        .ok_or_else(|| HubError::NotFound("Account not found".to_string()))?;

        parse_profile_row(&row)
    }

    /// Update owner-editable profile fields
    pub async fn update_profile(
        &self,
        user_id: &str,
        full_name: Option<String>,
        avatar_url: Option<String>,
    ) -> HubResult<Profile> {
        let result = sqlx::query(
            "UPDATE profiles
             SET full_name = COALESCE(?1, full_name),
                 avatar_url = COALESCE(?2, avatar_url),
                 updated_at = ?3
             WHERE id = ?4",
        )
        .bind(&full_name)
        .bind(&avatar_url)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(HubError::Database)?;

        if result.rows_affected() == 0 {
            return Err(HubError::NotFound("Account not found".to_string()));
        }

        self.get_profile(user_id).await
    }

    /// List all profiles, newest first (admin panel user tab)
    pub async fn list_profiles(&self) -> HubResult<Vec<Profile>> {
        let rows = sqlx::query(
            "SELECT id, email, full_name, avatar_url, password_hash, state, created_at, updated_at
             FROM profiles ORDER BY created_at DESC",
        )
        .fetch_all(&self.db)
        .await
        .map_err(HubError::Database)?;

        rows.iter().map(parse_profile_row).collect()
    }

    /// Delete expired sessions and spent/expired refresh tokens.
    /// Returns (sessions deleted, refresh tokens deleted).
    pub async fn cleanup_expired_sessions(&self) -> HubResult<(u64, u64)> {
        let now = Utc::now();

        let sessions = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(HubError::Database)?
            .rows_affected();

        let tokens = sqlx::query("DELETE FROM refresh_tokens WHERE used = 1 OR expires_at < ?1")
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(HubError::Database)?
            .rows_affected();

        Ok((sessions, tokens))
    }

    /// Whether the email is in the configured bootstrap admin list
    pub fn is_bootstrap_admin(&self, email: &str) -> bool {
        self.config
            .authentication
            .admin_emails
            .iter()
            .any(|e| e == &email.to_lowercase())
    }

    fn generate_token(&self, user_id: &str, session_id: &str, scope: &str) -> HubResult<String> {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let ttl = match scope {
            "refresh" => self.config.authentication.refresh_token_ttl,
            _ => self.config.authentication.access_token_ttl,
        };

        let claims = serde_json::json!({
            "sub": user_id,
            "sid": session_id,
            "scope": scope,
            "iat": Utc::now().timestamp(),
            "exp": (Utc::now() + Duration::seconds(ttl)).timestamp(),
            "jti": Uuid::new_v4().to_string(),
        });

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| HubError::Internal(format!("Token generation failed: {}", e)))
    }

    async fn email_exists(&self, email: &str) -> HubResult<bool> {
        let row = sqlx::query("SELECT 1 FROM profiles WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .map_err(HubError::Database)?;

        Ok(row.is_some())
    }
}

/// Parse a profiles row into a Profile
pub(crate) fn parse_profile_row(row: &sqlx::sqlite::SqliteRow) -> HubResult<Profile> {
    let state_str: String = row.get("state");

    Ok(Profile {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        avatar_url: row.get("avatar_url"),
        password_hash: row.get("password_hash"),
        state: UserState::from_str(&state_str)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Hash a password with Argon2id
fn hash_password(password: &str) -> HubResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| HubError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored hash
fn verify_password(password: &str, hash: &str) -> HubResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| HubError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_pool;

    fn test_config() -> Arc<ServerConfig> {
        let config = ServerConfig {
            service: crate::config::ServiceConfig {
                hostname: "localhost".to_string(),
                port: 0,
                version: "test".to_string(),
                document_upload_limit: 1024,
            },
            storage: crate::config::StorageConfig {
                data_directory: "./data".into(),
                database: ":memory:".into(),
                document_directory: "./data/documents".into(),
            },
            authentication: crate::config::AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                access_token_ttl: 3600,
                refresh_token_ttl: 86400,
                admin_emails: vec!["root@example.com".to_string()],
            },
            rate_limit: crate::config::RateLimitSettings {
                enabled: false,
                authenticated_rps: 100,
                unauthenticated_rps: 10,
                admin_rps: 1000,
                burst_size: 50,
            },
            logging: crate::config::LoggingConfig {
                level: "info".to_string(),
            },
        };
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_register_starts_registered() {
        let manager = AccountManager::new(memory_pool().await, test_config());

        let profile = manager
            .register("alice@example.com", "hunter2hunter2", Some("Alice".to_string()))
            .await
            .unwrap();

        assert_eq!(profile.state, UserState::Registered);
        assert_eq!(profile.email, "alice@example.com");
        assert!(profile.full_name.as_deref() == Some("Alice"));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let manager = AccountManager::new(memory_pool().await, test_config());

        manager
            .register("bob@example.com", "hunter2hunter2", None)
            .await
            .unwrap();
        let err = manager
            .register("Bob@Example.com", "hunter2hunter2", None)
            .await
            .unwrap_err();

        assert!(matches!(err, HubError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let manager = AccountManager::new(memory_pool().await, test_config());

        manager
            .register("carol@example.com", "hunter2hunter2", None)
            .await
            .unwrap();

        let (profile, session) = manager
            .login("carol@example.com", "hunter2hunter2")
            .await
            .unwrap();

        let validated = manager
            .validate_access_token(&session.access_token)
            .await
            .unwrap();
        assert_eq!(validated.user_id, profile.id);

        let err = manager
            .login("carol@example.com", "wrong-password")
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_refresh_token_single_use() {
        let manager = AccountManager::new(memory_pool().await, test_config());

        manager
            .register("dave@example.com", "hunter2hunter2", None)
            .await
            .unwrap();
        let (_, session) = manager
            .login("dave@example.com", "hunter2hunter2")
            .await
            .unwrap();

        let refreshed = manager.refresh_session(&session.refresh_token).await.unwrap();
        assert_ne!(refreshed.access_token, session.access_token);

        // Second use of the same refresh token is rejected
        let err = manager
            .refresh_session(&session.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_sign_out_invalidates_session() {
        let manager = AccountManager::new(memory_pool().await, test_config());

        manager
            .register("erin@example.com", "hunter2hunter2", None)
            .await
            .unwrap();
        let (_, session) = manager
            .login("erin@example.com", "hunter2hunter2")
            .await
            .unwrap();

        manager.delete_session(&session.id).await.unwrap();

        assert!(manager
            .validate_access_token(&session.access_token)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_profile_fields() {
        let manager = AccountManager::new(memory_pool().await, test_config());

        let profile = manager
            .register("frank@example.com", "hunter2hunter2", None)
            .await
            .unwrap();

        let updated = manager
            .update_profile(
                &profile.id,
                Some("Frank".to_string()),
                Some("https://cdn.example.com/frank.png".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(updated.full_name.as_deref(), Some("Frank"));
        assert_eq!(
            updated.avatar_url.as_deref(),
            Some("https://cdn.example.com/frank.png")
        );

        let err = manager
            .update_profile("missing", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_bootstrap_admin_list() {
        let manager = AccountManager::new(memory_pool().await, test_config());
        assert!(manager.is_bootstrap_admin("root@example.com"));
        assert!(manager.is_bootstrap_admin("Root@Example.com"));
        assert!(!manager.is_bootstrap_admin("alice@example.com"));
    }
}
