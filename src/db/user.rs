/// User records and the queries over them
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

const USER_COLUMNS: &str = "id, username, email, password_hash, name, is_email_verified, \
     email_verified_at, created_at, bio, location, occupation, organization, slack_username, \
     need_mentoring, available_to_mentor";

/// User record in the database
#[derive(Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub is_email_verified: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub organization: Option<String>,
    pub slack_username: Option<String>,
    pub need_mentoring: bool,
    pub available_to_mentor: bool,
}

// Keeps the password hash out of logs
impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("is_email_verified", &self.is_email_verified)
            .finish_non_exhaustive()
    }
}

/// Values for a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
}

/// Field changes for a profile update; `None` leaves a column untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub occupation: Option<String>,
    pub organization: Option<String>,
    pub slack_username: Option<String>,
    pub need_mentoring: Option<bool>,
    pub available_to_mentor: Option<bool>,
}

/// Mentorship relation counts by state for one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationCounts {
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub cancelled: i64,
    pub completed: i64,
}

/// Credential store over the `users` table
#[derive(Clone)]
pub struct UserStore {
    db: SqlitePool,
}

impl UserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert a new, unverified user
    ///
    /// A UNIQUE violation on username or email is reported as
    /// `DuplicateAccount`, which also covers two registrations racing.
    pub async fn insert(&self, new_user: NewUser) -> ApiResult<User> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, name, is_email_verified, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.name)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::Internal(format!("User {} vanished after insert", id)))
    }

    /// Get user by id
    pub async fn get_by_id(&self, id: i64) -> ApiResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> ApiResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// Get user by email (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// Find user by username or email
    pub async fn find_by_identifier(&self, identifier: &str) -> ApiResult<Option<User>> {
        // Try username first
        if let Some(user) = self.get_by_username(identifier).await? {
            return Ok(Some(user));
        }

        self.get_by_email(identifier).await
    }

    /// Check whether a username is held by an account other than `except`
    pub async fn username_taken(&self, username: &str, except: Option<i64>) -> ApiResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?1 AND id != ?2")
                .bind(username)
                .bind(except.unwrap_or(-1))
                .fetch_one(&self.db)
                .await?;

        Ok(count > 0)
    }

    /// Check whether an email is held by an account other than `except`
    pub async fn email_taken(&self, email: &str, except: Option<i64>) -> ApiResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1 AND id != ?2")
                .bind(email)
                .bind(except.unwrap_or(-1))
                .fetch_one(&self.db)
                .await?;

        Ok(count > 0)
    }

    /// Apply profile changes; returns false if the user does not exist
    pub async fn update_profile(&self, id: i64, changes: &ProfileChanges) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET
                username = COALESCE(?1, username),
                email = COALESCE(?2, email),
                name = COALESCE(?3, name),
                bio = COALESCE(?4, bio),
                location = COALESCE(?5, location),
                occupation = COALESCE(?6, occupation),
                organization = COALESCE(?7, organization),
                slack_username = COALESCE(?8, slack_username),
                need_mentoring = COALESCE(?9, need_mentoring),
                available_to_mentor = COALESCE(?10, available_to_mentor)
             WHERE id = ?11",
        )
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.name)
        .bind(&changes.bio)
        .bind(&changes.location)
        .bind(&changes.occupation)
        .bind(&changes.organization)
        .bind(&changes.slack_username)
        .bind(changes.need_mentoring)
        .bind(changes.available_to_mentor)
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(map_unique_violation)?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored password hash
    pub async fn update_password(&self, id: i64, password_hash: &str) -> ApiResult<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ?1 WHERE id = ?2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip the verified flag if it is still false
    ///
    /// Returns false when the row was already verified (or is gone), so of
    /// two concurrent confirmations only one observes the transition.
    pub async fn mark_email_verified(&self, id: i64, at: DateTime<Utc>) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET is_email_verified = 1, email_verified_at = ?1
             WHERE id = ?2 AND is_email_verified = 0",
        )
        .bind(at)
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Hard delete; relations cascade
    pub async fn delete(&self, id: i64) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List users other than `exclude_id`, ordered by id
    pub async fn list(&self, exclude_id: i64, verified_only: bool) -> ApiResult<Vec<User>> {
        let sql = if verified_only {
            format!(
                "SELECT {} FROM users WHERE id != ?1 AND is_email_verified = 1 ORDER BY id",
                USER_COLUMNS
            )
        } else {
            format!("SELECT {} FROM users WHERE id != ?1 ORDER BY id", USER_COLUMNS)
        };

        let users = sqlx::query_as::<_, User>(&sql)
            .bind(exclude_id)
            .fetch_all(&self.db)
            .await?;

        Ok(users)
    }

    /// Count the user's mentorship relations by state
    pub async fn relation_counts(&self, user_id: i64) -> ApiResult<RelationCounts> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT state, COUNT(*) FROM mentorship_relation
             WHERE sender_id = ?1 OR receiver_id = ?1
             GROUP BY state",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        let mut counts = RelationCounts::default();
        for (state, count) in rows {
            match state.as_str() {
                "pending" => counts.pending = count,
                "accepted" => counts.accepted = count,
                "rejected" => counts.rejected = count,
                "cancelled" => counts.cancelled = count,
                "completed" => counts.completed = count,
                other => tracing::warn!(state = other, "Unknown relation state"),
            }
        }

        Ok(counts)
    }
}

fn map_unique_violation(e: sqlx::Error) -> ApiError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            ApiError::DuplicateAccount
        }
        other => ApiError::Database(other),
    }
}
