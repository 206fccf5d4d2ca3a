//! User repository for database operations
//!
//! Users are inserted together with their profile and deleted together with
//! it, each pair in a single transaction.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::core::db::models::{NewUser, Profile, User};
use crate::core::db::store::UserStore;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_superuser, date_joined";

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    /// A profile was created for this user id before the user existed
    #[error("Profile for user {0} already exists")]
    ProfileAlreadyExists(i64),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// PostgreSQL-backed user store
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn create_with_profile(
        &self,
        new_user: &NewUser,
    ) -> Result<(User, Profile), UserRepositoryError> {
        if self.find_by_username(&new_user.username).await?.is_some() {
            return Err(UserRepositoryError::UsernameAlreadyExists);
        }

        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, is_superuser)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.is_superuser)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                UserRepositoryError::UsernameAlreadyExists
            }
            _ => UserRepositoryError::DatabaseError(e),
        })?;

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id)
            VALUES ($1)
            RETURNING id, user_id, created_dt, pin_sprite, geopin_sprite,
                      unlocked_pins, unlocked_geopins, achievements, pic_id, money, rating
            "#,
        )
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                tracing::warn!("New user {} collides with an existing profile", user.id);
                UserRepositoryError::ProfileAlreadyExists(user.id)
            }
            _ => UserRepositoryError::DatabaseError(e),
        })?;

        tx.commit().await?;

        Ok((user, profile))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserRepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list(&self, limit: Option<i64>, offset: i64) -> Result<Vec<User>, UserRepositoryError> {
        // LIMIT NULL means no limit in PostgreSQL
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn count(&self) -> Result<i64, UserRepositoryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<(), UserRepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(UserRepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, UserRepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
