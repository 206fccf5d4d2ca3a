//! Profile repository for database operations

use async_trait::async_trait;
use sqlx::PgPool;

use crate::core::db::models::{AwardError, NewProfile, Profile, UpdateProfile};
use crate::core::db::store::ProfileStore;

const PROFILE_COLUMNS: &str = "id, user_id, created_dt, pin_sprite, geopin_sprite, \
     unlocked_pins, unlocked_geopins, achievements, pic_id, money, rating";

/// Profile repository error types
#[derive(Debug, thiserror::Error)]
pub enum ProfileRepositoryError {
    #[error("Profile not found")]
    NotFound,

    #[error("Profile for user {0} already exists")]
    AlreadyExists(i64),

    #[error(transparent)]
    Award(#[from] AwardError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// PostgreSQL-backed profile store
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn list(&self) -> Result<Vec<Profile>, ProfileRepositoryError> {
        let profiles = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(profiles)
    }

    async fn find_by_user_id(
        &self,
        user_id: i64,
    ) -> Result<Option<Profile>, ProfileRepositoryError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn create(&self, new_profile: &NewProfile) -> Result<Profile, ProfileRepositoryError> {
        if self.find_by_user_id(new_profile.user_id).await?.is_some() {
            return Err(ProfileRepositoryError::AlreadyExists(new_profile.user_id));
        }

        let profile = sqlx::query_as::<_, Profile>(&format!(
            "INSERT INTO profiles (user_id, pic_id) VALUES ($1, $2) RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(new_profile.user_id)
        .bind(new_profile.pic_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ProfileRepositoryError::AlreadyExists(new_profile.user_id)
            }
            _ => ProfileRepositoryError::DatabaseError(e),
        })?;

        Ok(profile)
    }

    async fn update(
        &self,
        user_id: i64,
        updates: &UpdateProfile,
    ) -> Result<Profile, ProfileRepositoryError> {
        // pic_id needs to tell "leave as is" apart from "set to null"
        let (touch_pic, pic_id) = match updates.pic_id {
            Some(value) => (true, value),
            None => (false, None),
        };

        let profile = sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles
            SET
                pin_sprite = COALESCE($2, pin_sprite),
                geopin_sprite = COALESCE($3, geopin_sprite),
                pic_id = CASE WHEN $4 THEN $5 ELSE pic_id END
            WHERE user_id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(updates.pin_sprite)
        .bind(updates.geopin_sprite)
        .bind(touch_pic)
        .bind(pic_id)
        .fetch_optional(&self.pool)
        .await?;

        profile.ok_or(ProfileRepositoryError::NotFound)
    }

    async fn update_progress(
        &self,
        user_id: i64,
        change: &mut (dyn for<'p> FnMut(&'p mut Profile) -> Result<(), AwardError> + Send),
    ) -> Result<Profile, ProfileRepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Row lock keeps concurrent award requests from overwriting each other
        let mut profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ProfileRepositoryError::NotFound)?;

        change(&mut profile)?;

        let saved = sqlx::query_as::<_, Profile>(&format!(
            r#"
            UPDATE profiles
            SET
                unlocked_pins = $2,
                unlocked_geopins = $3,
                achievements = $4,
                money = $5,
                rating = $6
            WHERE user_id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(profile.unlocked_pins.to_string())
        .bind(profile.unlocked_geopins.to_string())
        .bind(profile.achievements.to_string())
        .bind(profile.money)
        .bind(profile.rating)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(saved)
    }

    async fn delete(&self, user_id: i64) -> Result<bool, ProfileRepositoryError> {
        let result = sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<(), ProfileRepositoryError> {
        crate::core::db::pool::health_check(&self.pool).await?;

        Ok(())
    }
}
