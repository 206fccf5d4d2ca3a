//! Storage seams
//!
//! Handlers talk to the store through these traits so the same API runs on
//! PostgreSQL ([`super::repositories`]) or in memory ([`super::memory`]).

use async_trait::async_trait;

use super::models::{AwardError, NewProfile, NewUser, Profile, UpdateProfile, User};
use super::repositories::{ProfileRepositoryError, UserRepositoryError};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// All profiles ordered by id
    async fn list(&self) -> Result<Vec<Profile>, ProfileRepositoryError>;

    async fn find_by_user_id(&self, user_id: i64)
    -> Result<Option<Profile>, ProfileRepositoryError>;

    /// Fails with `AlreadyExists` if the user already has a profile
    async fn create(&self, new_profile: &NewProfile) -> Result<Profile, ProfileRepositoryError>;

    async fn update(
        &self,
        user_id: i64,
        updates: &UpdateProfile,
    ) -> Result<Profile, ProfileRepositoryError>;

    /// Apply `change` to the current row and persist award lists, money and
    /// rating atomically. Nothing is written when `change` fails.
    async fn update_progress(
        &self,
        user_id: i64,
        change: &mut (dyn for<'p> FnMut(&'p mut Profile) -> Result<(), AwardError> + Send),
    ) -> Result<Profile, ProfileRepositoryError>;

    async fn delete(&self, user_id: i64) -> Result<bool, ProfileRepositoryError>;

    async fn health_check(&self) -> Result<(), ProfileRepositoryError> {
        Ok(())
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user together with its profile
    async fn create_with_profile(
        &self,
        new_user: &NewUser,
    ) -> Result<(User, Profile), UserRepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserRepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserRepositoryError>;

    /// Users ordered by id; `limit = None` returns everything after `offset`
    async fn list(&self, limit: Option<i64>, offset: i64) -> Result<Vec<User>, UserRepositoryError>;

    async fn count(&self) -> Result<i64, UserRepositoryError>;

    async fn update_password(&self, id: i64, password_hash: &str)
    -> Result<(), UserRepositoryError>;

    /// Delete a user and its profile
    async fn delete(&self, id: i64) -> Result<bool, UserRepositoryError>;
}
