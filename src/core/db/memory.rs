//! In-memory store
//!
//! Used when no `DATABASE_URL` is configured and by the API tests. Rows live
//! in `DashMap`s; ids come from atomic counters.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::models::{AwardError, NewProfile, NewUser, Profile, UpdateProfile, User};
use super::repositories::{ProfileRepositoryError, UserRepositoryError};
use super::store::{ProfileStore, UserStore};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<i64, User>,
    usernames: DashMap<String, i64>,
    /// Keyed by user_id
    profiles: DashMap<i64, Profile>,
    last_user_id: AtomicI64,
    last_profile_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_user_id(&self) -> i64 {
        self.last_user_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn next_profile_id(&self) -> i64 {
        self.last_profile_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn insert_profile(&self, new_profile: &NewProfile) -> Result<Profile, ProfileRepositoryError> {
        match self.profiles.entry(new_profile.user_id) {
            Entry::Occupied(_) => Err(ProfileRepositoryError::AlreadyExists(new_profile.user_id)),
            Entry::Vacant(slot) => {
                let profile = Profile::new(
                    self.next_profile_id(),
                    new_profile.user_id,
                    new_profile.pic_id,
                );
                slot.insert(profile.clone());
                Ok(profile)
            }
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Profile>, ProfileRepositoryError> {
        let mut profiles: Vec<Profile> = self.profiles.iter().map(|p| p.value().clone()).collect();
        profiles.sort_by_key(|p| p.id);
        Ok(profiles)
    }

    async fn find_by_user_id(
        &self,
        user_id: i64,
    ) -> Result<Option<Profile>, ProfileRepositoryError> {
        Ok(self.profiles.get(&user_id).map(|p| p.value().clone()))
    }

    async fn create(&self, new_profile: &NewProfile) -> Result<Profile, ProfileRepositoryError> {
        self.insert_profile(new_profile)
    }

    async fn update(
        &self,
        user_id: i64,
        updates: &UpdateProfile,
    ) -> Result<Profile, ProfileRepositoryError> {
        let mut profile = self
            .profiles
            .get_mut(&user_id)
            .ok_or(ProfileRepositoryError::NotFound)?;

        if let Some(pin_sprite) = updates.pin_sprite {
            profile.pin_sprite = pin_sprite;
        }
        if let Some(geopin_sprite) = updates.geopin_sprite {
            profile.geopin_sprite = geopin_sprite;
        }
        if let Some(pic_id) = updates.pic_id {
            profile.pic_id = pic_id;
        }

        Ok(profile.clone())
    }

    async fn update_progress(
        &self,
        user_id: i64,
        change: &mut (dyn for<'p> FnMut(&'p mut Profile) -> Result<(), AwardError> + Send),
    ) -> Result<Profile, ProfileRepositoryError> {
        // The shard stays write-locked until the new row is in place
        let mut stored = self
            .profiles
            .get_mut(&user_id)
            .ok_or(ProfileRepositoryError::NotFound)?;

        let mut profile = stored.clone();
        change(&mut profile)?;
        *stored = profile.clone();

        Ok(profile)
    }

    async fn delete(&self, user_id: i64) -> Result<bool, ProfileRepositoryError> {
        Ok(self.profiles.remove(&user_id).is_some())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_with_profile(
        &self,
        new_user: &NewUser,
    ) -> Result<(User, Profile), UserRepositoryError> {
        let id = match self.usernames.entry(new_user.username.clone()) {
            Entry::Occupied(_) => return Err(UserRepositoryError::UsernameAlreadyExists),
            Entry::Vacant(slot) => {
                let id = self.next_user_id();
                slot.insert(id);
                id
            }
        };

        let user = User {
            id,
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            is_superuser: new_user.is_superuser,
            date_joined: Utc::now(),
        };

        let profile = match self.insert_profile(&NewProfile {
            user_id: id,
            pic_id: None,
        }) {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("New user {} collides with an existing profile: {}", id, e);
                self.usernames.remove(&new_user.username);
                return Err(UserRepositoryError::ProfileAlreadyExists(id));
            }
        };

        self.users.insert(id, user.clone());

        Ok((user, profile))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserRepositoryError> {
        let Some(id) = self.usernames.get(username).map(|id| *id.value()) else {
            return Ok(None);
        };
        self.find_by_id(id).await
    }

    async fn list(&self, limit: Option<i64>, offset: i64) -> Result<Vec<User>, UserRepositoryError> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by_key(|u| u.id);

        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let limit = limit
            .map(|l| usize::try_from(l.max(0)).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(users.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> Result<i64, UserRepositoryError> {
        Ok(self.users.len() as i64)
    }

    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<(), UserRepositoryError> {
        let mut user = self.users.get_mut(&id).ok_or(UserRepositoryError::NotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<bool, UserRepositoryError> {
        self.profiles.remove(&id);
        match self.users.remove(&id) {
            Some((_, user)) => {
                self.usernames.remove(&user.username);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
