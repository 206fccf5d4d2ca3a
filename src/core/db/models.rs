//! Database models
//!
//! This module defines the entity structs that map to PostgreSQL tables and the
//! request/response shapes built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::id_list::IdList;

/// Helper module for deserializing Option<Option<T>> where:
/// - Missing field -> None (don't update)
/// - Field with null -> Some(None) (set to null)
/// - Field with value -> Some(Some(value)) (set to value)
pub mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        // This will be called only when the field is present
        // So we wrap the result in Some()
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

// ============================================================================
// User Model
// ============================================================================

/// User identity record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

/// User data for creation (password_hash must already be hashed)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_superuser: bool,
}

/// Item of the user list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListItem {
    pub id: i64,
    pub username: String,
}

impl From<User> for UserListItem {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

/// User without sensitive data (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_superuser: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_superuser: user.is_superuser,
            date_joined: user.date_joined,
        }
    }
}

// ============================================================================
// Profile Model
// ============================================================================

/// Gamification profile extending a user
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub created_dt: DateTime<Utc>,
    pub pin_sprite: i64,
    pub geopin_sprite: i64,
    #[sqlx(try_from = "String")]
    pub unlocked_pins: IdList,
    #[sqlx(try_from = "String")]
    pub unlocked_geopins: IdList,
    #[sqlx(try_from = "String")]
    pub achievements: IdList,
    pub pic_id: Option<i64>,
    pub money: i64,
    pub rating: i64,
}

/// Kind of unlockable award
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardKind {
    Pin,
    Geopin,
    Achievement,
}

impl std::fmt::Display for AwardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AwardKind::Pin => write!(f, "pin"),
            AwardKind::Geopin => write!(f, "geopin"),
            AwardKind::Achievement => write!(f, "achievement"),
        }
    }
}

/// Rejected award mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AwardError {
    #[error("The {kind} {id} is already owned")]
    AlreadyOwned { kind: AwardKind, id: i64 },

    #[error("Price cannot be negative")]
    NegativePrice,

    #[error("Not enough money: price is {price}, balance is {money}")]
    NotEnoughMoney { price: i64, money: i64 },
}

impl Profile {
    /// A fresh profile with default sprites and starter award lists
    pub fn new(id: i64, user_id: i64, pic_id: Option<i64>) -> Self {
        Self {
            id,
            user_id,
            created_dt: Utc::now(),
            pin_sprite: 1,
            geopin_sprite: 1,
            unlocked_pins: IdList::starter(),
            unlocked_geopins: IdList::starter(),
            achievements: IdList::starter(),
            pic_id,
            money: 0,
            rating: 0,
        }
    }

    /// Unlock an achievement the profile does not own yet
    pub fn add_achievement(&mut self, achievement_id: i64) -> Result<(), AwardError> {
        if self.achievements.contains(achievement_id) {
            return Err(AwardError::AlreadyOwned {
                kind: AwardKind::Achievement,
                id: achievement_id,
            });
        }
        self.achievements.push(achievement_id);
        Ok(())
    }

    /// Pay for a pin and unlock it
    pub fn buy_pin(&mut self, pin_id: i64, price: i64) -> Result<(), AwardError> {
        if self.unlocked_pins.contains(pin_id) {
            return Err(AwardError::AlreadyOwned {
                kind: AwardKind::Pin,
                id: pin_id,
            });
        }
        if price < 0 {
            return Err(AwardError::NegativePrice);
        }
        if price > self.money {
            return Err(AwardError::NotEnoughMoney {
                price,
                money: self.money,
            });
        }

        self.money -= price;
        self.unlocked_pins.push(pin_id);
        Ok(())
    }

    /// Shift the rating, never going below zero
    pub fn apply_rating_delta(&mut self, delta: i64) {
        self.rating = self.rating.saturating_add(delta).max(0);
    }

    /// Append a batch of awards as-is (no ownership check)
    pub fn add_awards(&mut self, pins: &[i64], geopins: &[i64], achievements: &[i64]) {
        self.unlocked_pins.extend_from_slice(pins);
        self.unlocked_geopins.extend_from_slice(geopins);
        self.achievements.extend_from_slice(achievements);
    }
}

/// Profile data for creation
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub user_id: i64,
    pub pic_id: Option<i64>,
}

/// Profile data for updates
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateProfile {
    pub pin_sprite: Option<i64>,
    pub geopin_sprite: Option<i64>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub pic_id: Option<Option<i64>>, // None = don't update, Some(None) = clear, Some(Some(id)) = set
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.pin_sprite.is_none() && self.geopin_sprite.is_none() && self.pic_id.is_none()
    }
}

/// Item of the profile list
#[derive(Debug, Clone, Serialize)]
pub struct ProfileListItem {
    pub id: i64,
    pub user_id: i64,
    pub pic_id: Option<i64>,
}

impl From<Profile> for ProfileListItem {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            user_id: profile.user_id,
            pic_id: profile.pic_id,
        }
    }
}

/// Detailed profile representation
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    pub id: i64,
    pub user_id: i64,
    pub pin_sprite: i64,
    pub geopin_sprite: i64,
    pub unlocked_pins: IdList,
    pub achievements: IdList,
    pub pic_id: Option<i64>,
    pub money: i64,
    pub rating: i64,
    pub created_dt: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            user_id: profile.user_id,
            pin_sprite: profile.pin_sprite,
            geopin_sprite: profile.geopin_sprite,
            unlocked_pins: profile.unlocked_pins,
            achievements: profile.achievements,
            pic_id: profile.pic_id,
            money: profile.money,
            rating: profile.rating,
            created_dt: profile.created_dt,
        }
    }
}

/// All award lists of a profile
#[derive(Debug, Clone, Serialize)]
pub struct AwardsResponse {
    pub unlocked_pins: IdList,
    pub unlocked_geopins: IdList,
    pub achievements: IdList,
}

impl From<Profile> for AwardsResponse {
    fn from(profile: Profile) -> Self {
        Self {
            unlocked_pins: profile.unlocked_pins,
            unlocked_geopins: profile.unlocked_geopins,
            achievements: profile.achievements,
        }
    }
}
