//! Gamification profiles
//!
//! REST endpoints for profile CRUD and the award mutations (achievements,
//! pin purchases, rating, bulk awards).

pub mod api;

pub use api::{ProfileApiError, profiles_router};
