//! Profiles service
//!
//! User registration, profile CRUD and gamification mechanics (pins, geopins,
//! achievements, rating, in-game currency) exposed over HTTP.

pub mod core;
