//! Core modules: configuration, storage, collaborator clients and HTTP APIs

pub mod auth;
pub mod config;
pub mod db;
pub mod profiles;
pub mod requesters;
pub mod state;
pub mod users;

mod api_error;
#[cfg(test)]
pub(crate) mod testing;

pub use api_error::ApiError;
pub use state::{AppState, app_router};
