//! Database module
//!
//! This module provides database connectivity, models, the store traits and
//! their PostgreSQL and in-memory implementations.

pub mod id_list;
pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod store;

// Re-export commonly used items
pub use id_list::{IdList, IdListError};
pub use memory::MemoryStore;
pub use models::*;
pub use pool::{DbError, connect};
pub use repositories::{
    ProfileRepository, ProfileRepositoryError, UserRepository, UserRepositoryError,
};
pub use store::{ProfileStore, UserStore};

// Re-export sqlx types that might be needed
pub use sqlx::PgPool;
