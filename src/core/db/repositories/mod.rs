//! PostgreSQL repositories
//!
//! Repositories encapsulate data access logic and implement the store traits
//! the HTTP handlers depend on.

pub mod profile;
pub mod user;

pub use profile::{ProfileRepository, ProfileRepositoryError};
pub use user::{UserRepository, UserRepositoryError};
