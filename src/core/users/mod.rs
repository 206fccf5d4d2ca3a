//! User accounts
//!
//! Registration, listing, deletion and password changes. Every user owns
//! exactly one profile, created and deleted together with it.

pub mod api;
pub mod password;

pub use api::{UserApiError, users_router};
