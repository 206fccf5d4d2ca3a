//! Authentication for profile-service requests
//!
//! - Bearer token extraction and the permission checks used by handlers
//! - Optional local verification of user JWTs

pub mod jwt;
pub mod permissions;

pub use jwt::{Claims, JwtError, JwtVerifier};
pub use permissions::{
    AuthError, authenticate_user, extract_bearer_token, require_app, require_owner_or_superuser,
};
