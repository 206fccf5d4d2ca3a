//! Request authentication and permission checks
//!
//! Identity is always resolved through [`AuthRequester`]; this module only
//! decides which status a failed check answers with.

use axum::http::{HeaderMap, StatusCode, header};

use crate::core::requesters::{AppInfo, AuthRequester, RequesterError, UserInfo};

/// Failed authentication or permission check
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication credentials were not provided")]
    MissingToken,

    #[error("Authorization header must use the Bearer scheme")]
    InvalidHeader,

    #[error("You do not have permission to perform this action")]
    PermissionDenied,

    #[error("Auth service rejected the request: {0}")]
    BadRequest(String),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Auth service failure: {0}")]
    ServiceFailure(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::InvalidHeader
            | AuthError::PermissionDenied
            | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::ServiceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidHeader => "INVALID_TOKEN",
            AuthError::PermissionDenied => "PERMISSION_DENIED",
            AuthError::BadRequest(_) => "AUTH_BAD_REQUEST",
            AuthError::Unauthorized(_) => "UNAUTHORIZED",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::ServiceFailure(_) => "AUTH_SERVICE_ERROR",
        }
    }
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidHeader)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::InvalidHeader);
    }

    Ok(token)
}

/// Resolve the calling user, keeping the auth service's verdict
///
/// 400, 401 and 403 answers pass through; anything else is a service failure.
pub async fn authenticate_user(
    auth: &dyn AuthRequester,
    headers: &HeaderMap,
) -> Result<UserInfo, AuthError> {
    let token = extract_bearer_token(headers)?;

    auth.get_user_info(token).await.map_err(|err| {
        let message = err.to_string();
        match err.status() {
            Some(400) => AuthError::BadRequest(message),
            Some(401) => AuthError::Unauthorized(message),
            Some(403) => AuthError::Forbidden(message),
            _ => {
                tracing::error!("User authentication failed: {}", message);
                AuthError::ServiceFailure(message)
            }
        }
    })
}

/// Allow the owner of `owner_id` or a superuser
///
/// Any failure to identify the caller counts as a denied permission.
pub async fn require_owner_or_superuser(
    auth: &dyn AuthRequester,
    headers: &HeaderMap,
    owner_id: i64,
) -> Result<UserInfo, AuthError> {
    let user = match authenticate_user(auth, headers).await {
        Ok(user) => user,
        Err(err) => {
            tracing::debug!("Permission check for owner {} failed: {}", owner_id, err);
            return Err(AuthError::PermissionDenied);
        }
    };

    if user.id != owner_id && !user.is_superuser {
        tracing::debug!("User {} is not allowed to edit owner {}", user.id, owner_id);
        return Err(AuthError::PermissionDenied);
    }

    Ok(user)
}

/// Accept only service-to-service tokens
pub async fn require_app(
    auth: &dyn AuthRequester,
    headers: &HeaderMap,
) -> Result<AppInfo, AuthError> {
    let token = extract_bearer_token(headers)?;

    auth.app_auth(token).await.map_err(|err| match err {
        RequesterError::Status { status: 401, .. } => AuthError::Unauthorized(err.to_string()),
        _ => {
            tracing::warn!("App authentication failed: {}", err);
            AuthError::Forbidden(err.to_string())
        }
    })
}
