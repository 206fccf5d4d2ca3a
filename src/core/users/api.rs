//! User API endpoints
//!
//! - POST /register/ - Register a user (also signs up with the auth service)
//! - GET /users/ - List users, optionally paginated with `limit`/`offset`
//! - GET /users/{pk}/ - User detail
//! - DELETE /users/{pk}/ - Delete a user and its profile (owner or superuser)
//! - PATCH /users/{pk}/change_password/ - Change password

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use super::password::{self, PasswordError};
use crate::core::ApiError;
use crate::core::auth::{self, AuthError};
use crate::core::db::{NewUser, UserListItem, UserRepositoryError, UserResponse};
use crate::core::requesters::{RequesterError, TokenPair};
use crate::core::state::AppState;

/// User API error types
#[derive(Debug, thiserror::Error)]
pub enum UserApiError {
    #[error("User not found")]
    NotFound,

    #[error("A user with that username already exists")]
    UsernameTaken,

    #[error("User id {0} is already taken by a profile")]
    ProfileConflict(i64),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    #[error("Old password does not match the current one")]
    WrongPassword,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Auth service rejected the sign-up: {0}")]
    SignUpRejected(String),

    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<UserRepositoryError> for UserApiError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => UserApiError::NotFound,
            UserRepositoryError::UsernameAlreadyExists => UserApiError::UsernameTaken,
            UserRepositoryError::ProfileAlreadyExists(id) => UserApiError::ProfileConflict(id),
            UserRepositoryError::DatabaseError(e) => {
                tracing::error!("User store failure: {}", e);
                UserApiError::InternalError(e.to_string())
            }
        }
    }
}

impl From<PasswordError> for UserApiError {
    fn from(err: PasswordError) -> Self {
        tracing::error!("{}", err);
        UserApiError::InternalError(err.to_string())
    }
}

impl From<JsonRejection> for UserApiError {
    fn from(rejection: JsonRejection) -> Self {
        UserApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for UserApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            UserApiError::NotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            UserApiError::UsernameTaken => (StatusCode::BAD_REQUEST, "USERNAME_TAKEN"),
            UserApiError::ProfileConflict(_) => {
                (StatusCode::BAD_REQUEST, "PROFILE_ALREADY_EXISTS")
            }
            UserApiError::PasswordMismatch => (StatusCode::BAD_REQUEST, "PASSWORD_MISMATCH"),
            UserApiError::MissingField(_) => (StatusCode::BAD_REQUEST, "MISSING_FIELD"),
            UserApiError::WrongPassword => (StatusCode::FORBIDDEN, "WRONG_PASSWORD"),
            UserApiError::Auth(e) => (e.status(), e.code()),
            UserApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            UserApiError::SignUpRejected(_) => (StatusCode::BAD_REQUEST, "SIGN_UP_REJECTED"),
            UserApiError::UpstreamError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR")
            }
            UserApiError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ApiError::new(self.to_string(), code);

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

/// Every field is optional so a missing one can be reported by name
#[derive(Debug, Deserialize, Default)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListUsersQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Plain list, or a page when `limit` was given
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UserListResponse {
    Page {
        count: i64,
        results: Vec<UserListItem>,
    },
    Plain(Vec<UserListItem>),
}

// ============================================================================
// Router
// ============================================================================

/// Create the user API router
pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/register/", post(register_handler))
        .route("/users/", get(list_users_handler))
        .route(
            "/users/{pk}/",
            get(get_user_handler).delete(delete_user_handler),
        )
        .route(
            "/users/{pk}/change_password/",
            patch(change_password_handler),
        )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /register/
async fn register_handler(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<RegisterRequest>, UserApiError>,
) -> Result<(StatusCode, Json<RegisterResponse>), UserApiError> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(UserApiError::BadRequest(
            "Username cannot be empty".to_string(),
        ));
    }
    if request.password.is_empty() {
        return Err(UserApiError::BadRequest(
            "Password cannot be empty".to_string(),
        ));
    }
    if request.password != request.password_confirm {
        return Err(UserApiError::PasswordMismatch);
    }

    tracing::info!("Registering user '{}'", username);

    let (user, profile) = state
        .users
        .create_with_profile(&NewUser {
            username: username.to_string(),
            email: request.email.clone(),
            password_hash: password::hash_password(&request.password)?,
            is_superuser: false,
        })
        .await?;

    let tokens = match state
        .requesters
        .auth
        .sign_up(username, &request.password, &request.email)
        .await
    {
        Ok(tokens) => tokens,
        Err(err) => {
            tracing::warn!(
                "Sign-up of '{}' failed, removing local user {}: {}",
                username,
                user.id,
                err
            );
            if let Err(e) = state.users.delete(user.id).await {
                tracing::error!("Failed to remove user {} after sign-up failure: {}", user.id, e);
            }
            return Err(sign_up_error(err));
        }
    };

    tracing::info!("User {} registered with profile {}", user.id, profile.id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            tokens,
        }),
    ))
}

/// GET /users/
async fn list_users_handler(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserListResponse>, UserApiError> {
    let offset = query.offset.unwrap_or(0);
    if offset < 0 || query.limit.is_some_and(|limit| limit < 0) {
        return Err(UserApiError::BadRequest(
            "limit and offset must not be negative".to_string(),
        ));
    }

    tracing::debug!("Listing users, limit: {:?}, offset: {}", query.limit, offset);

    let users = state.users.list(query.limit, offset).await?;
    let results: Vec<UserListItem> = users.into_iter().map(Into::into).collect();

    let response = match query.limit {
        Some(_) => UserListResponse::Page {
            count: state.users.count().await?,
            results,
        },
        None => UserListResponse::Plain(results),
    };

    Ok(Json(response))
}

/// GET /users/{pk}/
async fn get_user_handler(
    State(state): State<AppState>,
    Path(pk): Path<i64>,
) -> Result<Json<UserResponse>, UserApiError> {
    tracing::debug!("Getting user {}", pk);

    let user = state
        .users
        .find_by_id(pk)
        .await?
        .ok_or(UserApiError::NotFound)?;

    Ok(Json(user.into()))
}

/// DELETE /users/{pk}/
async fn delete_user_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(pk): Path<i64>,
) -> Result<StatusCode, UserApiError> {
    auth::require_owner_or_superuser(state.requesters.auth.as_ref(), &headers, pk).await?;

    tracing::info!("Deleting user {}", pk);

    if !state.users.delete(pk).await? {
        return Err(UserApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /users/{pk}/change_password/
async fn change_password_handler(
    State(state): State<AppState>,
    Path(pk): Path<i64>,
    WithRejection(Json(request), _): WithRejection<Json<ChangePasswordRequest>, UserApiError>,
) -> Result<StatusCode, UserApiError> {
    let user = state
        .users
        .find_by_id(pk)
        .await?
        .ok_or(UserApiError::NotFound)?;

    let old_password = request
        .old_password
        .ok_or(UserApiError::MissingField("old_password"))?;
    let new_password = request
        .password
        .ok_or(UserApiError::MissingField("password"))?;
    let new_password_confirm = request
        .password_confirm
        .ok_or(UserApiError::MissingField("password_confirm"))?;

    if !password::verify_password(&old_password, &user.password_hash) {
        tracing::warn!("Wrong old password for user {}", pk);
        return Err(UserApiError::WrongPassword);
    }
    if new_password != new_password_confirm {
        return Err(UserApiError::PasswordMismatch);
    }

    let hash = password::hash_password(&new_password)?;
    state.users.update_password(pk, &hash).await?;

    tracing::info!("Password changed for user {}", pk);

    Ok(StatusCode::ACCEPTED)
}

// ============================================================================
// Helper Functions
// ============================================================================

fn sign_up_error(err: RequesterError) -> UserApiError {
    match err.status() {
        Some(400) => UserApiError::SignUpRejected(err.to_string()),
        _ => UserApiError::UpstreamError(err.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================
