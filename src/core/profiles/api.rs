//! Profile API endpoints
//!
//! - GET /profiles/ - List profiles
//! - POST /profiles/ - Create a profile (user auth)
//! - GET /profiles/{user_id}/ - Profile detail
//! - PATCH /profiles/{user_id}/ - Update sprites and picture (owner or superuser)
//! - DELETE /profiles/{user_id}/ - Delete a profile (owner or superuser)
//! - POST /profiles/{user_id}/add_achievement/ - Unlock an achievement (app auth)
//! - POST /profiles/{user_id}/buy_pin/ - Buy a pin (app auth)
//! - PATCH /profiles/{user_id}/update_rating/ - Shift the rating (app auth)
//! - POST /profiles/{user_id}/add_awards/ - Append awards in bulk (app auth)

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::core::ApiError;
use crate::core::auth::{self, AuthError};
use crate::core::db::{
    AwardError, AwardsResponse, NewProfile, Profile, ProfileListItem, ProfileRepositoryError,
    ProfileResponse, UpdateProfile,
};
use crate::core::requesters::RequesterError;
use crate::core::state::AppState;

/// Profile API error types
#[derive(Debug, thiserror::Error)]
pub enum ProfileApiError {
    #[error("Profile not found")]
    NotFound,

    #[error("Profile for user {0} already exists")]
    AlreadyExists(i64),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Award(#[from] AwardError),

    #[error("Unknown {0}")]
    UnknownResource(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<ProfileRepositoryError> for ProfileApiError {
    fn from(err: ProfileRepositoryError) -> Self {
        match err {
            ProfileRepositoryError::NotFound => ProfileApiError::NotFound,
            ProfileRepositoryError::AlreadyExists(user_id) => {
                ProfileApiError::AlreadyExists(user_id)
            }
            ProfileRepositoryError::Award(e) => ProfileApiError::Award(e),
            ProfileRepositoryError::DatabaseError(e) => {
                tracing::error!("Profile store failure: {}", e);
                ProfileApiError::InternalError(e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ProfileApiError {
    fn from(rejection: JsonRejection) -> Self {
        ProfileApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ProfileApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ProfileApiError::NotFound => (StatusCode::NOT_FOUND, "PROFILE_NOT_FOUND"),
            ProfileApiError::AlreadyExists(_) => (StatusCode::BAD_REQUEST, "PROFILE_ALREADY_EXISTS"),
            ProfileApiError::Auth(e) => (e.status(), e.code()),
            ProfileApiError::Award(AwardError::AlreadyOwned { .. }) => {
                (StatusCode::BAD_REQUEST, "ALREADY_OWNED")
            }
            ProfileApiError::Award(AwardError::NegativePrice) => {
                (StatusCode::BAD_REQUEST, "NEGATIVE_PRICE")
            }
            ProfileApiError::Award(AwardError::NotEnoughMoney { .. }) => {
                (StatusCode::BAD_REQUEST, "NOT_ENOUGH_MONEY")
            }
            ProfileApiError::UnknownResource(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_RESOURCE"),
            ProfileApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ProfileApiError::UpstreamError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR")
            }
            ProfileApiError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ApiError::new(self.to_string(), code);

        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct CreateProfileRequest {
    /// Defaults to the caller
    pub user_id: Option<i64>,
    pub pic_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AddAchievementRequest {
    pub achievement_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct BuyPinRequest {
    pub pin_id: i64,
    pub price: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRatingRequest {
    pub d_rating: i64,
}

#[derive(Debug, Deserialize, Default)]
pub struct AddAwardsRequest {
    #[serde(default)]
    pub pins: Vec<i64>,
    #[serde(default)]
    pub geopins: Vec<i64>,
    #[serde(default)]
    pub achievements: Vec<i64>,
}

// ============================================================================
// Router
// ============================================================================

/// Create the profile API router
pub fn profiles_router() -> Router<AppState> {
    Router::new()
        .route(
            "/profiles/",
            get(list_profiles_handler).post(create_profile_handler),
        )
        .route(
            "/profiles/{user_id}/",
            get(get_profile_handler)
                .patch(update_profile_handler)
                .delete(delete_profile_handler),
        )
        .route(
            "/profiles/{user_id}/add_achievement/",
            post(add_achievement_handler),
        )
        .route("/profiles/{user_id}/buy_pin/", post(buy_pin_handler))
        .route(
            "/profiles/{user_id}/update_rating/",
            patch(update_rating_handler),
        )
        .route("/profiles/{user_id}/add_awards/", post(add_awards_handler))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /profiles/
async fn list_profiles_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfileListItem>>, ProfileApiError> {
    let profiles = state.profiles.list().await?;

    tracing::debug!("Listing {} profiles", profiles.len());

    Ok(Json(profiles.into_iter().map(Into::into).collect()))
}

/// POST /profiles/
async fn create_profile_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    WithRejection(Json(request), _): WithRejection<Json<CreateProfileRequest>, ProfileApiError>,
) -> Result<(StatusCode, Json<ProfileResponse>), ProfileApiError> {
    let caller = auth::authenticate_user(state.requesters.auth.as_ref(), &headers).await?;

    let user_id = request.user_id.unwrap_or(caller.id);
    if user_id < 1 {
        return Err(ProfileApiError::BadRequest(
            "user_id must be a positive integer".to_string(),
        ));
    }
    if user_id != caller.id && !caller.is_superuser {
        return Err(AuthError::PermissionDenied.into());
    }

    if let Some(pic_id) = request.pic_id {
        check_image(&state, &headers, pic_id).await?;
    }

    tracing::info!("Creating profile for user {} (by {})", user_id, caller.id);

    let profile = state
        .profiles
        .create(&NewProfile {
            user_id,
            pic_id: request.pic_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(profile.into())))
}

/// GET /profiles/{user_id}/
async fn get_profile_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<ProfileResponse>, ProfileApiError> {
    tracing::debug!("Getting profile of user {}", user_id);

    let profile = load_profile(&state, user_id).await?;

    Ok(Json(profile.into()))
}

/// PATCH /profiles/{user_id}/
async fn update_profile_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateProfile>, ProfileApiError>,
) -> Result<(StatusCode, Json<ProfileResponse>), ProfileApiError> {
    auth::require_owner_or_superuser(state.requesters.auth.as_ref(), &headers, user_id).await?;

    check_positive("pin_sprite", request.pin_sprite)?;
    check_positive("geopin_sprite", request.geopin_sprite)?;

    if let Some(Some(pic_id)) = request.pic_id {
        check_image(&state, &headers, pic_id).await?;
    }

    tracing::info!("Updating profile of user {}", user_id);

    let profile = state.profiles.update(user_id, &request).await?;

    Ok((StatusCode::ACCEPTED, Json(profile.into())))
}

/// DELETE /profiles/{user_id}/
async fn delete_profile_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, ProfileApiError> {
    auth::require_owner_or_superuser(state.requesters.auth.as_ref(), &headers, user_id).await?;

    tracing::info!("Deleting profile of user {}", user_id);

    if !state.profiles.delete(user_id).await? {
        return Err(ProfileApiError::NotFound);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// POST /profiles/{user_id}/add_achievement/
async fn add_achievement_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    WithRejection(Json(request), _): WithRejection<Json<AddAchievementRequest>, ProfileApiError>,
) -> Result<(StatusCode, Json<ProfileResponse>), ProfileApiError> {
    let token = require_app_token(&state, &headers).await?;
    let achievement_id = request.achievement_id;
    check_award_ids("achievement_id", &[achievement_id])?;
    load_profile(&state, user_id).await?;

    state
        .requesters
        .awards
        .get_achievement(achievement_id, token)
        .await
        .map_err(|e| lookup_error("achievement", achievement_id, e))?;

    let profile = state
        .profiles
        .update_progress(user_id, &mut |profile: &mut Profile| {
            profile.add_achievement(achievement_id)
        })
        .await?;

    tracing::info!("User {} unlocked achievement {}", user_id, achievement_id);

    Ok((StatusCode::CREATED, Json(profile.into())))
}

/// POST /profiles/{user_id}/buy_pin/
async fn buy_pin_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    WithRejection(Json(request), _): WithRejection<Json<BuyPinRequest>, ProfileApiError>,
) -> Result<(StatusCode, Json<ProfileResponse>), ProfileApiError> {
    let token = require_app_token(&state, &headers).await?;
    let BuyPinRequest { pin_id, price } = request;
    check_award_ids("pin_id", &[pin_id])?;
    load_profile(&state, user_id).await?;

    state
        .requesters
        .awards
        .get_pin(pin_id, token)
        .await
        .map_err(|e| lookup_error("pin", pin_id, e))?;

    let profile = state
        .profiles
        .update_progress(user_id, &mut |profile: &mut Profile| {
            profile.buy_pin(pin_id, price)
        })
        .await?;

    tracing::info!("User {} bought pin {} for {}", user_id, pin_id, price);

    Ok((StatusCode::CREATED, Json(profile.into())))
}

/// PATCH /profiles/{user_id}/update_rating/
async fn update_rating_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateRatingRequest>, ProfileApiError>,
) -> Result<(StatusCode, Json<ProfileResponse>), ProfileApiError> {
    require_app_token(&state, &headers).await?;
    let d_rating = request.d_rating;

    let profile = state
        .profiles
        .update_progress(user_id, &mut |profile: &mut Profile| {
            profile.apply_rating_delta(d_rating);
            Ok(())
        })
        .await?;

    tracing::info!(
        "Rating of user {} shifted by {} to {}",
        user_id,
        d_rating,
        profile.rating
    );

    Ok((StatusCode::ACCEPTED, Json(profile.into())))
}

/// POST /profiles/{user_id}/add_awards/
async fn add_awards_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
    WithRejection(Json(request), _): WithRejection<Json<AddAwardsRequest>, ProfileApiError>,
) -> Result<(StatusCode, Json<AwardsResponse>), ProfileApiError> {
    let token = require_app_token(&state, &headers).await?;
    check_award_ids("pins", &request.pins)?;
    check_award_ids("geopins", &request.geopins)?;
    check_award_ids("achievements", &request.achievements)?;
    load_profile(&state, user_id).await?;

    let awards = &state.requesters.awards;
    for &id in &request.pins {
        awards
            .get_pin(id, token)
            .await
            .map_err(|e| lookup_error("pin", id, e))?;
    }
    for &id in &request.geopins {
        awards
            .get_geopin(id, token)
            .await
            .map_err(|e| lookup_error("geopin", id, e))?;
    }
    for &id in &request.achievements {
        awards
            .get_achievement(id, token)
            .await
            .map_err(|e| lookup_error("achievement", id, e))?;
    }

    let profile = state
        .profiles
        .update_progress(user_id, &mut |profile: &mut Profile| {
            profile.add_awards(&request.pins, &request.geopins, &request.achievements);
            Ok(())
        })
        .await?;

    tracing::info!(
        "User {} received {} pins, {} geopins, {} achievements",
        user_id,
        request.pins.len(),
        request.geopins.len(),
        request.achievements.len()
    );

    Ok((StatusCode::CREATED, Json(profile.into())))
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn load_profile(state: &AppState, user_id: i64) -> Result<Profile, ProfileApiError> {
    state
        .profiles
        .find_by_user_id(user_id)
        .await?
        .ok_or(ProfileApiError::NotFound)
}

/// Sprites are 1-based
fn check_positive(field: &str, value: Option<i64>) -> Result<(), ProfileApiError> {
    match value {
        Some(value) if value < 1 => Err(ProfileApiError::BadRequest(format!(
            "{} must be a positive integer",
            field
        ))),
        _ => Ok(()),
    }
}

/// Stored id lists only hold positive ids
fn check_award_ids(field: &str, ids: &[i64]) -> Result<(), ProfileApiError> {
    match ids.iter().find(|&&id| id < 1) {
        Some(id) => Err(ProfileApiError::BadRequest(format!(
            "{} must hold positive ids, got {}",
            field, id
        ))),
        None => Ok(()),
    }
}

/// App-authenticate the request and hand back its token for follow-up lookups
async fn require_app_token<'h>(
    state: &AppState,
    headers: &'h HeaderMap,
) -> Result<&'h str, ProfileApiError> {
    let app = auth::require_app(state.requesters.auth.as_ref(), headers).await?;
    tracing::debug!("Request authorized for app {}", app.name);

    Ok(auth::extract_bearer_token(headers)?)
}

async fn check_image(
    state: &AppState,
    headers: &HeaderMap,
    pic_id: i64,
) -> Result<(), ProfileApiError> {
    let token = auth::extract_bearer_token(headers)?;

    state
        .requesters
        .media
        .get_image_info(pic_id, token)
        .await
        .map_err(|e| lookup_error("image", pic_id, e))
}

/// Unknown or rejected ids are the client's fault; anything else is ours
fn lookup_error(what: &str, id: i64, err: RequesterError) -> ProfileApiError {
    match err.status() {
        Some(400) | Some(404) => ProfileApiError::UnknownResource(format!("{} {}", what, id)),
        _ => {
            tracing::error!("Lookup of {} {} failed: {}", what, id, err);
            ProfileApiError::UpstreamError(err.to_string())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::{ProfileStore, UserStore};
    use crate::core::requesters::{ErrorKey, MockError, Role};
    use crate::core::testing::{TestApp, fields_test, list_test};
    use serde_json::json;

    const DETAIL_FIELDS: [&str; 10] = [
        "id",
        "user_id",
        "pin_sprite",
        "geopin_sprite",
        "created_dt",
        "unlocked_pins",
        "pic_id",
        "achievements",
        "money",
        "rating",
    ];

    async fn app_with_profile(user_id: i64) -> TestApp {
        let app = TestApp::new();
        app.store
            .create(&NewProfile {
                user_id: 100,
                pic_id: None,
            })
            .await
            .unwrap();
        app.store
            .create(&NewProfile {
                user_id,
                pic_id: None,
            })
            .await
            .unwrap();
        app
    }

    async fn set_money(app: &TestApp, user_id: i64, money: i64) {
        app.store
            .update_progress(user_id, &mut |profile: &mut Profile| {
                profile.money = money;
                Ok(())
            })
            .await
            .unwrap();
    }

    // ------------------------------------------------------------------
    // /profiles/
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_list_profiles() {
        let app = app_with_profile(1).await;

        let json = app.get_and_check_status("/profiles/", &[200]).await;

        fields_test(&json, &["id", "user_id", "pic_id"], false);
        let persisted: Vec<i64> = ProfileStore::list(app.store.as_ref())
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        list_test(&json, &persisted, "id");
    }

    #[tokio::test]
    async fn test_create_profile_for_caller() {
        let app = TestApp::new();

        let json = app.post_and_check_status("/profiles/", &json!({}), &[201]).await;

        assert_eq!(json["user_id"], 1);
        assert_eq!(json["achievements"], json!([1]));
    }

    #[tokio::test]
    async fn test_create_duplicate_profile() {
        let app = app_with_profile(1).await;

        app.post_and_check_status("/profiles/", &json!({}), &[400]).await;
    }

    #[tokio::test]
    async fn test_create_profile_for_other_user_requires_superuser() {
        let mut app = TestApp::new();
        app.post_and_check_status("/profiles/", &json!({"user_id": 7}), &[401])
            .await;

        app.token.set_role(Role::Admin);
        let json = app
            .post_and_check_status("/profiles/", &json!({"user_id": 7}), &[201])
            .await;
        assert_eq!(json["user_id"], 7);
    }

    #[tokio::test]
    async fn test_create_profile_with_unknown_picture() {
        let mut app = TestApp::new();
        app.token.set_error(ErrorKey::Media, MockError::BadCode404);

        app.post_and_check_status("/profiles/", &json!({"pic_id": 3}), &[400])
            .await;
        assert!(app.store.find_by_user_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_profile_unknown_user() {
        let mut app = TestApp::new();
        app.token.set_authenticate(false);

        app.post_and_check_status("/profiles/", &json!({}), &[401, 403])
            .await;
    }

    #[tokio::test]
    async fn test_create_profile_auth_bad_request() {
        let mut app = TestApp::new();
        app.token.set_error(ErrorKey::Auth, MockError::BadCode400);

        app.post_and_check_status("/profiles/", &json!({}), &[400]).await;
    }

    #[tokio::test]
    async fn test_create_profile_auth_service_down() {
        let mut app = TestApp::new();
        app.token.set_error(ErrorKey::Auth, MockError::ErrorToken);

        app.post_and_check_status("/profiles/", &json!({}), &[500]).await;
    }

    #[tokio::test]
    async fn test_create_profile_without_token() {
        let app = TestApp::new();

        let (status, _) = app
            .request(
                axum::http::Method::POST,
                "/profiles/",
                Some(&json!({})),
                false,
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = TestApp::new();

        app.post_and_check_status("/profiles/", &json!([1, 2]), &[400])
            .await;
    }

    // ------------------------------------------------------------------
    // /profiles/{user_id}/
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_profile() {
        let app = app_with_profile(1).await;

        let json = app.get_and_check_status("/profiles/1/", &[200]).await;

        fields_test(&json, &DETAIL_FIELDS, false);
        assert_eq!(json["unlocked_pins"], json!([1]));
    }

    #[tokio::test]
    async fn test_get_missing_profile() {
        let app = app_with_profile(1).await;

        app.get_and_check_status("/profiles/1001/", &[404]).await;
    }

    #[tokio::test]
    async fn test_patch_profile() {
        let app = app_with_profile(1).await;

        let json = app
            .patch_and_check_status("/profiles/1/", &json!({"pin_sprite": 2}), &[202])
            .await;

        assert_eq!(json["pin_sprite"], 2);
        assert_eq!(json["geopin_sprite"], 1);
    }

    #[tokio::test]
    async fn test_patch_profile_picture() {
        let app = app_with_profile(1).await;

        let json = app
            .patch_and_check_status("/profiles/1/", &json!({"pic_id": 12}), &[202])
            .await;
        assert_eq!(json["pic_id"], 12);

        let json = app
            .patch_and_check_status("/profiles/1/", &json!({"pic_id": null}), &[202])
            .await;
        assert!(json["pic_id"].is_null());
    }

    #[tokio::test]
    async fn test_patch_profile_media_failure() {
        let mut app = app_with_profile(1).await;
        app.token.set_error(ErrorKey::Media, MockError::BadCode500);

        app.patch_and_check_status("/profiles/1/", &json!({"pic_id": 12}), &[500])
            .await;
    }

    #[tokio::test]
    async fn test_patch_other_profile_denied() {
        let app = app_with_profile(1).await;

        app.patch_and_check_status("/profiles/1001/", &json!({"pin_sprite": 2}), &[401, 403])
            .await;
    }

    #[tokio::test]
    async fn test_superuser_patches_any_profile() {
        let mut app = app_with_profile(1).await;
        app.token.set_role(Role::Admin);

        let json = app
            .patch_and_check_status("/profiles/100/", &json!({"geopin_sprite": 4}), &[202])
            .await;
        assert_eq!(json["geopin_sprite"], 4);
    }

    #[tokio::test]
    async fn test_patch_profile_rejects_non_positive_sprites() {
        let app = app_with_profile(1).await;

        app.patch_and_check_status("/profiles/1/", &json!({"pin_sprite": 0}), &[400])
            .await;
        app.patch_and_check_status("/profiles/1/", &json!({"geopin_sprite": -5}), &[400])
            .await;

        let profile = app.store.find_by_user_id(1).await.unwrap().unwrap();
        assert_eq!(profile.pin_sprite, 1);
        assert_eq!(profile.geopin_sprite, 1);
    }

    #[tokio::test]
    async fn test_delete_profile() {
        let app = app_with_profile(1).await;

        app.delete_and_check_status("/profiles/1/", &[204]).await;
        app.get_and_check_status("/profiles/1/", &[404]).await;
    }

    #[tokio::test]
    async fn test_delete_other_profile_denied() {
        let app = app_with_profile(1).await;

        app.delete_and_check_status("/profiles/1001/", &[401]).await;
    }

    #[tokio::test]
    async fn test_superuser_deletes_missing_profile() {
        let mut app = app_with_profile(1).await;
        app.token.set_role(Role::Admin);

        app.delete_and_check_status("/profiles/1001/", &[404]).await;
    }

    // ------------------------------------------------------------------
    // /profiles/{user_id}/add_achievement/
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_add_achievement() {
        let app = app_with_profile(1).await;

        let json = app
            .post_and_check_status(
                "/profiles/1/add_achievement/",
                &json!({"achievement_id": 2}),
                &[201],
            )
            .await;

        assert_eq!(json["achievements"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_add_achievement_wrong_json() {
        let app = app_with_profile(1).await;

        app.post_and_check_status("/profiles/1/add_achievement/", &json!({}), &[400])
            .await;
    }

    #[tokio::test]
    async fn test_add_owned_achievement() {
        let app = app_with_profile(1).await;

        app.post_and_check_status(
            "/profiles/1/add_achievement/",
            &json!({"achievement_id": 1}),
            &[400],
        )
        .await;
    }

    #[tokio::test]
    async fn test_add_unknown_achievement() {
        let mut app = app_with_profile(1).await;
        app.token.set_error(ErrorKey::Awards, MockError::BadCode404);

        app.post_and_check_status(
            "/profiles/1/add_achievement/",
            &json!({"achievement_id": 2}),
            &[400],
        )
        .await;
    }

    #[tokio::test]
    async fn test_add_achievement_auth_service_error() {
        let mut app = app_with_profile(1).await;
        app.token.set_error(ErrorKey::AppAuth, MockError::ErrorToken);

        app.post_and_check_status(
            "/profiles/1/add_achievement/",
            &json!({"achievement_id": 2}),
            &[401, 403],
        )
        .await;
    }

    #[tokio::test]
    async fn test_add_achievement_wrong_app_token() {
        let mut app = app_with_profile(1).await;
        app.token.set_error(ErrorKey::AppAuth, MockError::BadCode401);

        app.post_and_check_status(
            "/profiles/1/add_achievement/",
            &json!({"achievement_id": 2}),
            &[401, 403],
        )
        .await;
    }

    #[tokio::test]
    async fn test_add_negative_achievement() {
        let app = app_with_profile(1).await;

        let json = app
            .post_and_check_status(
                "/profiles/1/add_achievement/",
                &json!({"achievement_id": -3}),
                &[400],
            )
            .await;
        assert_eq!(json["code"], "BAD_REQUEST");

        let profile = app.store.find_by_user_id(1).await.unwrap().unwrap();
        assert_eq!(profile.achievements.as_slice(), &[1]);
    }

    #[tokio::test]
    async fn test_add_achievement_missing_profile() {
        let app = app_with_profile(1).await;

        app.post_and_check_status(
            "/profiles/1001/add_achievement/",
            &json!({"achievement_id": 2}),
            &[404],
        )
        .await;
    }

    // ------------------------------------------------------------------
    // /profiles/{user_id}/buy_pin/
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_buy_pin() {
        let app = app_with_profile(1).await;
        set_money(&app, 1, 100).await;

        let json = app
            .post_and_check_status(
                "/profiles/1/buy_pin/",
                &json!({"pin_id": 3, "price": 10}),
                &[201],
            )
            .await;

        assert_eq!(json["money"], 90);
        assert_eq!(json["unlocked_pins"], json!([1, 3]));
    }

    #[tokio::test]
    async fn test_buy_pin_wrong_json() {
        let app = app_with_profile(1).await;
        set_money(&app, 1, 100).await;

        app.post_and_check_status("/profiles/1/buy_pin/", &json!({}), &[400])
            .await;
        app.post_and_check_status(
            "/profiles/1/buy_pin/",
            &json!({"achievement_id": 1, "price": 10}),
            &[400],
        )
        .await;
    }

    #[tokio::test]
    async fn test_buy_owned_pin() {
        let app = app_with_profile(1).await;
        set_money(&app, 1, 100).await;

        app.post_and_check_status(
            "/profiles/1/buy_pin/",
            &json!({"pin_id": 1, "price": 10}),
            &[400],
        )
        .await;
    }

    #[tokio::test]
    async fn test_buy_pin_not_enough_money() {
        let app = app_with_profile(1).await;
        set_money(&app, 1, 100).await;

        app.post_and_check_status(
            "/profiles/1/buy_pin/",
            &json!({"pin_id": 3, "price": 1000}),
            &[400],
        )
        .await;

        let profile = app.store.find_by_user_id(1).await.unwrap().unwrap();
        assert_eq!(profile.money, 100);
        assert!(!profile.unlocked_pins.contains(3));
    }

    #[tokio::test]
    async fn test_buy_negative_pin() {
        let app = app_with_profile(1).await;
        set_money(&app, 1, 100).await;

        app.post_and_check_status(
            "/profiles/1/buy_pin/",
            &json!({"pin_id": -1, "price": 10}),
            &[400],
        )
        .await;
        app.post_and_check_status(
            "/profiles/1/buy_pin/",
            &json!({"pin_id": 0, "price": 10}),
            &[400],
        )
        .await;

        let profile = app.store.find_by_user_id(1).await.unwrap().unwrap();
        assert_eq!(profile.money, 100);
        assert_eq!(profile.unlocked_pins.as_slice(), &[1]);
    }

    #[tokio::test]
    async fn test_buy_pin_wrong_app_token() {
        let mut app = app_with_profile(1).await;
        set_money(&app, 1, 100).await;
        app.token.set_error(ErrorKey::AppAuth, MockError::BadCode401);

        app.post_and_check_status(
            "/profiles/1/buy_pin/",
            &json!({"pin_id": 3, "price": 10}),
            &[401, 403],
        )
        .await;
    }

    #[tokio::test]
    async fn test_buy_pin_awards_service_down() {
        let mut app = app_with_profile(1).await;
        set_money(&app, 1, 100).await;
        app.token.set_error(ErrorKey::Awards, MockError::ErrorToken);

        app.post_and_check_status(
            "/profiles/1/buy_pin/",
            &json!({"pin_id": 3, "price": 10}),
            &[500],
        )
        .await;
    }

    // ------------------------------------------------------------------
    // /profiles/{user_id}/update_rating/
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_update_rating() {
        let app = app_with_profile(1).await;

        app.patch_and_check_status("/profiles/1/update_rating/", &json!({"d_rating": 100}), &[202])
            .await;

        let profile = app.store.find_by_user_id(1).await.unwrap().unwrap();
        assert_eq!(profile.rating, 100);
    }

    #[tokio::test]
    async fn test_update_rating_clamps_at_zero() {
        let app = app_with_profile(1).await;

        app.patch_and_check_status(
            "/profiles/1/update_rating/",
            &json!({"d_rating": -100}),
            &[202],
        )
        .await;

        let profile = app.store.find_by_user_id(1).await.unwrap().unwrap();
        assert_eq!(profile.rating, 0);
    }

    #[tokio::test]
    async fn test_update_rating_wrong_json() {
        let app = app_with_profile(1).await;

        app.patch_and_check_status("/profiles/1/update_rating/", &json!({}), &[400])
            .await;
    }

    #[tokio::test]
    async fn test_update_rating_auth_service_error() {
        let mut app = app_with_profile(1).await;
        app.token.set_error(ErrorKey::AppAuth, MockError::ErrorToken);

        app.patch_and_check_status(
            "/profiles/1/update_rating/",
            &json!({"d_rating": 100}),
            &[401, 403],
        )
        .await;
    }

    // ------------------------------------------------------------------
    // /profiles/{user_id}/add_awards/
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_add_awards() {
        let app = app_with_profile(1).await;

        let json = app
            .post_and_check_status(
                "/profiles/1/add_awards/",
                &json!({"pins": [2, 3], "geopins": [4], "achievements": [1]}),
                &[201],
            )
            .await;

        fields_test(
            &json,
            &["unlocked_pins", "unlocked_geopins", "achievements"],
            false,
        );
        assert_eq!(json["unlocked_pins"], json!([1, 2, 3]));
        assert_eq!(json["unlocked_geopins"], json!([1, 4]));
        assert_eq!(json["achievements"], json!([1, 1]));
    }

    #[tokio::test]
    async fn test_add_awards_unknown_id() {
        let mut app = app_with_profile(1).await;
        app.token.set_error(ErrorKey::Awards, MockError::BadCode404);

        app.post_and_check_status("/profiles/1/add_awards/", &json!({"pins": [9]}), &[400])
            .await;

        let profile = app.store.find_by_user_id(1).await.unwrap().unwrap();
        assert_eq!(profile.unlocked_pins.as_slice(), &[1]);
    }

    #[tokio::test]
    async fn test_add_awards_rejects_non_positive_ids() {
        let app = app_with_profile(1).await;

        app.post_and_check_status("/profiles/1/add_awards/", &json!({"pins": [-1]}), &[400])
            .await;
        app.post_and_check_status(
            "/profiles/1/add_awards/",
            &json!({"pins": [2], "achievements": [0]}),
            &[400],
        )
        .await;

        let profile = app.store.find_by_user_id(1).await.unwrap().unwrap();
        assert_eq!(profile.unlocked_pins.as_slice(), &[1]);
        assert_eq!(profile.achievements.as_slice(), &[1]);

        // The profile still round-trips through the text form
        let json = app.get_and_check_status("/profiles/1/", &[200]).await;
        assert_eq!(json["unlocked_pins"], json!([1]));
    }

    #[tokio::test]
    async fn test_concurrent_add_awards_keep_every_pin() {
        let app = app_with_profile(1).await;

        let first_body = json!({"pins": [2]});
        let second_body = json!({"pins": [3]});
        let (first, second) = tokio::join!(
            app.request(
                axum::http::Method::POST,
                "/profiles/1/add_awards/",
                Some(&first_body),
                true,
            ),
            app.request(
                axum::http::Method::POST,
                "/profiles/1/add_awards/",
                Some(&second_body),
                true,
            ),
        );
        assert_eq!(first.0, StatusCode::CREATED);
        assert_eq!(second.0, StatusCode::CREATED);

        let profile = app.store.find_by_user_id(1).await.unwrap().unwrap();
        assert!(profile.unlocked_pins.contains(2));
        assert!(profile.unlocked_pins.contains(3));
        assert_eq!(profile.unlocked_pins.as_slice().len(), 3);
    }

    #[tokio::test]
    async fn test_add_awards_wrong_app_token() {
        let mut app = app_with_profile(1).await;
        app.token.set_error(ErrorKey::AppAuth, MockError::BadCode403);

        app.post_and_check_status("/profiles/1/add_awards/", &json!({"pins": [2]}), &[403])
            .await;
    }

    #[tokio::test]
    async fn test_registered_user_profile_is_listed() {
        let app = TestApp::new();
        let (user, _) = app
            .store
            .create_with_profile(&crate::core::db::NewUser {
                username: "lister".to_string(),
                email: "lister@example.com".to_string(),
                password_hash: "hash".to_string(),
                is_superuser: false,
            })
            .await
            .unwrap();

        let json = app.get_and_check_status("/profiles/", &[200]).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["user_id"], user.id);

        UserStore::delete(app.store.as_ref(), user.id).await.unwrap();
        let json = app.get_and_check_status("/profiles/", &[200]).await;
        assert_eq!(json, json!([]));
    }

    #[test]
    fn test_profile_api_error_display() {
        assert_eq!(ProfileApiError::NotFound.to_string(), "Profile not found");
        assert_eq!(
            ProfileApiError::AlreadyExists(4).to_string(),
            "Profile for user 4 already exists"
        );
        assert_eq!(
            ProfileApiError::UnknownResource("pin 3".to_string()).to_string(),
            "Unknown pin 3"
        );
    }

    #[test]
    fn test_id_checks() {
        assert!(check_positive("pin_sprite", None).is_ok());
        assert!(check_positive("pin_sprite", Some(1)).is_ok());
        assert!(matches!(
            check_positive("pin_sprite", Some(0)),
            Err(ProfileApiError::BadRequest(_))
        ));

        assert!(check_award_ids("pins", &[]).is_ok());
        assert!(check_award_ids("pins", &[1, 2]).is_ok());
        assert!(matches!(
            check_award_ids("pins", &[2, -7]),
            Err(ProfileApiError::BadRequest(msg)) if msg.contains("-7")
        ));
    }

    #[test]
    fn test_lookup_error_mapping() {
        let status = |status: u16| RequesterError::Status {
            service: "awards",
            status,
            body: String::new(),
        };

        assert!(matches!(
            lookup_error("pin", 1, status(404)),
            ProfileApiError::UnknownResource(_)
        ));
        assert!(matches!(
            lookup_error("pin", 1, status(400)),
            ProfileApiError::UnknownResource(_)
        ));
        assert!(matches!(
            lookup_error("pin", 1, status(502)),
            ProfileApiError::UpstreamError(_)
        ));
    }
}
