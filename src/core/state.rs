//! Shared application state and the top-level router

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::db::{MemoryStore, PgPool, ProfileRepository, ProfileStore, UserRepository, UserStore};
use crate::core::profiles::profiles_router;
use crate::core::requesters::Requesters;
use crate::core::users::users_router;

#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileStore>,
    pub users: Arc<dyn UserStore>,
    pub requesters: Requesters,
}

impl AppState {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        users: Arc<dyn UserStore>,
        requesters: Requesters,
    ) -> Self {
        Self {
            profiles,
            users,
            requesters,
        }
    }

    /// State backed by PostgreSQL repositories
    pub fn postgres(pool: PgPool, requesters: Requesters) -> Self {
        Self::new(
            Arc::new(ProfileRepository::new(pool.clone())),
            Arc::new(UserRepository::new(pool)),
            requesters,
        )
    }

    /// State backed by a fresh in-memory store
    pub fn in_memory(requesters: Requesters) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store, requesters)
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// GET /health/
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.profiles.health_check().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                }),
            )
        }
    }
}

/// Build the full application router
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(profiles_router())
        .merge(users_router())
        .route("/health/", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new().gzip(true))
        .with_state(state)
}
