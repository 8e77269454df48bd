use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod realtime;
pub mod services;
pub mod store;
pub mod streak;

use auth::{AppwriteAuth, AuthProvider, InMemoryAuth};
use config::{Config, StorageBackend};
use error::{AppError, AppResult};
use realtime::ChangeFeed;
use store::{AppwriteStore, DocumentStore, InMemoryStore};
use streak::StreakEngine;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<Config>,
    pub changes: ChangeFeed,
}

impl AppState {
    /// Process-local store and accounts. Nothing survives a restart.
    pub fn in_memory(config: Config) -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            auth: Arc::new(InMemoryAuth::new()),
            config: Arc::new(config),
            changes: ChangeFeed::new(),
        }
    }

    pub fn from_config(config: Config) -> AppResult<Self> {
        match config.storage {
            StorageBackend::Memory => Ok(Self::in_memory(config)),
            StorageBackend::Appwrite => Ok(Self {
                store: Arc::new(AppwriteStore::new(config.backend.clone())?),
                auth: Arc::new(AppwriteAuth::new(config.backend.clone())?),
                config: Arc::new(config),
                changes: ChangeFeed::new(),
            }),
        }
    }

    /// Engine for the caller's UTC offset in minutes, or the configured default.
    pub fn engine(&self, tz_offset: Option<i32>) -> AppResult<StreakEngine> {
        let minutes = tz_offset.unwrap_or(self.config.default_utc_offset_minutes);
        streak::offset_from_minutes(minutes)
            .map(StreakEngine::new)
            .ok_or_else(|| AppError::Validation("tz_offset must be between -720 and 840 minutes".into()))
    }
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/api/auth/signup", post(handlers::auth::sign_up))
        .route("/api/auth/signin", post(handlers::auth::sign_in));

    let protected_routes = Router::new()
        .route("/api/me", get(handlers::auth::me))
        .route("/api/auth/signout", post(handlers::auth::sign_out))
        // Habits
        .route("/api/habits", get(handlers::habits::list_habits))
        .route("/api/habits", post(handlers::habits::create_habit))
        .route("/api/habits/:id", delete(handlers::habits::delete_habit))
        // Completions
        .route(
            "/api/habits/:id/complete",
            post(handlers::completions::complete_habit),
        )
        .route(
            "/api/completions/today",
            get(handlers::completions::list_today),
        )
        // Streaks
        .route("/api/streaks", get(handlers::streaks::get_streaks))
        .route(
            "/api/streaks/leaderboard",
            get(handlers::streaks::get_leaderboard),
        )
        .route(
            "/api/habits/:id/streak",
            get(handlers::streaks::get_habit_streak),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    let mut origins = Vec::new();
    for origin in std::iter::once(&state.config.frontend_url).chain(&state.config.cors_extra_origins) {
        match origin.parse::<HeaderValue>() {
            Ok(hv) => origins.push(hv),
            Err(_) => tracing::warn!(origin = %origin, "Ignoring invalid CORS origin"),
        }
    }
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
