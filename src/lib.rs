use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod storage;
pub mod uploader;

use auth::SessionVerifier;
use config::Config;
use database::Database;
use handlers::AppState;
use storage::ObjectStore;

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn create_app(database: Database, storage: Arc<dyn ObjectStore>, config: Config) -> Router {
    let state = AppState {
        database,
        storage,
        sessions: SessionVerifier::new(&config.session_jwt_secret),
        config,
    };

    Router::new()
        .route("/api/upload", post(handlers::files::upload))
        .route("/api/files/list", get(handlers::files::list))
        .route("/api/files/download", get(handlers::files::download))
        .route("/api/files/delete", delete(handlers::files::delete))
        .route("/api/register", post(handlers::account::register))
        .route("/api/webhooks/clerk", post(handlers::webhooks::clerk))
        .route("/health", get(handlers::health::liveness))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
