//! Store Standards Tracker Backend
//!
//! REST backend tracking compliance tasks across stores, with a live mirror of
//! the task collection, photo evidence and Excel import/export.

mod api;
mod auth;
mod config;
mod dates;
mod db;
mod errors;
mod filter;
mod models;
mod photos;
mod spreadsheet;
mod sync;
mod tasks;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::{Repository, TaskStore};
use photos::{ImageHost, ImgbbHost};
use sync::TaskMirror;

/// Multipart uploads carry several full-size photos or a workbook.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TaskStore>,
    pub mirror: Arc<TaskMirror>,
    pub images: Arc<dyn ImageHost>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting Store Standards Tracker Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Stores: {}", config.stores.join(", "));

    if config.image_host_key.is_none() {
        tracing::warn!(
            "No image host key configured (STANDARDS_IMAGE_HOST_KEY). Photo uploads will fail!"
        );
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let store: Arc<dyn TaskStore> = Arc::new(Repository::new(pool));

    // One standing subscription for the whole process
    let mirror = Arc::new(TaskMirror::mount(store.clone()).await?);
    tracing::info!("Task mirror mounted at revision {}", mirror.revision());

    let images: Arc<dyn ImageHost> = Arc::new(ImgbbHost::from_config(&config)?);

    let state = AppState {
        store,
        mirror: mirror.clone(),
        images,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    mirror.shutdown();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Routes behind the access code
    let protected_routes = Router::new()
        // Session
        .route("/session/me", get(api::whoami))
        // Stores and sync
        .route("/stores", get(api::list_stores))
        .route("/sync/status", get(api::sync_status))
        .route("/sync/remount", post(api::remount))
        // Tasks
        .route("/tasks", get(api::list_tasks).post(api::create_task))
        .route("/tasks/all-stores", post(api::create_for_all_stores))
        .route("/tasks/with-photos", post(api::create_with_photos))
        .route("/tasks/export", get(api::export_tasks))
        .route("/tasks/import", post(api::import_tasks))
        .route(
            "/tasks/{id}",
            get(api::get_task)
                .patch(api::update_task)
                .delete(api::delete_task),
        )
        // Photos
        .route(
            "/tasks/{id}/photos/{kind}",
            post(api::upload_photos).delete(api::detach_photo),
        )
        .route_layer(middleware::from_fn(auth::access_code_layer));

    // Login (no access code yet)
    let public_routes = Router::new().route("/session", post(api::login));

    let api_routes = protected_routes
        .merge(public_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
