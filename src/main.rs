//! Kontak - Main Application Entry Point
//!
//! A multi-tenant contact-management REST backend: user authentication,
//! per-user contact CRUD with batch ingestion and duplicate detection, an
//! admin statistics surface, and an API-key-gated public endpoint for
//! external web forms.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: session tokens for the interactive API, SHA-256
//!   hashed API keys for public ingestion
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod phone;
mod services;

use tracing_subscriber::EnvFilter;

use axum::{
    Router,
    extract::FromRef,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{config::Config, db::DbPool};

/// Shared application state: the connection pool plus configuration.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
}

// Lets handlers that only need the pool extract `State<DbPool>` directly.
impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> DbPool {
        state.pool.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    // Admin routes: session auth plus the admin role gate
    let admin_routes = Router::new()
        .route("/api/v1/admin/stats", get(handlers::admin::get_stats))
        .route_layer(axum_middleware::from_fn(middleware::auth::require_admin));

    // Session-authenticated routes (interactive API)
    let session_routes = Router::new()
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/me", get(handlers::auth::me))
        // Contact management routes
        .route("/api/v1/contacts", post(handlers::contacts::create_contact))
        .route("/api/v1/contacts", get(handlers::contacts::list_contacts))
        .route(
            "/api/v1/contacts/batch",
            post(handlers::contacts::batch_ingest),
        )
        .route("/api/v1/contacts/{id}", get(handlers::contacts::get_contact))
        .route(
            "/api/v1/contacts/{id}",
            put(handlers::contacts::update_contact),
        )
        .route(
            "/api/v1/contacts/{id}",
            delete(handlers::contacts::delete_contact),
        )
        // API key management routes
        .route("/api/v1/keys", post(handlers::api_keys::create_key))
        .route("/api/v1/keys", get(handlers::api_keys::list_keys))
        .route("/api/v1/keys/{id}", delete(handlers::api_keys::revoke_key))
        .merge(admin_routes)
        // Apply session authentication to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            pool.clone(),
            middleware::auth::session_auth,
        ));

    // Public ingestion route, gated by API key instead of a session
    let public_routes = Router::new()
        .route("/public/v1/contacts", post(handlers::public::submit_contact))
        .route_layer(axum_middleware::from_fn_with_state(
            pool.clone(),
            middleware::auth::api_key_auth,
        ));

    // Combine authenticated routes with public routes
    let app = Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .merge(session_routes)
        .merge(public_routes)
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(state.clone());

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests
    // This blocks forever, handling requests concurrently with tokio
    axum::serve(listener, app).await?;

    Ok(())
}
