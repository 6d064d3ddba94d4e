//! HackMate Backend
//!
//! REST backend for the HackMate idea board: idea posting, join requests, and team
//! capacity, persisted in a document store with SQLite or in-memory backends.

mod api;
mod auth;
mod config;
mod engine;
mod errors;
mod identity;
mod models;
mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{DomainPolicy, SessionManager};
use config::{Config, StoreKind};
use engine::TeamEngine;
use identity::DirectoryIdentityProvider;
use store::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TeamEngine>,
    pub sessions: Arc<SessionManager>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting HackMate Backend");
    tracing::info!("Bind address: {}", config.bind_addr);

    match &config.allowed_domain {
        Some(domain) => tracing::info!("Sign-in restricted to @{}", domain),
        None => tracing::warn!("HACKMATE_ALLOWED_DOMAIN is empty. Any email domain may sign in!"),
    }

    // Initialize document store
    let store: Arc<dyn DocumentStore> = match config.store {
        StoreKind::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            let pool = store::init_database(&config.db_path).await?;
            Arc::new(SqliteDocumentStore::new(pool))
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store. Data is lost on shutdown.");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    // Initialize identity provider
    let provider = if config.accounts_path.exists() {
        let provider = DirectoryIdentityProvider::load(&config.accounts_path).await?;
        tracing::info!(
            "Loaded {} account(s) from {:?}",
            provider.account_count(),
            config.accounts_path
        );
        provider
    } else {
        tracing::warn!(
            "Accounts file {:?} not found. Nobody will be able to sign in.",
            config.accounts_path
        );
        DirectoryIdentityProvider::new(Vec::new())
    };

    let sessions = SessionManager::new(
        Arc::new(provider),
        DomainPolicy::new(config.allowed_domain.clone()),
    );

    let engine = TeamEngine::new(store);
    tracing::info!("Document store backend: {}", engine.store_backend());

    // Create application state
    let state = AppState {
        engine: Arc::new(engine),
        sessions: Arc::new(sessions),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sessions = state.sessions.clone();

    // API routes
    let api_routes = Router::new()
        // Sessions
        .route("/auth/sign-in", post(api::sign_in))
        .route("/auth/sign-out", post(api::sign_out))
        .route("/auth/me", get(api::me))
        // Ideas
        .route("/ideas", get(api::list_ideas))
        .route("/ideas", post(api::create_idea))
        .route("/ideas/mine", get(api::my_ideas))
        .route("/ideas/{id}", get(api::get_idea))
        .route("/ideas/{id}/status", get(api::idea_status))
        .route("/ideas/{id}/members", get(api::team_roster))
        .route("/ideas/{id}/requests", post(api::send_join_request))
        .route("/ideas/{id}/members/{member_id}", delete(api::remove_member))
        // Join requests
        .route("/requests/incoming", get(api::incoming_requests))
        .route("/requests/sent", get(api::sent_requests))
        .route("/requests/{id}/approve", post(api::approve_request))
        .route("/requests/{id}/reject", post(api::reject_request))
        // Resolve session tokens into a Caller
        .layer(middleware::from_fn(move |req, next| {
            auth::session_auth_layer(sessions.clone(), req, next)
        }));

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
