//! HTTP surface: the scheduled trigger, user catch-up, admin trigger and the
//! ledger/rule CRUD endpoints.

pub mod auth;
pub mod error;
pub mod handlers;

use crate::{
    config::AppConfig,
    errors::{Error, Result},
};
use auth::{IdentityProvider, StaticTokenIdentity};
use axum::{
    Router,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Store of record
    pub db: DatabaseConnection,
    /// Loaded once at startup
    pub config: Arc<AppConfig>,
    /// Session token resolution
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Builds state with the configured static session table as identity provider.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: Arc<AppConfig>) -> Self {
        let identity = Arc::new(StaticTokenIdentity::from_config(&config));
        Self {
            db,
            config,
            identity,
        }
    }
}

/// Builds the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Trigger surfaces
        .route(
            "/api/cron/recurring",
            post(handlers::scheduled_run).get(handlers::scheduled_run),
        )
        .route("/api/recurring/process", post(handlers::catch_up))
        .route("/api/admin/recurring/run", post(handlers::admin_run))
        // Ledger
        .route(
            "/api/transactions",
            get(handlers::get_transactions).post(handlers::post_transaction),
        )
        .route(
            "/api/transactions/:id",
            put(handlers::put_transaction).delete(handlers::remove_transaction),
        )
        // Rules
        .route(
            "/api/rules",
            get(handlers::get_rules).post(handlers::post_rule),
        )
        .route(
            "/api/rules/:id",
            put(handlers::put_rule).delete(handlers::remove_rule),
        )
        .route("/api/rules/:id/toggle", post(handlers::toggle_rule))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serves the router until Ctrl+C.
pub async fn run_server(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
        })
        .await
        .map_err(Error::from)
}
