//! orgperm API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use orgperm_core::AppError;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, StorageBackend, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let app_state = match &config.storage {
        StorageBackend::Postgres { database_url } => {
            let pool = api_services::connect_and_migrate(
                database_url,
                config.database_max_connections,
            )
            .await?;
            info!("database migrations applied successfully");

            if config.migrate_only {
                return Ok(());
            }

            api_services::build_postgres_state(pool)
        }
        StorageBackend::Memory => {
            warn!("running with in-memory storage; data is lost on shutdown");
            api_services::build_in_memory_state()
        }
    };

    let app = api_router::build_router(app_state);
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind API listener: {error}")))?;

    info!(%address, "orgperm api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server failed: {error}")))
}
