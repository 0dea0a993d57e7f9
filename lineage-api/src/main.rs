//! Lineage API Server Entry Point
//!
//! Bootstraps configuration, connects the storage pool, and starts the
//! Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use lineage_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState};
use lineage_storage::{PgConfig, PgStore, QueryCache, QueryCacheConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ApiResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let db_config = PgConfig::from_env();
    let store = PgStore::from_config(&db_config)?;

    let api_config = ApiConfig::from_env();
    let cache = Arc::new(QueryCache::new(QueryCacheConfig {
        ttl: api_config.cache_ttl,
        capacity: api_config.cache_capacity,
    }));

    let state = AppState::new(Arc::new(store), cache, api_config.batch_delay);
    let app: Router = create_api_router(state, &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Lineage API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("LINEAGE_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("LINEAGE_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
