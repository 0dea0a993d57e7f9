//! Lineage API - GraphQL Surface
//!
//! The HTTP layer of the Lineage genealogical record store: an axum
//! server exposing an async-graphql schema over the storage layer. Each
//! incoming GraphQL request gets its own batch loader registry so nested
//! selections coalesce into bulk fetches; expensive aggregates go through
//! the process-wide query result cache.

pub mod config;
pub mod error;
pub mod macros;
pub mod pagination;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;
