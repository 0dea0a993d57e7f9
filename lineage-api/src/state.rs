//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Duration;

use lineage_storage::{GenealogyStore, QueryCache};

use crate::routes::graphql::LineageSchema;

/// Application-wide state shared across all routes.
///
/// The store and cache are process-wide; batch loader registries are NOT
/// held here because they are request-scoped and created inside the
/// GraphQL handler for each incoming request.
#[derive(Clone)]
pub struct AppState {
    /// Storage backend handle.
    pub store: Arc<dyn GenealogyStore>,
    /// Process-wide query result cache for expensive aggregates.
    pub cache: Arc<QueryCache>,
    /// The GraphQL schema (holds its own store/cache handles as data).
    pub schema: LineageSchema,
    /// Debounce window handed to each per-request loader registry.
    pub batch_delay: Duration,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn GenealogyStore>,
        cache: Arc<QueryCache>,
        batch_delay: Duration,
    ) -> Self {
        let schema = crate::routes::graphql::create_schema(Arc::clone(&store), Arc::clone(&cache));
        Self {
            store,
            cache,
            schema,
            batch_delay,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn GenealogyStore>, store);
crate::impl_from_ref!(Arc<QueryCache>, cache);
crate::impl_from_ref!(LineageSchema, schema);
