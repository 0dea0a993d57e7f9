//! Lineage Storage - Data Access Layer
//!
//! Defines the storage abstraction for genealogical entities along with the
//! pieces every backend shares: request-scoped batch loaders that coalesce
//! per-entity lookups into bulk fetches, and a process-wide TTL cache for
//! expensive aggregate queries.
//!
//! Two backends implement the [`GenealogyStore`] trait: [`PgStore`] over a
//! deadpool-postgres pool for production, and [`MemoryStore`] for tests and
//! local development.

pub mod cache;
pub mod error;
pub mod loader;
pub mod memory;
pub mod pg;
pub mod store;

pub use cache::{
    CacheStats, QueryCache, QueryCacheConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL,
};
pub use error::{StoreError, StoreResult};
pub use loader::{BatchFn, BatchLoader, LoaderRegistry, DEFAULT_BATCH_DELAY};
pub use memory::MemoryStore;
pub use pg::{PgConfig, PgStore};
pub use store::{GenealogyStore, PageDirection};
