//! Storage seam for the Lineage record store.
//!
//! Every read is a bulk key-based fetch: the batch loading layer merges
//! many single-entity lookups into one call against these methods, so each
//! method must return a same-length, same-order result for its key slice.
//! The core never opens connections or manages pooling itself; backends do.

use crate::error::StoreResult;
use async_trait::async_trait;
use lineage_core::{
    Comment, Family, FamilyId, LifeEvent, MediaItem, Person, PersonId, SourceRecord,
};

/// Direction of a keyset page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    /// Ascending by id, rows strictly after the position.
    Forward,
    /// Descending by id, rows strictly before the position.
    Backward,
}

/// Bulk-fetch capability over the underlying relational store.
///
/// Contract for the `*_by_ids` / `*_by_person_ids` methods: the result
/// vector has exactly one element per input key, in input order. Entity
/// lookups yield `None` for misses; grouped relations yield an empty
/// `Vec`. Missing data is never an error.
#[async_trait]
pub trait GenealogyStore: Send + Sync {
    // ------------------------------------------------------------------
    // Bulk fetch, one method per relation kind
    // ------------------------------------------------------------------

    async fn persons_by_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Option<Person>>>;

    async fn families_by_ids(&self, ids: &[FamilyId]) -> StoreResult<Vec<Option<Family>>>;

    /// Children of each family, resolved to full person records.
    async fn children_by_family_ids(&self, ids: &[FamilyId]) -> StoreResult<Vec<Vec<Person>>>;

    /// Families in which each person appears as husband or wife.
    async fn families_as_spouse_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<Family>>>;

    /// Families in which each person appears as a child.
    async fn families_as_child_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<Family>>>;

    async fn events_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<LifeEvent>>>;

    async fn sources_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<SourceRecord>>>;

    async fn media_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<MediaItem>>>;

    async fn comments_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<Comment>>>;

    // ------------------------------------------------------------------
    // Listing and materialization
    // ------------------------------------------------------------------

    /// Keyset page of persons ordered by id. `position` is exclusive;
    /// `limit` is the row cap (callers overfetch by one to detect more).
    async fn person_page(
        &self,
        position: Option<&PersonId>,
        limit: usize,
        direction: PageDirection,
    ) -> StoreResult<Vec<Person>>;

    /// Exact person count for pagination totals.
    async fn person_count(&self) -> StoreResult<i64>;

    /// Exact family count for aggregate statistics.
    async fn family_count(&self) -> StoreResult<i64>;

    /// Materialize the full person set (search ranking, graph traversal).
    async fn all_persons(&self) -> StoreResult<Vec<Person>>;

    /// Materialize the full family set (graph traversal).
    async fn all_families(&self) -> StoreResult<Vec<Family>>;

    // ------------------------------------------------------------------
    // Thin write plumbing consumed by mutation handlers
    // ------------------------------------------------------------------

    async fn create_person(&self, person: Person) -> StoreResult<Person>;

    /// Returns `None` when no person with that id exists.
    async fn update_person(&self, person: Person) -> StoreResult<Option<Person>>;

    /// Returns whether a row was deleted.
    async fn delete_person(&self, id: &PersonId) -> StoreResult<bool>;
}
