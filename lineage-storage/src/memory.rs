//! In-memory `GenealogyStore` backend.
//!
//! Backs unit and integration tests, and doubles as a toy backend for
//! local development. Ids are kept in `BTreeMap`s so keyset pagination
//! sees the same id ordering a relational index would provide.

use crate::error::StoreResult;
use crate::store::{GenealogyStore, PageDirection};
use async_trait::async_trait;
use lineage_core::{
    Comment, Family, FamilyId, LifeEvent, MediaItem, Person, PersonId, SourceRecord,
};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryInner {
    persons: BTreeMap<PersonId, Person>,
    families: BTreeMap<FamilyId, Family>,
    events: Vec<LifeEvent>,
    sources: Vec<SourceRecord>,
    media: Vec<MediaItem>,
    comments: Vec<Comment>,
}

/// In-memory store guarded by an async RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_person(&self, person: Person) {
        let mut inner = self.inner.write().await;
        inner.persons.insert(person.person_id.clone(), person);
    }

    pub async fn insert_family(&self, family: Family) {
        let mut inner = self.inner.write().await;
        inner.families.insert(family.family_id.clone(), family);
    }

    pub async fn insert_event(&self, event: LifeEvent) {
        self.inner.write().await.events.push(event);
    }

    pub async fn insert_source(&self, source: SourceRecord) {
        self.inner.write().await.sources.push(source);
    }

    pub async fn insert_media(&self, media: MediaItem) {
        self.inner.write().await.media.push(media);
    }

    pub async fn insert_comment(&self, comment: Comment) {
        self.inner.write().await.comments.push(comment);
    }
}

#[async_trait]
impl GenealogyStore for MemoryStore {
    async fn persons_by_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Option<Person>>> {
        let inner = self.inner.read().await;
        Ok(ids.iter().map(|id| inner.persons.get(id).cloned()).collect())
    }

    async fn families_by_ids(&self, ids: &[FamilyId]) -> StoreResult<Vec<Option<Family>>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .map(|id| inner.families.get(id).cloned())
            .collect())
    }

    async fn children_by_family_ids(&self, ids: &[FamilyId]) -> StoreResult<Vec<Vec<Person>>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .map(|id| {
                inner
                    .families
                    .get(id)
                    .map(|family| {
                        family
                            .child_ids
                            .iter()
                            .filter_map(|child| inner.persons.get(child).cloned())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect())
    }

    async fn families_as_spouse_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<Family>>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .map(|id| {
                inner
                    .families
                    .values()
                    .filter(|f| {
                        f.husband_id.as_ref() == Some(id) || f.wife_id.as_ref() == Some(id)
                    })
                    .cloned()
                    .collect()
            })
            .collect())
    }

    async fn families_as_child_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<Family>>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .map(|id| {
                inner
                    .families
                    .values()
                    .filter(|f| f.child_ids.contains(id))
                    .cloned()
                    .collect()
            })
            .collect())
    }

    async fn events_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<LifeEvent>>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .map(|id| {
                inner
                    .events
                    .iter()
                    .filter(|e| &e.person_id == id)
                    .cloned()
                    .collect()
            })
            .collect())
    }

    async fn sources_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<SourceRecord>>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .map(|id| {
                inner
                    .sources
                    .iter()
                    .filter(|s| &s.person_id == id)
                    .cloned()
                    .collect()
            })
            .collect())
    }

    async fn media_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<MediaItem>>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .map(|id| {
                inner
                    .media
                    .iter()
                    .filter(|m| &m.person_id == id)
                    .cloned()
                    .collect()
            })
            .collect())
    }

    async fn comments_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<Comment>>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .map(|id| {
                inner
                    .comments
                    .iter()
                    .filter(|c| &c.person_id == id)
                    .cloned()
                    .collect()
            })
            .collect())
    }

    async fn person_page(
        &self,
        position: Option<&PersonId>,
        limit: usize,
        direction: PageDirection,
    ) -> StoreResult<Vec<Person>> {
        let inner = self.inner.read().await;
        let page = match direction {
            PageDirection::Forward => inner
                .persons
                .values()
                .filter(|p| position.map_or(true, |pos| &p.person_id > pos))
                .take(limit)
                .cloned()
                .collect(),
            PageDirection::Backward => inner
                .persons
                .values()
                .rev()
                .filter(|p| position.map_or(true, |pos| &p.person_id < pos))
                .take(limit)
                .cloned()
                .collect(),
        };
        Ok(page)
    }

    async fn person_count(&self) -> StoreResult<i64> {
        Ok(self.inner.read().await.persons.len() as i64)
    }

    async fn family_count(&self) -> StoreResult<i64> {
        Ok(self.inner.read().await.families.len() as i64)
    }

    async fn all_persons(&self) -> StoreResult<Vec<Person>> {
        Ok(self.inner.read().await.persons.values().cloned().collect())
    }

    async fn all_families(&self) -> StoreResult<Vec<Family>> {
        Ok(self.inner.read().await.families.values().cloned().collect())
    }

    async fn create_person(&self, person: Person) -> StoreResult<Person> {
        let mut inner = self.inner.write().await;
        inner.persons.insert(person.person_id.clone(), person.clone());
        Ok(person)
    }

    async fn update_person(&self, person: Person) -> StoreResult<Option<Person>> {
        let mut inner = self.inner.write().await;
        if inner.persons.contains_key(&person.person_id) {
            inner.persons.insert(person.person_id.clone(), person.clone());
            Ok(Some(person))
        } else {
            Ok(None)
        }
    }

    async fn delete_person(&self, id: &PersonId) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.persons.remove(id).is_some())
    }
}
