//! GraphQL integration tests against the in-memory store.
//!
//! The schema is exercised directly (no HTTP) with a fresh loader
//! registry attached to each request, exactly as `graphql_handler` does.

use async_graphql::{Request, Variables};
use async_trait::async_trait;
use chrono::Utc;
use lineage_api::routes::graphql::create_schema;
use lineage_core::{
    Comment, Family, FamilyId, Gender, LifeEvent, MediaItem, Person, PersonId, SourceRecord,
    VitalEvent,
};
use lineage_storage::{
    GenealogyStore, LoaderRegistry, MemoryStore, PageDirection, QueryCache, StoreResult,
    DEFAULT_BATCH_DELAY,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn person(id: &str, first: &str, last: &str) -> Person {
    Person {
        person_id: PersonId::new(id),
        first_name: first.to_string(),
        last_name: last.to_string(),
        maiden_name: None,
        gender: None,
        birth: VitalEvent::default(),
        death: VitalEvent::default(),
        living: false,
        research_notes: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn family(id: &str, husband: Option<&str>, wife: Option<&str>, children: &[&str]) -> Family {
    Family {
        family_id: FamilyId::new(id),
        husband_id: husband.map(PersonId::new),
        wife_id: wife.map(PersonId::new),
        marriage: VitalEvent::default(),
        child_ids: children.iter().map(|c| PersonId::new(*c)).collect(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Three generations: grandparents I1/I2, their children I3 and I4,
/// I3's spouse I5, and I3+I5's child I6.
async fn seed_tree(store: &MemoryStore) {
    store.insert_person(person("I1", "George", "Stone")).await;
    store.insert_person(person("I2", "Mary", "Stone")).await;
    store.insert_person(person("I3", "Henry", "Stone")).await;
    store.insert_person(person("I4", "Alice", "Stone")).await;
    store.insert_person(person("I5", "Clara", "Reed")).await;
    store.insert_person(person("I6", "Edith", "Stone")).await;
    store
        .insert_family(family("F1", Some("I1"), Some("I2"), &["I3", "I4"]))
        .await;
    store
        .insert_family(family("F2", Some("I3"), Some("I5"), &["I6"]))
        .await;
}

async fn execute(
    store: Arc<dyn GenealogyStore>,
    cache: Arc<QueryCache>,
    query: &str,
    variables: Variables,
) -> async_graphql::Response {
    let schema = create_schema(Arc::clone(&store), cache);
    let loaders = LoaderRegistry::new(store, DEFAULT_BATCH_DELAY);
    let request = Request::new(query).variables(variables).data(loaders);
    schema.execute(request).await
}

// ============================================================================
// QUERY TESTS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_person_query_with_nested_relations() {
    let store = MemoryStore::new();
    seed_tree(&store).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{
            person(id: "I6") {
                fullName
                parents { id }
                parentFamilies: familiesAsChild { id }
            }
        }"#,
        Variables::default(),
    )
    .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["person"]["fullName"], "Edith Stone");
    let parent_ids: Vec<&str> = data["person"]["parents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(parent_ids, vec!["I3", "I5"]);
    assert_eq!(data["person"]["parentFamilies"][0]["id"], "F2");
}

#[tokio::test(start_paused = true)]
async fn test_family_query_resolves_members() {
    let store = MemoryStore::new();
    seed_tree(&store).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{
            family(id: "F1") {
                husband { firstName }
                wife { firstName }
                children { id }
            }
        }"#,
        Variables::default(),
    )
    .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["family"]["husband"]["firstName"], "George");
    assert_eq!(data["family"]["wife"]["firstName"], "Mary");
    let child_ids: Vec<&str> = data["family"]["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(child_ids, vec!["I3", "I4"]);
}

#[tokio::test(start_paused = true)]
async fn test_siblings_and_spouses() {
    let store = MemoryStore::new();
    seed_tree(&store).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{
            person(id: "I3") {
                siblings { id }
                spouses { id }
            }
        }"#,
        Variables::default(),
    )
    .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["person"]["siblings"][0]["id"], "I4");
    assert_eq!(data["person"]["spouses"][0]["id"], "I5");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_person_resolves_to_null() {
    let store = MemoryStore::new();
    seed_tree(&store).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{ person(id: "I999") { id } }"#,
        Variables::default(),
    )
    .await;

    assert!(response.errors.is_empty());
    let data = response.data.into_json().unwrap();
    assert!(data["person"].is_null());
}

// ============================================================================
// BATCHING
// ============================================================================

/// Store wrapper that counts bulk person fetches.
struct CountingStore {
    inner: MemoryStore,
    person_batches: AtomicUsize,
}

#[async_trait]
impl GenealogyStore for CountingStore {
    async fn persons_by_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Option<Person>>> {
        self.person_batches.fetch_add(1, Ordering::SeqCst);
        self.inner.persons_by_ids(ids).await
    }
    async fn families_by_ids(&self, ids: &[FamilyId]) -> StoreResult<Vec<Option<Family>>> {
        self.inner.families_by_ids(ids).await
    }
    async fn children_by_family_ids(&self, ids: &[FamilyId]) -> StoreResult<Vec<Vec<Person>>> {
        self.inner.children_by_family_ids(ids).await
    }
    async fn families_as_spouse_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<Family>>> {
        self.inner.families_as_spouse_by_person_ids(ids).await
    }
    async fn families_as_child_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<Family>>> {
        self.inner.families_as_child_by_person_ids(ids).await
    }
    async fn events_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<LifeEvent>>> {
        self.inner.events_by_person_ids(ids).await
    }
    async fn sources_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<SourceRecord>>> {
        self.inner.sources_by_person_ids(ids).await
    }
    async fn media_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<MediaItem>>> {
        self.inner.media_by_person_ids(ids).await
    }
    async fn comments_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<Comment>>> {
        self.inner.comments_by_person_ids(ids).await
    }
    async fn person_page(
        &self,
        position: Option<&PersonId>,
        limit: usize,
        direction: PageDirection,
    ) -> StoreResult<Vec<Person>> {
        self.inner.person_page(position, limit, direction).await
    }
    async fn person_count(&self) -> StoreResult<i64> {
        self.inner.person_count().await
    }
    async fn family_count(&self) -> StoreResult<i64> {
        self.inner.family_count().await
    }
    async fn all_persons(&self) -> StoreResult<Vec<Person>> {
        self.inner.all_persons().await
    }
    async fn all_families(&self) -> StoreResult<Vec<Family>> {
        self.inner.all_families().await
    }
    async fn create_person(&self, person: Person) -> StoreResult<Person> {
        self.inner.create_person(person).await
    }
    async fn update_person(&self, person: Person) -> StoreResult<Option<Person>> {
        self.inner.update_person(person).await
    }
    async fn delete_person(&self, id: &PersonId) -> StoreResult<bool> {
        self.inner.delete_person(id).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_sibling_nodes_share_one_person_batch() {
    let inner = MemoryStore::new();
    seed_tree(&inner).await;
    let store = Arc::new(CountingStore {
        inner,
        person_batches: AtomicUsize::new(0),
    });

    // Husband and wife of two families resolve concurrently; the loader
    // must coalesce all four person lookups into one bulk fetch.
    let response = execute(
        Arc::clone(&store) as Arc<dyn GenealogyStore>,
        Arc::new(QueryCache::default()),
        r#"{
            f1: family(id: "F1") { husband { id } wife { id } }
            f2: family(id: "F2") { husband { id } wife { id } }
        }"#,
        Variables::default(),
    )
    .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(store.person_batches.load(Ordering::SeqCst), 1);
}

// ============================================================================
// PAGINATION
// ============================================================================

async fn seed_numbered(store: &MemoryStore, count: usize) {
    for i in 1..=count {
        store
            .insert_person(person(&format!("I{i:03}"), "P", &format!("N{i:03}")))
            .await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_people_forward_pagination() {
    let store = MemoryStore::new();
    seed_numbered(&store, 7).await;
    let store: Arc<dyn GenealogyStore> = Arc::new(store);
    let cache = Arc::new(QueryCache::default());

    let response = execute(
        Arc::clone(&store),
        Arc::clone(&cache),
        r#"{
            people(first: 3) {
                edges { node { id } cursor }
                pageInfo { hasNextPage hasPreviousPage endCursor }
                totalCount
            }
        }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    let people = &data["people"];
    assert_eq!(people["totalCount"], 7);
    assert_eq!(people["edges"].as_array().unwrap().len(), 3);
    assert_eq!(people["edges"][0]["node"]["id"], "I001");
    assert_eq!(people["pageInfo"]["hasNextPage"], true);
    assert_eq!(people["pageInfo"]["hasPreviousPage"], false);

    // Resume from the end cursor
    let end_cursor = people["pageInfo"]["endCursor"].as_str().unwrap().to_string();
    let response = execute(
        store,
        cache,
        &format!(
            r#"{{
                people(first: 3, after: "{end_cursor}") {{
                    edges {{ node {{ id }} }}
                    pageInfo {{ hasNextPage hasPreviousPage }}
                }}
            }}"#
        ),
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["people"]["edges"][0]["node"]["id"], "I004");
    assert_eq!(data["people"]["pageInfo"]["hasNextPage"], true);
    assert_eq!(data["people"]["pageInfo"]["hasPreviousPage"], true);
}

#[tokio::test(start_paused = true)]
async fn test_people_backward_pagination_returns_ascending_page() {
    let store = MemoryStore::new();
    seed_numbered(&store, 5).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{
            people(last: 2) {
                edges { node { id } }
                pageInfo { hasPreviousPage hasNextPage }
            }
        }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    let ids: Vec<&str> = data["people"]["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["node"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["I004", "I005"]);
    assert_eq!(data["people"]["pageInfo"]["hasPreviousPage"], true);
    assert_eq!(data["people"]["pageInfo"]["hasNextPage"], false);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_cursor_is_rejected() {
    let store = MemoryStore::new();
    seed_numbered(&store, 3).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{ people(first: 2, after: "!!!not-base64!!!") { totalCount } }"#,
        Variables::default(),
    )
    .await;
    assert_eq!(response.errors.len(), 1);
    assert!(response.errors[0].message.contains("Invalid cursor"));
}

#[tokio::test(start_paused = true)]
async fn test_oversized_page_request_is_clamped() {
    let store = MemoryStore::new();
    seed_numbered(&store, 120).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{ people(first: 5000) { edges { node { id } } pageInfo { hasNextPage } } }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["people"]["edges"].as_array().unwrap().len(), 100);
    assert_eq!(data["people"]["pageInfo"]["hasNextPage"], true);
}

// ============================================================================
// SEARCH
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_search_matches_across_diacritics() {
    let store = MemoryStore::new();
    store.insert_person(person("I1", "Ren\u{e9}", "Dupont")).await;
    store.insert_person(person("I2", "Renata", "Kowalski")).await;
    store.insert_person(person("I3", "Bob", "Smith")).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{
            searchPeople(query: "Rene") {
                edges { node { person { id } score } }
                totalCount
            }
        }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    let ids: Vec<&str> = data["searchPeople"]["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["node"]["person"]["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"I1"), "accent-folded prefix must match: {ids:?}");
    assert!(ids.contains(&"I2"));
    assert!(!ids.contains(&"I3"));
}

#[tokio::test(start_paused = true)]
async fn test_search_pagination_slices_ranked_list() {
    let store = MemoryStore::new();
    for i in 1..=6 {
        store
            .insert_person(person(&format!("I{i}"), "Jan", &format!("Novak{i}")))
            .await;
    }
    let store: Arc<dyn GenealogyStore> = Arc::new(store);
    let cache = Arc::new(QueryCache::default());

    let response = execute(
        Arc::clone(&store),
        Arc::clone(&cache),
        r#"{
            searchPeople(query: "Jan", first: 4) {
                edges { node { person { id } } }
                pageInfo { hasNextPage endCursor }
                totalCount
            }
        }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["searchPeople"]["totalCount"], 6);
    assert_eq!(data["searchPeople"]["edges"].as_array().unwrap().len(), 4);
    assert_eq!(data["searchPeople"]["pageInfo"]["hasNextPage"], true);

    let cursor = data["searchPeople"]["pageInfo"]["endCursor"]
        .as_str()
        .unwrap()
        .to_string();
    let response = execute(
        store,
        cache,
        &format!(
            r#"{{
                searchPeople(query: "Jan", first: 4, after: "{cursor}") {{
                    edges {{ node {{ person {{ id }} }} }}
                    pageInfo {{ hasNextPage hasPreviousPage }}
                }}
            }}"#
        ),
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["searchPeople"]["edges"].as_array().unwrap().len(), 2);
    assert_eq!(data["searchPeople"]["pageInfo"]["hasNextPage"], false);
    assert_eq!(data["searchPeople"]["pageInfo"]["hasPreviousPage"], true);
}

// ============================================================================
// RELATIONSHIPS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_relationship_grandparent() {
    let store = MemoryStore::new();
    seed_tree(&store).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{
            relationship(personA: "I1", personB: "I6") {
                relationship
                distance
            }
        }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["relationship"]["relationship"], "Grandchild");
    assert_eq!(data["relationship"]["distance"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_relationship_aunt_uncle() {
    let store = MemoryStore::new();
    seed_tree(&store).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{ relationship(personA: "I6", personB: "I4") { relationship } }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["relationship"]["relationship"], "Aunt/Uncle");
}

#[tokio::test(start_paused = true)]
async fn test_relationship_disconnected_is_null() {
    let store = MemoryStore::new();
    seed_tree(&store).await;
    store.insert_person(person("I99", "Lone", "Wolf")).await;

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"{ relationship(personA: "I1", personB: "I99") { relationship } }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert!(data["relationship"].is_null());
}

// ============================================================================
// STATISTICS & MUTATIONS
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_statistics_cached_until_mutation() {
    let store = MemoryStore::new();
    seed_tree(&store).await;
    let store: Arc<dyn GenealogyStore> = Arc::new(store);
    let cache = Arc::new(QueryCache::default());

    let stats_query = r#"{ statistics { personCount familyCount topSurnames { surname count } } }"#;
    let response = execute(Arc::clone(&store), Arc::clone(&cache), stats_query, Variables::default()).await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["statistics"]["personCount"], 6);
    assert_eq!(data["statistics"]["familyCount"], 2);
    assert_eq!(data["statistics"]["topSurnames"][0]["surname"], "Stone");
    assert_eq!(cache.len(), 1);

    // Creating a person clears the cached aggregate
    let response = execute(
        Arc::clone(&store),
        Arc::clone(&cache),
        r#"mutation {
            createPerson(input: { id: "I7", firstName: "New", lastName: "Stone" }) { id }
        }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(cache.len(), 0);

    let response = execute(store, cache, stats_query, Variables::default()).await;
    let data = response.data.into_json().unwrap();
    assert_eq!(data["statistics"]["personCount"], 7);
}

#[tokio::test(start_paused = true)]
async fn test_update_and_delete_person() {
    let store = MemoryStore::new();
    seed_tree(&store).await;
    let store: Arc<dyn GenealogyStore> = Arc::new(store);
    let cache = Arc::new(QueryCache::default());

    let response = execute(
        Arc::clone(&store),
        Arc::clone(&cache),
        r#"mutation {
            updatePerson(id: "I6", input: { firstName: "Edie" }) { firstName lastName }
        }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["updatePerson"]["firstName"], "Edie");
    assert_eq!(data["updatePerson"]["lastName"], "Stone");

    let response = execute(
        Arc::clone(&store),
        Arc::clone(&cache),
        r#"mutation { deletePerson(id: "I6") }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert_eq!(data["deletePerson"], true);

    let response = execute(
        store,
        cache,
        r#"mutation { deletePerson(id: "I6") }"#,
        Variables::default(),
    )
    .await;
    let data = response.data.into_json().unwrap();
    assert_eq!(data["deletePerson"], false);
}

#[tokio::test(start_paused = true)]
async fn test_update_unknown_person_is_null() {
    let store = MemoryStore::new();

    let response = execute(
        Arc::new(store),
        Arc::new(QueryCache::default()),
        r#"mutation { updatePerson(id: "I404", input: { firstName: "X" }) { id } }"#,
        Variables::default(),
    )
    .await;
    assert!(response.errors.is_empty(), "{:?}", response.errors);
    let data = response.data.into_json().unwrap();
    assert!(data["updatePerson"].is_null());
}
