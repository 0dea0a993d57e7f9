//! GraphQL API Routes
//!
//! This module implements the GraphQL endpoint using async-graphql.
//! It provides Query and Mutation resolvers for all Lineage entities.
//!
//! Endpoints:
//! - POST /api/v1/graphql - Execute GraphQL queries/mutations
//! - GET /api/v1/graphql/playground - GraphiQL playground
//!
//! Every nested relation resolver goes through the request-scoped
//! `LoaderRegistry` injected into the request in `graphql_handler`, so an
//! arbitrarily nested query issues one bulk fetch per relation kind per
//! resolution pass instead of one fetch per node.

use async_graphql::{
    ComplexObject, Context, EmptySubscription, Enum, InputObject, Object, Result as GqlResult,
    Schema, SimpleObject, ID,
};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use lineage_core::{
    decode_cursor, rank_persons, Family, FamilyGraph, FamilyId, Gender, LifeEvent, PathStep,
    Person, PersonId, RelStep, RelationshipPath, VitalEvent,
};
use lineage_storage::{
    GenealogyStore, LoaderRegistry, PageDirection, QueryCache, StoreError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::pagination::{build_connection, clamp_page_size, trim_overfetch, Connection};
use crate::state::AppState;

/// Number of surnames reported by the statistics aggregate.
const TOP_SURNAME_COUNT: usize = 10;

fn storage_error(err: StoreError) -> async_graphql::Error {
    tracing::error!("storage error during GraphQL resolution: {err}");
    async_graphql::Error::new(err.to_string())
}

fn cursor_error(err: lineage_core::CoreError) -> async_graphql::Error {
    async_graphql::Error::new(err.to_string())
}

// ============================================================================
// GRAPHQL TYPES
// ============================================================================

/// GraphQL representation of Gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum, Serialize, Deserialize)]
pub enum GqlGender {
    Male,
    Female,
    Unknown,
}

impl From<Gender> for GqlGender {
    fn from(g: Gender) -> Self {
        match g {
            Gender::Male => GqlGender::Male,
            Gender::Female => GqlGender::Female,
            Gender::Unknown => GqlGender::Unknown,
        }
    }
}

impl From<GqlGender> for Gender {
    fn from(g: GqlGender) -> Self {
        match g {
            GqlGender::Male => Gender::Male,
            GqlGender::Female => Gender::Female,
            GqlGender::Unknown => Gender::Unknown,
        }
    }
}

/// GraphQL vital event (date/place pair).
#[derive(Debug, Clone, SimpleObject)]
pub struct GqlVitalEvent {
    pub date: Option<String>,
    pub place: Option<String>,
    pub estimated: bool,
}

impl From<VitalEvent> for GqlVitalEvent {
    fn from(v: VitalEvent) -> Self {
        Self {
            date: v.date,
            place: v.place,
            estimated: v.estimated,
        }
    }
}

/// GraphQL person object.
///
/// Scalar fields are copied from the entity; relation fields resolve
/// lazily through the loader registry.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex)]
pub struct GqlPerson {
    pub id: ID,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub maiden_name: Option<String>,
    pub gender: Option<GqlGender>,
    pub birth: GqlVitalEvent,
    pub death: GqlVitalEvent,
    pub living: bool,
    pub research_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[graphql(skip)]
    pub(crate) person_id: PersonId,
}

impl From<Person> for GqlPerson {
    fn from(p: Person) -> Self {
        let full_name = p.full_name();
        Self {
            id: ID(p.person_id.as_str().to_string()),
            first_name: p.first_name,
            last_name: p.last_name,
            full_name,
            maiden_name: p.maiden_name,
            gender: p.gender.map(Into::into),
            birth: p.birth.into(),
            death: p.death.into(),
            living: p.living,
            research_notes: p.research_notes.map(|v| v.to_string()),
            created_at: p.created_at.to_rfc3339(),
            updated_at: p.updated_at.to_rfc3339(),
            person_id: p.person_id,
        }
    }
}

#[ComplexObject]
impl GqlPerson {
    /// Parents of this person (from the families where they are a child).
    async fn parents(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlPerson>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let families = loaders
            .families_as_child
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;

        let mut parent_ids: Vec<PersonId> = Vec::new();
        for family in &families {
            for id in family.parent_ids() {
                if !parent_ids.contains(id) {
                    parent_ids.push(id.clone());
                }
            }
        }

        let parents = loaders
            .person
            .load_many(&parent_ids)
            .await
            .map_err(storage_error)?;
        Ok(parents.into_iter().flatten().map(Into::into).collect())
    }

    /// Children of this person (from the families where they are a spouse).
    async fn children(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlPerson>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let families = loaders
            .families_as_spouse
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;

        let mut child_ids: Vec<PersonId> = Vec::new();
        for family in &families {
            for id in &family.child_ids {
                if !child_ids.contains(id) {
                    child_ids.push(id.clone());
                }
            }
        }

        let children = loaders
            .person
            .load_many(&child_ids)
            .await
            .map_err(storage_error)?;
        Ok(children.into_iter().flatten().map(Into::into).collect())
    }

    /// Spouses of this person.
    async fn spouses(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlPerson>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let families = loaders
            .families_as_spouse
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;

        let mut spouse_ids: Vec<PersonId> = Vec::new();
        for family in &families {
            for id in family.parent_ids() {
                if id != &self.person_id && !spouse_ids.contains(id) {
                    spouse_ids.push(id.clone());
                }
            }
        }

        let spouses = loaders
            .person
            .load_many(&spouse_ids)
            .await
            .map_err(storage_error)?;
        Ok(spouses.into_iter().flatten().map(Into::into).collect())
    }

    /// Siblings: every other child of any of this person's parents.
    async fn siblings(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlPerson>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let child_families = loaders
            .families_as_child
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;

        let mut parent_ids: Vec<PersonId> = Vec::new();
        for family in &child_families {
            for id in family.parent_ids() {
                if !parent_ids.contains(id) {
                    parent_ids.push(id.clone());
                }
            }
        }

        // Half-siblings live in the parents' other families, so expand
        // through every family each parent appears in as a spouse.
        let parent_families = loaders
            .families_as_spouse
            .load_many(&parent_ids)
            .await
            .map_err(storage_error)?;

        let mut sibling_ids: Vec<PersonId> = Vec::new();
        for family in parent_families.iter().flatten() {
            for id in &family.child_ids {
                if id != &self.person_id && !sibling_ids.contains(id) {
                    sibling_ids.push(id.clone());
                }
            }
        }

        let siblings = loaders
            .person
            .load_many(&sibling_ids)
            .await
            .map_err(storage_error)?;
        Ok(siblings.into_iter().flatten().map(Into::into).collect())
    }

    /// Families where this person is a spouse.
    async fn families_as_spouse(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlFamily>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let families = loaders
            .families_as_spouse
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;
        Ok(families.into_iter().map(Into::into).collect())
    }

    /// Families where this person is a child.
    async fn families_as_child(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlFamily>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let families = loaders
            .families_as_child
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;
        Ok(families.into_iter().map(Into::into).collect())
    }

    /// Life events attached to this person.
    async fn events(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlLifeEvent>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let events = loaders
            .events_by_person
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;
        Ok(events.into_iter().map(Into::into).collect())
    }

    /// Source citations attached to this person.
    async fn sources(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlSourceRecord>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let sources = loaders
            .sources_by_person
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;
        Ok(sources.into_iter().map(Into::into).collect())
    }

    /// Media items attached to this person.
    async fn media(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlMediaItem>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let media = loaders
            .media_by_person
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;
        Ok(media.into_iter().map(Into::into).collect())
    }

    /// Researcher comments on this person.
    async fn comments(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlComment>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let comments = loaders
            .comments_by_person
            .load(self.person_id.clone())
            .await
            .map_err(storage_error)?;
        Ok(comments.into_iter().map(Into::into).collect())
    }
}

/// GraphQL family object.
#[derive(Debug, Clone, SimpleObject)]
#[graphql(complex)]
pub struct GqlFamily {
    pub id: ID,
    pub marriage: GqlVitalEvent,
    pub created_at: String,
    pub updated_at: String,
    #[graphql(skip)]
    pub(crate) family_id: FamilyId,
    #[graphql(skip)]
    husband_id: Option<PersonId>,
    #[graphql(skip)]
    wife_id: Option<PersonId>,
}

impl From<Family> for GqlFamily {
    fn from(f: Family) -> Self {
        Self {
            id: ID(f.family_id.as_str().to_string()),
            marriage: f.marriage.into(),
            created_at: f.created_at.to_rfc3339(),
            updated_at: f.updated_at.to_rfc3339(),
            family_id: f.family_id,
            husband_id: f.husband_id,
            wife_id: f.wife_id,
        }
    }
}

#[ComplexObject]
impl GqlFamily {
    async fn husband(&self, ctx: &Context<'_>) -> GqlResult<Option<GqlPerson>> {
        let Some(id) = &self.husband_id else {
            return Ok(None);
        };
        let loaders = ctx.data::<LoaderRegistry>()?;
        let person = loaders
            .person
            .load(id.clone())
            .await
            .map_err(storage_error)?;
        Ok(person.map(Into::into))
    }

    async fn wife(&self, ctx: &Context<'_>) -> GqlResult<Option<GqlPerson>> {
        let Some(id) = &self.wife_id else {
            return Ok(None);
        };
        let loaders = ctx.data::<LoaderRegistry>()?;
        let person = loaders
            .person
            .load(id.clone())
            .await
            .map_err(storage_error)?;
        Ok(person.map(Into::into))
    }

    async fn children(&self, ctx: &Context<'_>) -> GqlResult<Vec<GqlPerson>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let children = loaders
            .children_by_family
            .load(self.family_id.clone())
            .await
            .map_err(storage_error)?;
        Ok(children.into_iter().map(Into::into).collect())
    }
}

/// GraphQL life event object.
#[derive(Debug, Clone, SimpleObject)]
pub struct GqlLifeEvent {
    pub id: ID,
    pub event_type: String,
    pub date: Option<String>,
    pub place: Option<String>,
    pub description: Option<String>,
}

impl From<LifeEvent> for GqlLifeEvent {
    fn from(e: LifeEvent) -> Self {
        Self {
            id: ID(e.event_id.as_str().to_string()),
            event_type: e.event_type,
            date: e.date,
            place: e.place,
            description: e.description,
        }
    }
}

/// GraphQL source citation object.
#[derive(Debug, Clone, SimpleObject)]
pub struct GqlSourceRecord {
    pub id: ID,
    pub title: String,
    pub citation: Option<String>,
    pub url: Option<String>,
}

impl From<lineage_core::SourceRecord> for GqlSourceRecord {
    fn from(s: lineage_core::SourceRecord) -> Self {
        Self {
            id: ID(s.source_id.as_str().to_string()),
            title: s.title,
            citation: s.citation,
            url: s.url,
        }
    }
}

/// GraphQL media item object.
#[derive(Debug, Clone, SimpleObject)]
pub struct GqlMediaItem {
    pub id: ID,
    pub file_name: String,
    pub caption: Option<String>,
    pub content_type: Option<String>,
}

impl From<lineage_core::MediaItem> for GqlMediaItem {
    fn from(m: lineage_core::MediaItem) -> Self {
        Self {
            id: ID(m.media_id.as_str().to_string()),
            file_name: m.file_name,
            caption: m.caption,
            content_type: m.content_type,
        }
    }
}

/// GraphQL comment object.
#[derive(Debug, Clone, SimpleObject)]
pub struct GqlComment {
    pub id: ID,
    pub author: String,
    pub text: String,
    pub created_at: String,
}

impl From<lineage_core::Comment> for GqlComment {
    fn from(c: lineage_core::Comment) -> Self {
        Self {
            id: ID(c.comment_id.as_str().to_string()),
            author: c.author,
            text: c.text,
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

/// One search hit with its relevance score.
#[derive(Debug, Clone, SimpleObject)]
pub struct GqlSearchResult {
    pub person: GqlPerson,
    pub score: f64,
}

/// GraphQL representation of a relationship path step kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum GqlRelStep {
    Parent,
    Child,
    Spouse,
    Sibling,
}

impl From<RelStep> for GqlRelStep {
    fn from(s: RelStep) -> Self {
        match s {
            RelStep::Parent => GqlRelStep::Parent,
            RelStep::Child => GqlRelStep::Child,
            RelStep::Spouse => GqlRelStep::Spouse,
            RelStep::Sibling => GqlRelStep::Sibling,
        }
    }
}

/// One step along a computed relationship path.
#[derive(Debug, Clone, SimpleObject)]
pub struct GqlPathStep {
    pub step: GqlRelStep,
    pub person_id: ID,
}

impl From<PathStep> for GqlPathStep {
    fn from(s: PathStep) -> Self {
        Self {
            step: s.step.into(),
            person_id: ID(s.person_id.as_str().to_string()),
        }
    }
}

/// A computed relationship between two persons.
#[derive(Debug, Clone, SimpleObject)]
pub struct GqlRelationship {
    pub from_id: ID,
    pub to_id: ID,
    pub relationship: String,
    pub distance: i32,
    pub path: Vec<GqlPathStep>,
}

impl From<RelationshipPath> for GqlRelationship {
    fn from(p: RelationshipPath) -> Self {
        Self {
            from_id: ID(p.from.as_str().to_string()),
            to_id: ID(p.to.as_str().to_string()),
            relationship: p.relationship,
            distance: p.distance as i32,
            path: p.steps.into_iter().map(Into::into).collect(),
        }
    }
}

/// How often one surname occurs across the record store.
#[derive(Debug, Clone, SimpleObject, Serialize, Deserialize)]
pub struct GqlSurnameFrequency {
    pub surname: String,
    pub count: i64,
}

/// Aggregate statistics over the whole record store.
///
/// Serde derives let the aggregate round-trip through the query cache.
#[derive(Debug, Clone, SimpleObject, Serialize, Deserialize)]
pub struct GqlStatistics {
    pub person_count: i64,
    pub family_count: i64,
    pub living_count: i64,
    pub top_surnames: Vec<GqlSurnameFrequency>,
}

// ============================================================================
// INPUT TYPES
// ============================================================================

/// Input for a vital event (date/place pair).
#[derive(Debug, Clone, InputObject)]
pub struct VitalEventInput {
    pub date: Option<String>,
    pub place: Option<String>,
    pub estimated: Option<bool>,
}

impl From<VitalEventInput> for VitalEvent {
    fn from(v: VitalEventInput) -> Self {
        Self {
            date: v.date,
            place: v.place,
            estimated: v.estimated.unwrap_or(false),
        }
    }
}

/// Input for creating a person.
#[derive(Debug, Clone, InputObject)]
pub struct CreatePersonInput {
    /// Explicit id; generated when absent.
    pub id: Option<ID>,
    pub first_name: String,
    pub last_name: String,
    pub maiden_name: Option<String>,
    pub gender: Option<GqlGender>,
    pub birth: Option<VitalEventInput>,
    pub death: Option<VitalEventInput>,
    pub living: Option<bool>,
}

/// Input for updating a person. Absent fields are left unchanged.
#[derive(Debug, Clone, InputObject)]
pub struct UpdatePersonInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub maiden_name: Option<String>,
    pub gender: Option<GqlGender>,
    pub birth: Option<VitalEventInput>,
    pub death: Option<VitalEventInput>,
    pub living: Option<bool>,
}

// ============================================================================
// QUERY ROOT
// ============================================================================

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Get a person by ID.
    async fn person(&self, ctx: &Context<'_>, id: ID) -> GqlResult<Option<GqlPerson>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let person = loaders
            .person
            .load(PersonId::new(id.0))
            .await
            .map_err(storage_error)?;
        Ok(person.map(Into::into))
    }

    /// Get a family by ID.
    async fn family(&self, ctx: &Context<'_>, id: ID) -> GqlResult<Option<GqlFamily>> {
        let loaders = ctx.data::<LoaderRegistry>()?;
        let family = loaders
            .family
            .load(FamilyId::new(id.0))
            .await
            .map_err(storage_error)?;
        Ok(family.map(Into::into))
    }

    /// List persons, cursor-paginated, ordered by id.
    async fn people(
        &self,
        ctx: &Context<'_>,
        first: Option<i32>,
        after: Option<String>,
        last: Option<i32>,
        before: Option<String>,
    ) -> GqlResult<Connection<GqlPerson>> {
        let store = ctx.data::<Arc<dyn GenealogyStore>>()?;
        let backward = last.is_some() || before.is_some();

        let (page, has_next_page, has_previous_page) = if backward {
            let limit = clamp_page_size(last);
            let position = before
                .as_deref()
                .map(decode_cursor)
                .transpose()
                .map_err(cursor_error)?
                .map(PersonId::new);
            let rows = store
                .person_page(position.as_ref(), limit + 1, PageDirection::Backward)
                .await
                .map_err(storage_error)?;
            let (mut page, had_more) = trim_overfetch(rows, limit);
            // Fetched descending; present in ascending id order.
            page.reverse();
            (page, position.is_some(), had_more)
        } else {
            let limit = clamp_page_size(first);
            let position = after
                .as_deref()
                .map(decode_cursor)
                .transpose()
                .map_err(cursor_error)?
                .map(PersonId::new);
            let rows = store
                .person_page(position.as_ref(), limit + 1, PageDirection::Forward)
                .await
                .map_err(storage_error)?;
            let (page, had_more) = trim_overfetch(rows, limit);
            (page, had_more, position.is_some())
        };

        let total_count = store.person_count().await.map_err(storage_error)?;
        let nodes: Vec<GqlPerson> = page.into_iter().map(Into::into).collect();
        Ok(build_connection(
            nodes,
            |p| p.person_id.as_str().to_string(),
            has_next_page,
            has_previous_page,
            total_count,
        ))
    }

    /// Search persons by name, ranked by relevance.
    ///
    /// The full ranked list is materialized and the cursor locates a
    /// position within it; relevance order cannot be keyset-paginated.
    async fn search_people(
        &self,
        ctx: &Context<'_>,
        query: String,
        first: Option<i32>,
        after: Option<String>,
    ) -> GqlResult<Connection<GqlSearchResult>> {
        let store = ctx.data::<Arc<dyn GenealogyStore>>()?;
        let persons = store.all_persons().await.map_err(storage_error)?;
        let ranked = rank_persons(&query, persons);
        let total_count = ranked.len() as i64;

        let limit = clamp_page_size(first);
        let start = match after.as_deref() {
            None => 0,
            Some(cursor) => {
                let id = decode_cursor(cursor).map_err(cursor_error)?;
                // A cursor naming an id no longer in the result set reads
                // as past-the-end rather than an error.
                ranked
                    .iter()
                    .position(|r| r.person.person_id.as_str() == id)
                    .map(|i| i + 1)
                    .unwrap_or(ranked.len())
            }
        };
        let has_previous_page = start > 0;

        let window: Vec<_> = ranked.into_iter().skip(start).take(limit + 1).collect();
        let (page, has_next_page) = trim_overfetch(window, limit);

        let nodes: Vec<GqlSearchResult> = page
            .into_iter()
            .map(|r| GqlSearchResult {
                person: r.person.into(),
                score: r.score,
            })
            .collect();
        Ok(build_connection(
            nodes,
            |r| r.person.person_id.as_str().to_string(),
            has_next_page,
            has_previous_page,
            total_count,
        ))
    }

    /// Compute the relationship between two persons.
    ///
    /// Returns `null` when the persons are unknown or in disconnected
    /// components of the family graph.
    async fn relationship(
        &self,
        ctx: &Context<'_>,
        person_a: ID,
        person_b: ID,
    ) -> GqlResult<Option<GqlRelationship>> {
        let store = ctx.data::<Arc<dyn GenealogyStore>>()?;
        let persons = store.all_persons().await.map_err(storage_error)?;
        let families = store.all_families().await.map_err(storage_error)?;

        let graph = FamilyGraph::build(&persons, &families);
        let path =
            graph.relationship_between(&PersonId::new(person_a.0), &PersonId::new(person_b.0));
        Ok(path.map(Into::into))
    }

    /// Aggregate statistics, cached under the `"statistics"` key.
    async fn statistics(&self, ctx: &Context<'_>) -> GqlResult<GqlStatistics> {
        let cache = ctx.data::<Arc<QueryCache>>()?;
        if let Some(stats) = cache.get_as::<GqlStatistics>("statistics") {
            return Ok(stats);
        }

        let store = ctx.data::<Arc<dyn GenealogyStore>>()?;
        let person_count = store.person_count().await.map_err(storage_error)?;
        let family_count = store.family_count().await.map_err(storage_error)?;
        let persons = store.all_persons().await.map_err(storage_error)?;

        let living_count = persons.iter().filter(|p| p.living).count() as i64;

        let mut surname_counts: HashMap<String, i64> = HashMap::new();
        for person in &persons {
            if !person.last_name.is_empty() {
                *surname_counts.entry(person.last_name.clone()).or_default() += 1;
            }
        }
        let mut top_surnames: Vec<GqlSurnameFrequency> = surname_counts
            .into_iter()
            .map(|(surname, count)| GqlSurnameFrequency { surname, count })
            .collect();
        top_surnames.sort_by(|a, b| b.count.cmp(&a.count).then(a.surname.cmp(&b.surname)));
        top_surnames.truncate(TOP_SURNAME_COUNT);

        let stats = GqlStatistics {
            person_count,
            family_count,
            living_count,
            top_surnames,
        };
        cache.set_as("statistics", &stats);
        Ok(stats)
    }
}

// ============================================================================
// MUTATION ROOT
// ============================================================================

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Create a new person.
    async fn create_person(
        &self,
        ctx: &Context<'_>,
        input: CreatePersonInput,
    ) -> GqlResult<GqlPerson> {
        let store = ctx.data::<Arc<dyn GenealogyStore>>()?;
        let cache = ctx.data::<Arc<QueryCache>>()?;

        let id = match input.id {
            Some(id) if id.0.trim().is_empty() => {
                return Err(async_graphql::Error::new("id must not be empty"));
            }
            Some(id) => id.0,
            None => format!("I{}", Utc::now().timestamp_millis()),
        };

        let now = Utc::now();
        let person = Person {
            person_id: PersonId::new(id),
            first_name: input.first_name,
            last_name: input.last_name,
            maiden_name: input.maiden_name,
            gender: input.gender.map(Into::into),
            birth: input.birth.map(Into::into).unwrap_or_default(),
            death: input.death.map(Into::into).unwrap_or_default(),
            living: input.living.unwrap_or(false),
            research_notes: None,
            created_at: now,
            updated_at: now,
        };

        let created = store.create_person(person).await.map_err(storage_error)?;
        cache.clear(Some("people"));
        cache.clear(Some("statistics"));
        Ok(created.into())
    }

    /// Update a person. Returns `null` when the id is unknown.
    async fn update_person(
        &self,
        ctx: &Context<'_>,
        id: ID,
        input: UpdatePersonInput,
    ) -> GqlResult<Option<GqlPerson>> {
        let store = ctx.data::<Arc<dyn GenealogyStore>>()?;
        let cache = ctx.data::<Arc<QueryCache>>()?;

        let person_id = PersonId::new(id.0);
        let existing = store
            .persons_by_ids(std::slice::from_ref(&person_id))
            .await
            .map_err(storage_error)?
            .into_iter()
            .next()
            .flatten();
        let Some(mut person) = existing else {
            return Ok(None);
        };

        if let Some(first_name) = input.first_name {
            person.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            person.last_name = last_name;
        }
        if let Some(maiden_name) = input.maiden_name {
            person.maiden_name = Some(maiden_name);
        }
        if let Some(gender) = input.gender {
            person.gender = Some(gender.into());
        }
        if let Some(birth) = input.birth {
            person.birth = birth.into();
        }
        if let Some(death) = input.death {
            person.death = death.into();
        }
        if let Some(living) = input.living {
            person.living = living;
        }
        person.updated_at = Utc::now();

        let updated = store.update_person(person).await.map_err(storage_error)?;
        cache.clear(Some("people"));
        cache.clear(Some("statistics"));
        Ok(updated.map(Into::into))
    }

    /// Delete a person. Returns whether a row was removed.
    async fn delete_person(&self, ctx: &Context<'_>, id: ID) -> GqlResult<bool> {
        let store = ctx.data::<Arc<dyn GenealogyStore>>()?;
        let cache = ctx.data::<Arc<QueryCache>>()?;

        let deleted = store
            .delete_person(&PersonId::new(id.0))
            .await
            .map_err(storage_error)?;
        if deleted {
            cache.clear(Some("people"));
            cache.clear(Some("statistics"));
        }
        Ok(deleted)
    }
}

// ============================================================================
// SCHEMA & HANDLERS
// ============================================================================

/// The GraphQL schema type.
pub type LineageSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Create the GraphQL schema.
pub fn create_schema(store: Arc<dyn GenealogyStore>, cache: Arc<QueryCache>) -> LineageSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .data(cache)
        .finish()
}

/// Handler for GraphQL requests.
///
/// Builds a fresh loader registry for this one request and attaches it
/// as request data; nested resolvers batch through it and it is dropped
/// (memo and all) when the response is complete.
pub async fn graphql_handler(
    State(state): State<AppState>,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let loaders = LoaderRegistry::new(Arc::clone(&state.store), state.batch_delay);
    let request = req.into_inner().data(loaders);
    state.schema.execute(request).await.into()
}

/// Handler for GraphiQL playground.
pub async fn graphiql_handler() -> impl IntoResponse {
    Html(
        async_graphql::http::GraphiQLSource::build()
            .endpoint("/api/v1/graphql")
            .finish(),
    )
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Create the GraphQL routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", post(graphql_handler))
        .route("/playground", get(graphiql_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn person(id: &str, first: &str, last: &str) -> Person {
        Person {
            person_id: PersonId::new(id),
            first_name: first.to_string(),
            last_name: last.to_string(),
            maiden_name: None,
            gender: Some(Gender::Female),
            birth: VitalEvent {
                date: Some("1850".to_string()),
                place: Some("Boston".to_string()),
                estimated: true,
            },
            death: VitalEvent::default(),
            living: false,
            research_notes: Some(serde_json::json!({"flag": true})),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_gql_gender_round_trip() {
        let gql: GqlGender = Gender::Male.into();
        assert_eq!(gql, GqlGender::Male);
        let back: Gender = gql.into();
        assert_eq!(back, Gender::Male);
    }

    #[test]
    fn test_gql_person_from_entity() {
        let gql: GqlPerson = person("I1", "Ada", "Lovelace").into();
        assert_eq!(gql.id.0, "I1");
        assert_eq!(gql.full_name, "Ada Lovelace");
        assert_eq!(gql.gender, Some(GqlGender::Female));
        assert_eq!(gql.birth.date.as_deref(), Some("1850"));
        assert!(gql.birth.estimated);
        assert!(gql.research_notes.unwrap().contains("flag"));
    }

    #[test]
    fn test_gql_relationship_from_path() {
        let path = RelationshipPath {
            from: PersonId::new("I1"),
            to: PersonId::new("I2"),
            steps: vec![PathStep {
                step: RelStep::Parent,
                person_id: PersonId::new("I2"),
            }],
            distance: 1,
            relationship: "Parent".to_string(),
        };
        let gql: GqlRelationship = path.into();
        assert_eq!(gql.relationship, "Parent");
        assert_eq!(gql.distance, 1);
        assert_eq!(gql.path.len(), 1);
        assert_eq!(gql.path[0].step, GqlRelStep::Parent);
    }

    #[test]
    fn test_statistics_round_trips_through_json() {
        let stats = GqlStatistics {
            person_count: 3,
            family_count: 1,
            living_count: 2,
            top_surnames: vec![GqlSurnameFrequency {
                surname: "Doe".to_string(),
                count: 2,
            }],
        };
        let value = serde_json::to_value(&stats).unwrap();
        let back: GqlStatistics = serde_json::from_value(value).unwrap();
        assert_eq!(back.person_count, 3);
        assert_eq!(back.top_surnames[0].surname, "Doe");
    }
}
