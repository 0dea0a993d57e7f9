//! PostgreSQL `GenealogyStore` backend.
//!
//! Connection pooling via deadpool-postgres; every relation read is a
//! single `= ANY($1)` bulk select fanned back out to key order in process,
//! which is what lets the batch loading layer turn N resolver lookups into
//! one round-trip per relation.
//!
//! Schema expectations (DDL managed outside this crate):
//! - `persons(person_id text pk, first_name, last_name, maiden_name,
//!    gender, birth_date, birth_place, birth_estimated, death_date,
//!    death_place, death_estimated, living, research_notes jsonb,
//!    created_at, updated_at)`
//! - `families(family_id text pk, husband_id, wife_id, marriage_date,
//!    marriage_place, marriage_estimated, child_ids text[], created_at,
//!    updated_at)`
//! - `life_events`, `source_records`, `media_items`, `comments`, each
//!    carrying a `person_id` foreign key.

use crate::error::{StoreError, StoreResult};
use crate::store::{GenealogyStore, PageDirection};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use lineage_core::{
    Comment, CommentId, EventId, Family, FamilyId, Gender, LifeEvent, MediaId, MediaItem,
    Person, PersonId, SourceId, SourceRecord, VitalEvent,
};
use std::collections::HashMap;
use tokio_postgres::{NoTls, Row};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_size: usize,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "lineage".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_size: 16,
        }
    }
}

impl PgConfig {
    /// Create a configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("LINEAGE_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("LINEAGE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("LINEAGE_DB_NAME").unwrap_or_else(|_| "lineage".to_string()),
            user: std::env::var("LINEAGE_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("LINEAGE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("LINEAGE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> StoreResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Connection {
                reason: format!("failed to create pool: {e}"),
            })
    }
}

// ============================================================================
// POSTGRES STORE
// ============================================================================

const PERSON_COLUMNS: &str = "person_id, first_name, last_name, maiden_name, gender, \
     birth_date, birth_place, birth_estimated, death_date, death_place, death_estimated, \
     living, research_notes, created_at, updated_at";

const FAMILY_COLUMNS: &str = "family_id, husband_id, wife_id, marriage_date, marriage_place, \
     marriage_estimated, child_ids, created_at, updated_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &PgConfig) -> StoreResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Current pool size, for the health endpoint.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> StoreResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(StoreError::from)
    }
}

fn person_from_row(row: &Row) -> StoreResult<Person> {
    let gender: Option<String> = try_col(row, "gender", "person")?;
    Ok(Person {
        person_id: PersonId::new(try_col::<String>(row, "person_id", "person")?),
        first_name: try_col(row, "first_name", "person")?,
        last_name: try_col(row, "last_name", "person")?,
        maiden_name: try_col(row, "maiden_name", "person")?,
        gender: gender.as_deref().map(gender_from_str),
        birth: VitalEvent {
            date: try_col(row, "birth_date", "person")?,
            place: try_col(row, "birth_place", "person")?,
            estimated: try_col(row, "birth_estimated", "person")?,
        },
        death: VitalEvent {
            date: try_col(row, "death_date", "person")?,
            place: try_col(row, "death_place", "person")?,
            estimated: try_col(row, "death_estimated", "person")?,
        },
        living: try_col(row, "living", "person")?,
        research_notes: try_col(row, "research_notes", "person")?,
        created_at: try_col(row, "created_at", "person")?,
        updated_at: try_col(row, "updated_at", "person")?,
    })
}

fn family_from_row(row: &Row) -> StoreResult<Family> {
    let child_ids: Vec<String> = try_col(row, "child_ids", "family")?;
    Ok(Family {
        family_id: FamilyId::new(try_col::<String>(row, "family_id", "family")?),
        husband_id: try_col::<Option<String>>(row, "husband_id", "family")?.map(PersonId::new),
        wife_id: try_col::<Option<String>>(row, "wife_id", "family")?.map(PersonId::new),
        marriage: VitalEvent {
            date: try_col(row, "marriage_date", "family")?,
            place: try_col(row, "marriage_place", "family")?,
            estimated: try_col(row, "marriage_estimated", "family")?,
        },
        child_ids: child_ids.into_iter().map(PersonId::new).collect(),
        created_at: try_col(row, "created_at", "family")?,
        updated_at: try_col(row, "updated_at", "family")?,
    })
}

fn event_from_row(row: &Row) -> StoreResult<LifeEvent> {
    Ok(LifeEvent {
        event_id: EventId::new(try_col::<String>(row, "event_id", "life_event")?),
        person_id: PersonId::new(try_col::<String>(row, "person_id", "life_event")?),
        event_type: try_col(row, "event_type", "life_event")?,
        date: try_col(row, "date", "life_event")?,
        place: try_col(row, "place", "life_event")?,
        description: try_col(row, "description", "life_event")?,
    })
}

fn source_from_row(row: &Row) -> StoreResult<SourceRecord> {
    Ok(SourceRecord {
        source_id: SourceId::new(try_col::<String>(row, "source_id", "source_record")?),
        person_id: PersonId::new(try_col::<String>(row, "person_id", "source_record")?),
        title: try_col(row, "title", "source_record")?,
        citation: try_col(row, "citation", "source_record")?,
        url: try_col(row, "url", "source_record")?,
    })
}

fn media_from_row(row: &Row) -> StoreResult<MediaItem> {
    Ok(MediaItem {
        media_id: MediaId::new(try_col::<String>(row, "media_id", "media_item")?),
        person_id: PersonId::new(try_col::<String>(row, "person_id", "media_item")?),
        file_name: try_col(row, "file_name", "media_item")?,
        caption: try_col(row, "caption", "media_item")?,
        content_type: try_col(row, "content_type", "media_item")?,
    })
}

fn comment_from_row(row: &Row) -> StoreResult<Comment> {
    Ok(Comment {
        comment_id: CommentId::new(try_col::<String>(row, "comment_id", "comment")?),
        person_id: PersonId::new(try_col::<String>(row, "person_id", "comment")?),
        author: try_col(row, "author", "comment")?,
        text: try_col(row, "text", "comment")?,
        created_at: try_col(row, "created_at", "comment")?,
    })
}

fn try_col<'a, T: tokio_postgres::types::FromSql<'a>>(
    row: &'a Row,
    column: &str,
    entity: &str,
) -> StoreResult<T> {
    row.try_get(column).map_err(|e| StoreError::InvalidRow {
        entity: entity.to_string(),
        reason: format!("{column}: {e}"),
    })
}

fn gender_from_str(s: &str) -> Gender {
    match s {
        "male" => Gender::Male,
        "female" => Gender::Female,
        _ => Gender::Unknown,
    }
}

fn gender_to_str(g: Gender) -> &'static str {
    match g {
        Gender::Male => "male",
        Gender::Female => "female",
        Gender::Unknown => "unknown",
    }
}

fn id_strings<I: AsRef<str>>(ids: &[I]) -> Vec<&str> {
    ids.iter().map(|id| id.as_ref()).collect()
}

/// Fan grouped rows back out to key order.
fn group_by_key<T, I: AsRef<str>>(keys: &[I], rows: Vec<(String, T)>) -> Vec<Vec<T>> {
    let mut grouped: HashMap<String, Vec<T>> = HashMap::new();
    for (key, value) in rows {
        grouped.entry(key).or_default().push(value);
    }
    keys.iter()
        .map(|k| grouped.remove(k.as_ref()).unwrap_or_default())
        .collect()
}

#[async_trait]
impl GenealogyStore for PgStore {
    async fn persons_by_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Option<Person>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &*format!("SELECT {PERSON_COLUMNS} FROM persons WHERE person_id = ANY($1)"),
                &[&id_strings(ids)],
            )
            .await?;

        let mut by_id: HashMap<PersonId, Person> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let person = person_from_row(row)?;
            by_id.insert(person.person_id.clone(), person);
        }
        Ok(ids.iter().map(|id| by_id.remove(id)).collect())
    }

    async fn families_by_ids(&self, ids: &[FamilyId]) -> StoreResult<Vec<Option<Family>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &*format!("SELECT {FAMILY_COLUMNS} FROM families WHERE family_id = ANY($1)"),
                &[&id_strings(ids)],
            )
            .await?;

        let mut by_id: HashMap<FamilyId, Family> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let family = family_from_row(row)?;
            by_id.insert(family.family_id.clone(), family);
        }
        Ok(ids.iter().map(|id| by_id.remove(id)).collect())
    }

    async fn children_by_family_ids(&self, ids: &[FamilyId]) -> StoreResult<Vec<Vec<Person>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &*format!(
                    "SELECT f.family_id AS group_key, {PERSON_COLUMNS} \
                     FROM families f \
                     JOIN persons ON person_id = ANY(f.child_ids) \
                     WHERE f.family_id = ANY($1)"
                ),
                &[&id_strings(ids)],
            )
            .await?;

        let mut keyed = Vec::with_capacity(rows.len());
        for row in &rows {
            let key: String = try_col(row, "group_key", "family")?;
            keyed.push((key, person_from_row(row)?));
        }
        Ok(group_by_key(ids, keyed))
    }

    async fn families_as_spouse_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<Family>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &*format!(
                    "SELECT {FAMILY_COLUMNS} FROM families \
                     WHERE husband_id = ANY($1) OR wife_id = ANY($1)"
                ),
                &[&id_strings(ids)],
            )
            .await?;

        let families = rows
            .iter()
            .map(family_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        // A family surfaces under every requested spouse it names.
        Ok(ids
            .iter()
            .map(|id| {
                families
                    .iter()
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
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &*format!("SELECT {FAMILY_COLUMNS} FROM families WHERE child_ids && $1"),
                &[&id_strings(ids)],
            )
            .await?;

        let families = rows
            .iter()
            .map(family_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(ids
            .iter()
            .map(|id| {
                families
                    .iter()
                    .filter(|f| f.child_ids.contains(id))
                    .cloned()
                    .collect()
            })
            .collect())
    }

    async fn events_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<LifeEvent>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT event_id, person_id, event_type, date, place, description \
                 FROM life_events WHERE person_id = ANY($1) ORDER BY event_id",
                &[&id_strings(ids)],
            )
            .await?;

        let mut keyed = Vec::with_capacity(rows.len());
        for row in &rows {
            let event = event_from_row(row)?;
            keyed.push((event.person_id.as_str().to_string(), event));
        }
        Ok(group_by_key(ids, keyed))
    }

    async fn sources_by_person_ids(
        &self,
        ids: &[PersonId],
    ) -> StoreResult<Vec<Vec<SourceRecord>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT source_id, person_id, title, citation, url \
                 FROM source_records WHERE person_id = ANY($1) ORDER BY source_id",
                &[&id_strings(ids)],
            )
            .await?;

        let mut keyed = Vec::with_capacity(rows.len());
        for row in &rows {
            let source = source_from_row(row)?;
            keyed.push((source.person_id.as_str().to_string(), source));
        }
        Ok(group_by_key(ids, keyed))
    }

    async fn media_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<MediaItem>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT media_id, person_id, file_name, caption, content_type \
                 FROM media_items WHERE person_id = ANY($1) ORDER BY media_id",
                &[&id_strings(ids)],
            )
            .await?;

        let mut keyed = Vec::with_capacity(rows.len());
        for row in &rows {
            let media = media_from_row(row)?;
            keyed.push((media.person_id.as_str().to_string(), media));
        }
        Ok(group_by_key(ids, keyed))
    }

    async fn comments_by_person_ids(&self, ids: &[PersonId]) -> StoreResult<Vec<Vec<Comment>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                "SELECT comment_id, person_id, author, text, created_at \
                 FROM comments WHERE person_id = ANY($1) ORDER BY created_at",
                &[&id_strings(ids)],
            )
            .await?;

        let mut keyed = Vec::with_capacity(rows.len());
        for row in &rows {
            let comment = comment_from_row(row)?;
            keyed.push((comment.person_id.as_str().to_string(), comment));
        }
        Ok(group_by_key(ids, keyed))
    }

    async fn person_page(
        &self,
        position: Option<&PersonId>,
        limit: usize,
        direction: PageDirection,
    ) -> StoreResult<Vec<Person>> {
        let conn = self.get_conn().await?;
        let position = position.map(|p| p.as_str());
        let limit = limit as i64;
        let rows = match direction {
            PageDirection::Forward => {
                conn.query(
                    &*format!(
                        "SELECT {PERSON_COLUMNS} FROM persons \
                         WHERE $1::text IS NULL OR person_id > $1 \
                         ORDER BY person_id ASC LIMIT $2"
                    ),
                    &[&position, &limit],
                )
                .await?
            }
            PageDirection::Backward => {
                conn.query(
                    &*format!(
                        "SELECT {PERSON_COLUMNS} FROM persons \
                         WHERE $1::text IS NULL OR person_id < $1 \
                         ORDER BY person_id DESC LIMIT $2"
                    ),
                    &[&position, &limit],
                )
                .await?
            }
        };
        rows.iter().map(person_from_row).collect()
    }

    async fn person_count(&self) -> StoreResult<i64> {
        let conn = self.get_conn().await?;
        let row = conn.query_one("SELECT COUNT(*) FROM persons", &[]).await?;
        Ok(row.get(0))
    }

    async fn family_count(&self) -> StoreResult<i64> {
        let conn = self.get_conn().await?;
        let row = conn.query_one("SELECT COUNT(*) FROM families", &[]).await?;
        Ok(row.get(0))
    }

    async fn all_persons(&self) -> StoreResult<Vec<Person>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &*format!("SELECT {PERSON_COLUMNS} FROM persons ORDER BY person_id"),
                &[],
            )
            .await?;
        rows.iter().map(person_from_row).collect()
    }

    async fn all_families(&self) -> StoreResult<Vec<Family>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &*format!("SELECT {FAMILY_COLUMNS} FROM families ORDER BY family_id"),
                &[],
            )
            .await?;
        rows.iter().map(family_from_row).collect()
    }

    async fn create_person(&self, person: Person) -> StoreResult<Person> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                &*format!(
                    "INSERT INTO persons ({PERSON_COLUMNS}) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
                     RETURNING {PERSON_COLUMNS}"
                ),
                &[
                    &person.person_id.as_str(),
                    &person.first_name,
                    &person.last_name,
                    &person.maiden_name,
                    &person.gender.map(gender_to_str),
                    &person.birth.date,
                    &person.birth.place,
                    &person.birth.estimated,
                    &person.death.date,
                    &person.death.place,
                    &person.death.estimated,
                    &person.living,
                    &person.research_notes,
                    &person.created_at,
                    &person.updated_at,
                ],
            )
            .await?;
        person_from_row(&row)
    }

    async fn update_person(&self, person: Person) -> StoreResult<Option<Person>> {
        let conn = self.get_conn().await?;
        let rows = conn
            .query(
                &*format!(
                    "UPDATE persons SET first_name = $2, last_name = $3, maiden_name = $4, \
                     gender = $5, birth_date = $6, birth_place = $7, birth_estimated = $8, \
                     death_date = $9, death_place = $10, death_estimated = $11, living = $12, \
                     research_notes = $13, updated_at = $14 \
                     WHERE person_id = $1 RETURNING {PERSON_COLUMNS}"
                ),
                &[
                    &person.person_id.as_str(),
                    &person.first_name,
                    &person.last_name,
                    &person.maiden_name,
                    &person.gender.map(gender_to_str),
                    &person.birth.date,
                    &person.birth.place,
                    &person.birth.estimated,
                    &person.death.date,
                    &person.death.place,
                    &person.death.estimated,
                    &person.living,
                    &person.research_notes,
                    &person.updated_at,
                ],
            )
            .await?;
        rows.first().map(person_from_row).transpose()
    }

    async fn delete_person(&self, id: &PersonId) -> StoreResult<bool> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM persons WHERE person_id = $1", &[&id.as_str()])
            .await?;
        Ok(deleted > 0)
    }
}
