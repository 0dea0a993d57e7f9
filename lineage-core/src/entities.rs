//! Core entity structures.
//!
//! All entities are immutable snapshots for the duration of one request or
//! computation; the persistence layer owns the mutable truth.

use crate::{CommentId, EventId, FamilyId, MediaId, PersonId, SourceId, Timestamp};
use serde::{Deserialize, Serialize};

/// A vital event: date and place, both possibly partial or missing.
///
/// Dates are kept as free text (`"1842"`, `"ABT 1850"`, `"1901-03-12"`)
/// because genealogical records are routinely incomplete. `estimated`
/// marks dates inferred by a researcher rather than read from a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalEvent {
    pub date: Option<String>,
    pub place: Option<String>,
    #[serde(default)]
    pub estimated: bool,
}

/// Person - an individual in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub person_id: PersonId,
    pub first_name: String,
    pub last_name: String,
    /// Birth surname, when it differs from `last_name`.
    pub maiden_name: Option<String>,
    pub gender: Option<Gender>,
    pub birth: VitalEvent,
    pub death: VitalEvent,
    /// Living persons may be subject to privacy filtering by callers.
    pub living: bool,
    /// Free-form research metadata (unverified claims, conflicts, notes).
    pub research_notes: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Person {
    /// Full display name: "First Last".
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, true) => String::new(),
            (true, false) => self.last_name.clone(),
            (false, true) => self.first_name.clone(),
            (false, false) => format!("{} {}", self.first_name, self.last_name),
        }
    }

    /// Sort key: "Last, First", used for name-ordered listings.
    pub fn sort_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

/// Gender as recorded; genealogical sources predate richer identity data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

/// Family - a spousal unit with zero or more children.
///
/// Defines a spousal edge (husband <-> wife) and parent-child edges
/// (husband/wife -> each child). Child order carries no meaning.
///
/// The schema does NOT guarantee these references form an acyclic graph;
/// intermarriage or bad data can create cycles, so every traversal over
/// family links must carry a visited set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub family_id: FamilyId,
    pub husband_id: Option<PersonId>,
    pub wife_id: Option<PersonId>,
    pub marriage: VitalEvent,
    pub child_ids: Vec<PersonId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Family {
    /// The parents present on this family record.
    pub fn parent_ids(&self) -> impl Iterator<Item = &PersonId> {
        self.husband_id.iter().chain(self.wife_id.iter())
    }
}

/// A dated event in a person's life beyond birth/death (residence,
/// occupation, military service, immigration, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    pub event_id: EventId,
    pub person_id: PersonId,
    pub event_type: String,
    pub date: Option<String>,
    pub place: Option<String>,
    pub description: Option<String>,
}

/// A source citation attached to a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_id: SourceId,
    pub person_id: PersonId,
    pub title: String,
    pub citation: Option<String>,
    pub url: Option<String>,
}

/// A media item (photo, scanned document) attached to a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub media_id: MediaId,
    pub person_id: PersonId,
    pub file_name: String,
    pub caption: Option<String>,
    pub content_type: Option<String>,
}

/// A researcher comment on a person record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: CommentId,
    pub person_id: PersonId,
    pub author: String,
    pub text: String,
    pub created_at: Timestamp,
}
