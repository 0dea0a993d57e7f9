//! Lineage Core - Domain Types and Graph Algorithms
//!
//! Pure building blocks of the Lineage record store: entity snapshots,
//! string-backed identity types, the cursor codec, search scoring, and the
//! relationship path engine. No I/O and no async; everything here is
//! deterministic and synchronous so the data-access layer above can stay
//! thin.

pub mod cursor;
pub mod entities;
pub mod error;
pub mod identity;
pub mod relationship;
pub mod search;

pub use cursor::{decode_cursor, encode_cursor};
pub use entities::{
    Comment, Family, Gender, LifeEvent, MediaItem, Person, SourceRecord, VitalEvent,
};
pub use error::{CoreError, CoreResult};
pub use identity::{CommentId, EventId, FamilyId, MediaId, PersonId, SourceId, Timestamp};
pub use relationship::{FamilyGraph, PathStep, RelStep, RelationshipPath};
pub use search::{rank_persons, trigram_similarity, RankedPerson, TRIGRAM_THRESHOLD};
