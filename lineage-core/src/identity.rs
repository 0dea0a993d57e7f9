//! Identity types for Lineage entities.
//!
//! External ids are GEDCOM-style strings (`"I42"` for individuals, `"F7"`
//! for families) owned by the persistence layer. The newtypes below keep
//! person and family keys from being mixed up at compile time while staying
//! cheap to clone and hash.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifier of a person record.
    PersonId
}

string_id! {
    /// Identifier of a family record.
    FamilyId
}

string_id! {
    /// Identifier of a life event record.
    EventId
}

string_id! {
    /// Identifier of a source citation record.
    SourceId
}

string_id! {
    /// Identifier of a media item record.
    MediaId
}

string_id! {
    /// Identifier of a comment record.
    CommentId
}
