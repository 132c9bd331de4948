//! Identity types for versioned records

use crate::IdentityError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Version number of a historical entry. Starts at 1 and grows by one per write.
pub type VersionNumber = u32;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

// ============================================================================
// RECORD TYPE
// ============================================================================

/// Type tag of a versioned record, e.g. `Page` or `Slide`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordType(String);

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordType {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RecordType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for RecordType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// RECORD ID
// ============================================================================

/// Identifier of a record as seen by a cascade.
///
/// Records that were never written carry no usable identity: they are either
/// completely empty or hold a synthetic marker such as `new-3` assigned by an
/// editing form. Unsaved records are never published and are skipped by every
/// cascade step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordId {
    /// Persisted record.
    Saved(EntityId),
    /// Not yet written to any stage.
    Unsaved(Option<String>),
}

impl RecordId {
    /// Parse an identifier string.
    ///
    /// Empty strings and strings starting with `new` (any case) are unsaved
    /// markers; everything else must be a UUID.
    pub fn parse(value: &str) -> Result<Self, IdentityError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(RecordId::Unsaved(None));
        }
        if trimmed
            .get(..3)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("new"))
        {
            return Ok(RecordId::Unsaved(Some(trimmed.to_string())));
        }
        Uuid::parse_str(trimmed)
            .map(RecordId::Saved)
            .map_err(|_| IdentityError::InvalidRecordId {
                value: value.to_string(),
            })
    }

    pub fn is_unsaved(&self) -> bool {
        matches!(self, RecordId::Unsaved(_))
    }

    /// The persisted id, if any.
    pub fn saved(&self) -> Option<EntityId> {
        match self {
            RecordId::Saved(id) => Some(*id),
            RecordId::Unsaved(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Saved(id) => write!(f, "{}", id),
            RecordId::Unsaved(Some(marker)) => f.write_str(marker),
            RecordId::Unsaved(None) => Ok(()),
        }
    }
}

impl FromStr for RecordId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<EntityId> for RecordId {
    fn from(id: EntityId) -> Self {
        RecordId::Saved(id)
    }
}

// ============================================================================
// RECORD KEY
// ============================================================================

/// Identity of a saved record: type tag plus id.
///
/// Cascades compare children by key, so the same id under two different
/// types is two different records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub record_type: RecordType,
    pub id: EntityId,
}

impl RecordKey {
    pub fn new(record_type: impl Into<RecordType>, id: EntityId) -> Self {
        Self {
            record_type: record_type.into(),
            id,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.record_type, self.id)
    }
}

// ============================================================================
// TESTS
// ============================================================================
