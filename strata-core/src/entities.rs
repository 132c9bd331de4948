//! Record, tombstone and relationship structures

use crate::{EntityId, RecordId, RecordKey, RecordType, Timestamp, VersionNumber};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field values of a record version.
pub type RecordFields = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// VERSIONED RECORD
// ============================================================================

/// A record as read from one stage, one archive moment, or one history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub record_type: RecordType,
    pub id: RecordId,
    /// Version this read resolved to. `0` for unsaved records.
    pub version: VersionNumber,
    pub fields: RecordFields,
    pub last_edited: Timestamp,
    /// Tombstone recorded against this version, if any.
    pub deleted_at: Option<Timestamp>,
}

impl VersionedRecord {
    /// Build an in-memory record that has not been written yet.
    pub fn unsaved(
        record_type: impl Into<RecordType>,
        marker: Option<String>,
        fields: RecordFields,
        now: Timestamp,
    ) -> Self {
        Self {
            record_type: record_type.into(),
            id: RecordId::Unsaved(marker),
            version: 0,
            fields,
            last_edited: now,
            deleted_at: None,
        }
    }

    /// Key of the record, `None` while unsaved.
    pub fn key(&self) -> Option<RecordKey> {
        self.id
            .saved()
            .map(|id| RecordKey::new(self.record_type.clone(), id))
    }

    pub fn is_unsaved(&self) -> bool {
        self.id.is_unsaved()
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Read a field holding another record's id.
    ///
    /// Null, missing, empty or unparseable values all mean "no link".
    pub fn linked_id(&self, name: &str) -> Option<EntityId> {
        self.fields
            .get(name)
            .and_then(|value| value.as_str())
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// Field value that links to `id`, used for foreign keys and singular links.
pub fn link_value(id: EntityId) -> serde_json::Value {
    serde_json::Value::String(id.to_string())
}

// ============================================================================
// TOMBSTONE
// ============================================================================

/// Deletion marker tying the version that was live to the moment it was
/// removed from Live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub key: RecordKey,
    pub version: VersionNumber,
    pub deleted_at: Timestamp,
}

impl Tombstone {
    /// Whether the record was already deleted as of `at`.
    pub fn hides_at(&self, at: Timestamp) -> bool {
        self.deleted_at <= at
    }
}

/// Archive visibility at `at` of a version last edited at `last_edited`.
///
/// `tombstones` are the deletion times recorded anywhere in the record's
/// history. A tombstone at or before `at` hides the record unless the version
/// was written after it, which is how a rollback brings a record back.
pub fn visible_at(
    last_edited: Timestamp,
    tombstones: impl IntoIterator<Item = Timestamp>,
    at: Timestamp,
) -> bool {
    !tombstones
        .into_iter()
        .any(|deleted| deleted <= at && deleted >= last_edited)
}

// ============================================================================
// RELATIONSHIPS
// ============================================================================

/// Shape of a declared relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// One owned child. The parent's field named after the relationship holds
    /// the child id.
    Singular,
    /// Many independently existing children, each holding the parent id in
    /// `foreign_key`.
    Plural { foreign_key: String },
}

/// Named edge from a parent type to a child type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Relationship {
    pub name: String,
    pub child_type: RecordType,
    pub kind: RelationshipKind,
}

impl Relationship {
    pub fn singular(name: impl Into<String>, child_type: impl Into<RecordType>) -> Self {
        Self {
            name: name.into(),
            child_type: child_type.into(),
            kind: RelationshipKind::Singular,
        }
    }

    pub fn plural(
        name: impl Into<String>,
        child_type: impl Into<RecordType>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            child_type: child_type.into(),
            kind: RelationshipKind::Plural {
                foreign_key: foreign_key.into(),
            },
        }
    }

    pub fn is_plural(&self) -> bool {
        matches!(self.kind, RelationshipKind::Plural { .. })
    }
}

// ============================================================================
// TESTS
// ============================================================================
