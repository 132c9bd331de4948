//! Strata Core - Record Types
//!
//! Pure data structures shared by the storage interface and the cascade
//! engine: record identities, stages and stage contexts, versioned records,
//! tombstones, relationship declarations, errors and configuration.
//! Nothing in this crate talks to storage.

pub mod clock;
pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CascadeConfig, TypeConfig};
pub use entities::{
    link_value, visible_at, RecordFields, Relationship, RelationshipKind, Tombstone,
    VersionedRecord,
};
pub use enums::{PublishMode, PublishSource, RollbackTarget, Stage, StageContext};
pub use error::{
    CascadeError, ConfigError, IdentityError, StorageError, StrataError, StrataResult,
};
pub use identity::{
    new_entity_id, EntityId, RecordId, RecordKey, RecordType, Timestamp, VersionNumber,
};
