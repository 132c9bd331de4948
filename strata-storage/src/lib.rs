//! Strata Storage - Versioned Storage Trait and Mock Implementation
//!
//! Defines the interface the cascade engine needs from a versioned storage
//! engine: stage-scoped reads, historical reads by version or archive date,
//! and single-record (non-cascading) publish, unpublish, rollback and delete
//! primitives. How stages and history are physically stored is up to the
//! implementation.

pub mod mock;

pub use mock::MockStorage;

use strata_core::{
    PublishMode, RecordFields, RecordKey, RecordType, RollbackTarget, Stage, StageContext,
    StrataResult, Timestamp, Tombstone, VersionNumber, VersionedRecord,
};

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Storage engine for versioned records.
///
/// Every record has an append-only history of versions, plus a Draft and a
/// Live pointer into that history. Archive reads reconstruct the store as of a
/// moment: for each record, the latest version whose `last_edited` is at or
/// before that moment, unless that version carries a tombstone at or before
/// the same moment.
///
/// The trait is object safe; the cascade engine holds it as
/// `Arc<dyn VersionedStorage>`.
pub trait VersionedStorage: Send + Sync {
    // === Draft Writes ===

    /// Create a record with version 1 on Draft and nothing on Live.
    fn create_draft(
        &self,
        record_type: &RecordType,
        fields: RecordFields,
    ) -> StrataResult<VersionedRecord>;

    /// Write a new version and point Draft at it.
    fn write_draft(&self, key: &RecordKey, fields: RecordFields) -> StrataResult<VersionedRecord>;

    // === Reads ===

    /// Read one record in a stage context.
    fn read(&self, key: &RecordKey, context: StageContext) -> StrataResult<Option<VersionedRecord>>;

    /// Records of a type whose `field` equals `value`, in creation order.
    fn query(
        &self,
        record_type: &RecordType,
        context: StageContext,
        field: &str,
        value: &serde_json::Value,
    ) -> StrataResult<Vec<VersionedRecord>>;

    /// Read a specific historical version.
    fn read_version(
        &self,
        key: &RecordKey,
        version: VersionNumber,
    ) -> StrataResult<Option<VersionedRecord>>;

    /// Version number a stage currently points at.
    fn version_on_stage(&self, key: &RecordKey, stage: Stage) -> StrataResult<Option<VersionNumber>>;

    /// Full history, oldest first.
    fn history(&self, key: &RecordKey) -> StrataResult<Vec<VersionedRecord>>;

    // === Stage Primitives (single record, never cascading) ===

    /// Publish the draft to Live. Returns the version now live.
    ///
    /// `PublishMode::NewVersion` writes a fresh version from the draft content
    /// and points both Draft and Live at it.
    fn publish(&self, key: &RecordKey, mode: PublishMode) -> StrataResult<VersionNumber>;

    /// Clear the Live pointer. History is untouched.
    fn unpublish(&self, key: &RecordKey) -> StrataResult<()>;

    /// Remove the record from one stage. No-op when the stage holds nothing.
    fn delete_from_stage(&self, key: &RecordKey, stage: Stage) -> StrataResult<()>;

    /// Copy the target version (or the live version) into a new draft version.
    fn rollback_to(&self, key: &RecordKey, target: RollbackTarget) -> StrataResult<VersionedRecord>;

    /// Overwrite `last_edited` on a history entry.
    fn touch_version(
        &self,
        key: &RecordKey,
        version: VersionNumber,
        at: Timestamp,
    ) -> StrataResult<()>;

    // === Tombstones ===

    /// Record that `version` was removed from Live at `at`.
    fn mark_deleted(&self, key: &RecordKey, version: VersionNumber, at: Timestamp)
        -> StrataResult<()>;

    /// Drop the tombstone on `version`.
    fn clear_deleted(&self, key: &RecordKey, version: VersionNumber) -> StrataResult<()>;

    /// Tombstones recorded for a record, oldest version first.
    fn tombstones(&self, key: &RecordKey) -> StrataResult<Vec<Tombstone>>;

    // === Transactions ===

    /// Open a transaction. Nested calls behave like savepoints.
    fn begin_transaction(&self) -> StrataResult<()>;

    /// Make the innermost transaction's writes permanent.
    fn commit_transaction(&self) -> StrataResult<()>;

    /// Discard every write since the innermost `begin_transaction`.
    fn abort_transaction(&self) -> StrataResult<()>;
}
