//! Per-type cascade behavior.
//!
//! The engine never calls storage stage primitives directly for a child. It
//! goes through the child type's `Cascadable`, which defaults to the plain
//! storage primitive and can be overridden per record type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use strata_core::{
    PublishMode, RecordKey, RecordType, RollbackTarget, Stage, StrataResult, VersionNumber,
    VersionedRecord,
};
use strata_storage::VersionedStorage;

// ============================================================================
// STAGE DELETION
// ============================================================================

/// Detached description of a record to remove from one stage.
///
/// Built from a read that happened earlier in the cascade; carries only
/// identity, so later writes to the same record cannot change what it points
/// at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDeletion {
    pub key: RecordKey,
    pub stage: Stage,
    /// Version the stage held when the deletion was planned.
    pub version: Option<VersionNumber>,
}

impl StageDeletion {
    pub fn new(key: RecordKey, stage: Stage, version: Option<VersionNumber>) -> Self {
        Self {
            key,
            stage,
            version,
        }
    }

    /// Plan a deletion from a record read under some context.
    pub fn of(record: &VersionedRecord, stage: Stage) -> Option<Self> {
        record
            .key()
            .map(|key| Self::new(key, stage, Some(record.version)))
    }
}

// ============================================================================
// CASCADABLE
// ============================================================================

/// Lifecycle steps a record type can override.
///
/// Overrides run inside the cascade's transaction. A failing override aborts
/// the whole operation.
pub trait Cascadable: Send + Sync {
    /// Publish one record. Children are handled by the engine afterwards.
    fn publish(
        &self,
        storage: &dyn VersionedStorage,
        key: &RecordKey,
        mode: PublishMode,
    ) -> StrataResult<VersionNumber> {
        storage.publish(key, mode)
    }

    /// Remove one record from a stage. Tombstones are already written when
    /// this runs.
    fn delete_from_stage(
        &self,
        storage: &dyn VersionedStorage,
        deletion: &StageDeletion,
    ) -> StrataResult<()> {
        storage.delete_from_stage(&deletion.key, deletion.stage)
    }

    /// Restore one record's draft from a target.
    fn rollback_to(
        &self,
        storage: &dyn VersionedStorage,
        key: &RecordKey,
        target: RollbackTarget,
    ) -> StrataResult<VersionedRecord> {
        storage.rollback_to(key, target)
    }
}

/// The storage primitives, unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBehavior;

impl Cascadable for DefaultBehavior {}

// ============================================================================
// REGISTRY
// ============================================================================

/// Overrides keyed by record type, falling back to `DefaultBehavior`.
#[derive(Clone)]
pub struct BehaviorRegistry {
    fallback: Arc<dyn Cascadable>,
    overrides: HashMap<RecordType, Arc<dyn Cascadable>>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self {
            fallback: Arc::new(DefaultBehavior),
            overrides: HashMap::new(),
        }
    }

    /// Register an override, replacing any earlier one for the type.
    pub fn register(&mut self, record_type: impl Into<RecordType>, behavior: Arc<dyn Cascadable>) {
        self.overrides.insert(record_type.into(), behavior);
    }

    pub fn get(&self, record_type: &RecordType) -> &dyn Cascadable {
        &**self.overrides.get(record_type).unwrap_or(&self.fallback)
    }

    pub fn has_override(&self, record_type: &RecordType) -> bool {
        self.overrides.contains_key(record_type)
    }
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.overrides.keys().map(RecordType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("BehaviorRegistry")
            .field("overrides", &types)
            .finish()
    }
}
