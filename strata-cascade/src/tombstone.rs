//! Deletion Tombstone Tracker

use strata_core::{CascadeConfig, RecordKey, Stage, StrataResult, Timestamp, Tombstone};
use strata_storage::VersionedStorage;

/// Writes and clears tombstones for managed child records.
///
/// Types that are not the child end of a managed relationship are never
/// tracked.
#[derive(Clone, Copy)]
pub struct TombstoneTracker<'a> {
    storage: &'a dyn VersionedStorage,
    config: &'a CascadeConfig,
}

impl<'a> TombstoneTracker<'a> {
    pub fn new(storage: &'a dyn VersionedStorage, config: &'a CascadeConfig) -> Self {
        Self { storage, config }
    }

    /// Tie the version currently on Live to a deletion at `at`.
    ///
    /// Returns `None` when the record is untracked or not on Live.
    pub fn record_live_deletion(
        &self,
        key: &RecordKey,
        at: Timestamp,
    ) -> StrataResult<Option<Tombstone>> {
        if !self.config.is_managed_child(&key.record_type) {
            return Ok(None);
        }
        let Some(version) = self.storage.version_on_stage(key, Stage::Live)? else {
            return Ok(None);
        };

        self.storage.mark_deleted(key, version, at)?;
        tracing::debug!(record = %key, version, deleted_at = %at, "tombstone written");
        Ok(Some(Tombstone {
            key: key.clone(),
            version,
            deleted_at: at,
        }))
    }

    /// Clear the tombstone carried into the draft by a rollback.
    ///
    /// Older history keeps its tombstones so archive reads before the
    /// resurrection still hide the record. Returns whether anything was
    /// cleared.
    pub fn clear_resurrected(&self, key: &RecordKey) -> StrataResult<bool> {
        if !self.config.is_managed_child(&key.record_type) {
            return Ok(false);
        }
        let Some(version) = self.storage.version_on_stage(key, Stage::Draft)? else {
            return Ok(false);
        };
        let carries_tombstone = self
            .storage
            .read_version(key, version)?
            .is_some_and(|row| row.deleted_at.is_some());
        if !carries_tombstone {
            return Ok(false);
        }

        self.storage.clear_deleted(key, version)?;
        tracing::debug!(record = %key, version, "tombstone cleared after rollback");
        Ok(true)
    }
}
