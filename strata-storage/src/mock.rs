//! In-memory versioned storage.
//!
//! Keeps every record's full history plus Draft/Live pointers behind a single
//! `RwLock`. Transactions snapshot the whole state, which is fine for tests and
//! small fixtures.

use crate::VersionedStorage;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use strata_core::{
    new_entity_id, visible_at, Clock, PublishMode, RecordFields, RecordId, RecordKey, RecordType,
    RollbackTarget, Stage, StageContext, StorageError, StrataError, StrataResult, SystemClock,
    Timestamp, Tombstone, VersionNumber, VersionedRecord,
};

// ============================================================================
// STORED STATE
// ============================================================================

#[derive(Debug, Clone)]
struct HistoryEntry {
    fields: RecordFields,
    last_edited: Timestamp,
    deleted_at: Option<Timestamp>,
}

#[derive(Debug, Clone)]
struct StoredRecord {
    /// Creation order, used as the natural collection order.
    sequence: u64,
    history: Vec<HistoryEntry>,
    draft: Option<VersionNumber>,
    live: Option<VersionNumber>,
}

impl StoredRecord {
    fn entry(&self, version: VersionNumber) -> Option<&HistoryEntry> {
        let index = (version as usize).checked_sub(1)?;
        self.history.get(index)
    }

    fn entry_mut(&mut self, version: VersionNumber) -> Option<&mut HistoryEntry> {
        let index = (version as usize).checked_sub(1)?;
        self.history.get_mut(index)
    }

    fn push(
        &mut self,
        fields: RecordFields,
        last_edited: Timestamp,
        deleted_at: Option<Timestamp>,
    ) -> VersionNumber {
        self.history.push(HistoryEntry {
            fields,
            last_edited,
            deleted_at,
        });
        self.history.len() as VersionNumber
    }

    fn version_in(&self, context: StageContext) -> Option<VersionNumber> {
        match context {
            StageContext::Draft => self.draft,
            StageContext::Live => self.live,
            StageContext::Archive(at) => {
                let (index, entry) = self
                    .history
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.last_edited <= at)
                    .last()?;
                let tombstones = self.history.iter().filter_map(|past| past.deleted_at);
                visible_at(entry.last_edited, tombstones, at).then_some(index as VersionNumber + 1)
            }
        }
    }

    fn snapshot(&self, key: &RecordKey, version: VersionNumber) -> Option<VersionedRecord> {
        self.entry(version).map(|entry| VersionedRecord {
            record_type: key.record_type.clone(),
            id: RecordId::Saved(key.id),
            version,
            fields: entry.fields.clone(),
            last_edited: entry.last_edited,
            deleted_at: entry.deleted_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
struct MockState {
    records: HashMap<RecordKey, StoredRecord>,
    next_sequence: u64,
}

impl MockState {
    fn record(&self, key: &RecordKey) -> StrataResult<&StoredRecord> {
        self.records
            .get(key)
            .ok_or_else(|| StorageError::NotFound { key: key.clone() }.into())
    }

    fn record_mut(&mut self, key: &RecordKey) -> StrataResult<&mut StoredRecord> {
        self.records
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound { key: key.clone() }.into())
    }
}

// ============================================================================
// MOCK STORAGE
// ============================================================================

/// In-memory versioned storage for tests.
pub struct MockStorage {
    state: Arc<RwLock<MockState>>,
    savepoints: Arc<Mutex<Vec<MockState>>>,
    clock: Arc<dyn Clock>,
}

impl MockStorage {
    /// Create an empty store stamped by the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamped by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            savepoints: Arc::new(Mutex::new(Vec::new())),
            clock,
        }
    }

    /// Number of records ever created (deleting from stages keeps history).
    pub fn record_count(&self) -> usize {
        self.read_state().map(|s| s.records.len()).unwrap_or(0)
    }

    /// Number of open transactions.
    pub fn transaction_depth(&self) -> usize {
        self.lock_savepoints().map(|s| s.len()).unwrap_or(0)
    }

    /// Drop all records and open transactions.
    pub fn clear(&self) -> StrataResult<()> {
        *self.write_state()? = MockState::default();
        self.lock_savepoints()?.clear();
        Ok(())
    }

    fn read_state(&self) -> StrataResult<RwLockReadGuard<'_, MockState>> {
        self.state
            .read()
            .map_err(|_| StrataError::from(StorageError::LockPoisoned))
    }

    fn write_state(&self) -> StrataResult<RwLockWriteGuard<'_, MockState>> {
        self.state
            .write()
            .map_err(|_| StrataError::from(StorageError::LockPoisoned))
    }

    fn lock_savepoints(&self) -> StrataResult<MutexGuard<'_, Vec<MockState>>> {
        self.savepoints
            .lock()
            .map_err(|_| StrataError::from(StorageError::LockPoisoned))
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockStorage")
            .field("records", &self.record_count())
            .field("transaction_depth", &self.transaction_depth())
            .finish()
    }
}

impl VersionedStorage for MockStorage {
    // === Draft Writes ===

    fn create_draft(
        &self,
        record_type: &RecordType,
        fields: RecordFields,
    ) -> StrataResult<VersionedRecord> {
        if record_type.as_str().trim().is_empty() {
            return Err(StorageError::InsertFailed {
                record_type: record_type.clone(),
                reason: "record type must not be empty".to_string(),
            }
            .into());
        }

        let now = self.clock.now();
        let key = RecordKey::new(record_type.clone(), new_entity_id());
        let mut state = self.write_state()?;
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let mut record = StoredRecord {
            sequence,
            history: Vec::new(),
            draft: None,
            live: None,
        };
        let version = record.push(fields, now, None);
        record.draft = Some(version);

        let snapshot = record.snapshot(&key, version);
        state.records.insert(key.clone(), record);
        snapshot.ok_or_else(|| StorageError::InvalidVersion { key, version }.into())
    }

    fn write_draft(&self, key: &RecordKey, fields: RecordFields) -> StrataResult<VersionedRecord> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        let record = state.record_mut(key)?;
        let version = record.push(fields, now, None);
        record.draft = Some(version);
        record.snapshot(key, version).ok_or_else(|| {
            StorageError::InvalidVersion {
                key: key.clone(),
                version,
            }
            .into()
        })
    }

    // === Reads ===

    fn read(&self, key: &RecordKey, context: StageContext) -> StrataResult<Option<VersionedRecord>> {
        let state = self.read_state()?;
        Ok(state.records.get(key).and_then(|record| {
            record
                .version_in(context)
                .and_then(|version| record.snapshot(key, version))
        }))
    }

    fn query(
        &self,
        record_type: &RecordType,
        context: StageContext,
        field: &str,
        value: &serde_json::Value,
    ) -> StrataResult<Vec<VersionedRecord>> {
        let state = self.read_state()?;
        let mut matches: Vec<(u64, VersionedRecord)> = state
            .records
            .iter()
            .filter(|(key, _)| &key.record_type == record_type)
            .filter_map(|(key, record)| {
                let version = record.version_in(context)?;
                let snapshot = record.snapshot(key, version)?;
                (snapshot.fields.get(field) == Some(value)).then_some((record.sequence, snapshot))
            })
            .collect();
        matches.sort_by_key(|(sequence, _)| *sequence);
        Ok(matches.into_iter().map(|(_, record)| record).collect())
    }

    fn read_version(
        &self,
        key: &RecordKey,
        version: VersionNumber,
    ) -> StrataResult<Option<VersionedRecord>> {
        let state = self.read_state()?;
        Ok(state
            .records
            .get(key)
            .and_then(|record| record.snapshot(key, version)))
    }

    fn version_on_stage(&self, key: &RecordKey, stage: Stage) -> StrataResult<Option<VersionNumber>> {
        let state = self.read_state()?;
        Ok(state
            .records
            .get(key)
            .and_then(|record| record.version_in(stage.into())))
    }

    fn history(&self, key: &RecordKey) -> StrataResult<Vec<VersionedRecord>> {
        let state = self.read_state()?;
        let record = state.record(key)?;
        Ok((1..=record.history.len() as VersionNumber)
            .filter_map(|version| record.snapshot(key, version))
            .collect())
    }

    // === Stage Primitives ===

    fn publish(&self, key: &RecordKey, mode: PublishMode) -> StrataResult<VersionNumber> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        let record = state.record_mut(key)?;
        let draft = record.draft.ok_or_else(|| StorageError::NotOnStage {
            key: key.clone(),
            stage: Stage::Draft,
        })?;

        let version = match mode {
            PublishMode::Existing => draft,
            PublishMode::NewVersion => {
                let fields = record
                    .entry(draft)
                    .map(|entry| entry.fields.clone())
                    .ok_or_else(|| StorageError::InvalidVersion {
                        key: key.clone(),
                        version: draft,
                    })?;
                let version = record.push(fields, now, None);
                record.draft = Some(version);
                version
            }
        };
        record.live = Some(version);
        tracing::trace!(record = %key, version, ?mode, "published");
        Ok(version)
    }

    fn unpublish(&self, key: &RecordKey) -> StrataResult<()> {
        let mut state = self.write_state()?;
        state.record_mut(key)?.live = None;
        Ok(())
    }

    fn delete_from_stage(&self, key: &RecordKey, stage: Stage) -> StrataResult<()> {
        let mut state = self.write_state()?;
        let record = state.record_mut(key)?;
        match stage {
            Stage::Draft => record.draft = None,
            Stage::Live => record.live = None,
        }
        Ok(())
    }

    fn rollback_to(&self, key: &RecordKey, target: RollbackTarget) -> StrataResult<VersionedRecord> {
        let now = self.clock.now();
        let mut state = self.write_state()?;
        let record = state.record_mut(key)?;

        let source = match target {
            RollbackTarget::Version(version) => version,
            RollbackTarget::Live => record.live.ok_or_else(|| StorageError::NotOnStage {
                key: key.clone(),
                stage: Stage::Live,
            })?,
        };
        let (fields, deleted_at) = record
            .entry(source)
            .map(|entry| (entry.fields.clone(), entry.deleted_at))
            .ok_or_else(|| StorageError::InvalidVersion {
                key: key.clone(),
                version: source,
            })?;

        // The copied row keeps the source's tombstone column, as a plain copy would.
        let version = record.push(fields, now, deleted_at);
        record.draft = Some(version);
        record.snapshot(key, version).ok_or_else(|| {
            StorageError::InvalidVersion {
                key: key.clone(),
                version,
            }
            .into()
        })
    }

    fn touch_version(
        &self,
        key: &RecordKey,
        version: VersionNumber,
        at: Timestamp,
    ) -> StrataResult<()> {
        let mut state = self.write_state()?;
        let entry = state
            .record_mut(key)?
            .entry_mut(version)
            .ok_or_else(|| StorageError::InvalidVersion {
                key: key.clone(),
                version,
            })?;
        entry.last_edited = at;
        Ok(())
    }

    // === Tombstones ===

    fn mark_deleted(
        &self,
        key: &RecordKey,
        version: VersionNumber,
        at: Timestamp,
    ) -> StrataResult<()> {
        let mut state = self.write_state()?;
        let entry = state
            .record_mut(key)?
            .entry_mut(version)
            .ok_or_else(|| StorageError::InvalidVersion {
                key: key.clone(),
                version,
            })?;
        entry.deleted_at = Some(at);
        Ok(())
    }

    fn clear_deleted(&self, key: &RecordKey, version: VersionNumber) -> StrataResult<()> {
        let mut state = self.write_state()?;
        let entry = state
            .record_mut(key)?
            .entry_mut(version)
            .ok_or_else(|| StorageError::InvalidVersion {
                key: key.clone(),
                version,
            })?;
        entry.deleted_at = None;
        Ok(())
    }

    fn tombstones(&self, key: &RecordKey) -> StrataResult<Vec<Tombstone>> {
        let state = self.read_state()?;
        let record = state.record(key)?;
        Ok(record
            .history
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                entry.deleted_at.map(|deleted_at| Tombstone {
                    key: key.clone(),
                    version: index as VersionNumber + 1,
                    deleted_at,
                })
            })
            .collect())
    }

    // === Transactions ===

    fn begin_transaction(&self) -> StrataResult<()> {
        let mut savepoints = self.lock_savepoints()?;
        let snapshot = self.read_state()?.clone();
        savepoints.push(snapshot);
        Ok(())
    }

    fn commit_transaction(&self) -> StrataResult<()> {
        let mut savepoints = self.lock_savepoints()?;
        savepoints
            .pop()
            .map(|_| ())
            .ok_or_else(|| no_open_transaction("commit"))
    }

    fn abort_transaction(&self) -> StrataResult<()> {
        let mut savepoints = self.lock_savepoints()?;
        let snapshot = savepoints
            .pop()
            .ok_or_else(|| no_open_transaction("abort"))?;
        *self.write_state()? = snapshot;
        Ok(())
    }
}

fn no_open_transaction(action: &str) -> StrataError {
    StorageError::TransactionFailed {
        reason: format!("{} without an open transaction", action),
    }
    .into()
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use serde_json::json;
    use strata_core::ManualClock;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Reading the archive at a version's own timestamp returns that version.
        #[test]
        fn prop_archive_at_each_write_returns_that_version(writes in 1usize..12) {
            let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
            let storage = MockStorage::with_clock(clock.clone());

            let mut fields = RecordFields::new();
            fields.insert("n".to_string(), json!(0));
            let key = storage
                .create_draft(&RecordType::from("Slide"), fields.clone())
                .unwrap()
                .key()
                .unwrap();
            for n in 1..writes {
                clock.advance(Duration::seconds(1));
                fields.insert("n".to_string(), json!(n));
                storage.write_draft(&key, fields.clone()).unwrap();
            }

            for entry in storage.history(&key).unwrap() {
                let archived = storage
                    .read(&key, StageContext::Archive(entry.last_edited))
                    .unwrap()
                    .unwrap();
                prop_assert_eq!(archived.version, entry.version);
            }
        }

        /// Versions only grow, whatever mix of writes and publishes happens.
        #[test]
        fn prop_versions_are_monotonic(ops in proptest::collection::vec(any::<bool>(), 1..20)) {
            let storage = MockStorage::new();
            let key = storage
                .create_draft(&RecordType::from("Slide"), RecordFields::new())
                .unwrap()
                .key()
                .unwrap();

            let mut last = 1;
            for write in ops {
                let version = if write {
                    storage.write_draft(&key, RecordFields::new()).unwrap().version
                } else {
                    storage.publish(&key, PublishMode::NewVersion).unwrap()
                };
                prop_assert!(version > last);
                last = version;
            }
        }
    }
}
