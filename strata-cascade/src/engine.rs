//! Cascade engine entry points.
//!
//! Every top-level operation opens a storage transaction and a fresh
//! `StageScope` (starting on Draft), runs the cascade depth first and commits
//! only if every step succeeded.

use crate::behavior::{BehaviorRegistry, Cascadable};
use crate::detector::ModificationDetector;
use crate::report::{PublishReport, RollbackReport, UnpublishReport};
use crate::resolver::RelationshipResolver;
use crate::scope::StageScope;
use crate::tombstone::TombstoneTracker;
use crate::transaction::Transaction;
use std::fmt;
use std::sync::Arc;
use strata_core::{
    CascadeConfig, CascadeError, Clock, RecordKey, RecordType, RollbackTarget, StrataResult,
    VersionedRecord,
};
use strata_storage::VersionedStorage;

/// Propagates lifecycle operations from a record to its managed children.
pub struct CascadeEngine {
    pub(crate) storage: Arc<dyn VersionedStorage>,
    pub(crate) config: Arc<CascadeConfig>,
    pub(crate) clock: Arc<dyn Clock>,
    behaviors: BehaviorRegistry,
}

impl CascadeEngine {
    /// Build an engine. The configuration is validated here so misspelled
    /// relationships and cyclic declarations fail before any cascade runs.
    pub fn new(
        storage: Arc<dyn VersionedStorage>,
        config: Arc<CascadeConfig>,
        clock: Arc<dyn Clock>,
    ) -> StrataResult<Self> {
        config.validate()?;
        tracing::debug!(types = config.types.len(), "cascade engine configured");
        Ok(Self {
            storage,
            config,
            clock,
            behaviors: BehaviorRegistry::new(),
        })
    }

    /// Override lifecycle steps for one record type.
    pub fn with_behavior(
        mut self,
        record_type: impl Into<RecordType>,
        behavior: Arc<dyn Cascadable>,
    ) -> Self {
        self.behaviors.register(record_type, behavior);
        self
    }

    pub fn storage(&self) -> &dyn VersionedStorage {
        self.storage.as_ref()
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub fn resolver(&self) -> RelationshipResolver<'_> {
        RelationshipResolver::new(self.storage(), &self.config)
    }

    pub fn detector(&self) -> ModificationDetector<'_> {
        ModificationDetector::new(self.storage(), &self.config)
    }

    pub fn tombstones(&self) -> TombstoneTracker<'_> {
        TombstoneTracker::new(self.storage(), &self.config)
    }

    pub(crate) fn behavior(&self, record_type: &RecordType) -> &dyn Cascadable {
        self.behaviors.get(record_type)
    }

    // ========================================================================
    // TOP-LEVEL OPERATIONS
    // ========================================================================

    /// Publish a record and cascade to its children.
    pub fn publish(&self, key: &RecordKey) -> StrataResult<PublishReport> {
        let tx = Transaction::begin(self.storage())?;
        let scope = StageScope::default();

        let mut report = PublishReport::new(key.clone(), 0, false);
        let (version, mode) = self.publish_tree(key, &scope, &mut report)?;
        report.version = version;
        report.forced_new_version = mode.is_new_version();
        tx.commit()?;

        tracing::info!(
            record = %key,
            version,
            forced = report.forced_new_version,
            published = report.published.len(),
            removed = report.removed.len(),
            "publish complete"
        );
        Ok(report)
    }

    /// Remove a record and all its children from Live.
    pub fn unpublish(&self, key: &RecordKey) -> StrataResult<UnpublishReport> {
        let tx = Transaction::begin(self.storage())?;
        let scope = StageScope::default();

        // Children first, while the live row still carries its singular links.
        let mut report = UnpublishReport::new(key.clone());
        report.removed = self.unpublish_children(key, &scope)?;
        self.storage.unpublish(key)?;
        tx.commit()?;

        tracing::info!(record = %key, removed = report.removed.len(), "unpublish complete");
        Ok(report)
    }

    /// Restore a record and its children to a past version, or to Live.
    pub fn rollback(&self, key: &RecordKey, target: RollbackTarget) -> StrataResult<RollbackReport> {
        let tx = Transaction::begin(self.storage())?;
        let scope = StageScope::default();

        let mut report = RollbackReport::new(key.clone(), self.clock.now());
        report.date = self.rollback_tree(key, target, None, &scope, &mut report)?;
        tx.commit()?;

        tracing::info!(
            record = %key,
            %target,
            date = %report.date,
            restored = report.restored.len(),
            removed = report.removed.len(),
            "rollback complete"
        );
        Ok(report)
    }

    /// Whether the record or any descendant has unpublished changes.
    pub fn is_modified(&self, key: &RecordKey) -> StrataResult<bool> {
        self.detector().is_modified(key, &StageScope::default())
    }
}

impl fmt::Debug for CascadeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadeEngine")
            .field("config", &self.config)
            .field("behaviors", &self.behaviors)
            .finish_non_exhaustive()
    }
}

/// Key of a record that takes part in a cascade.
pub(crate) fn require_key(record: &VersionedRecord) -> StrataResult<RecordKey> {
    record.key().ok_or_else(|| {
        CascadeError::UnsavedRecord {
            record_type: record.record_type.clone(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{ConfigError, Relationship, StrataError, SystemClock, TypeConfig};
    use strata_storage::MockStorage;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = CascadeConfig::new().with_type(
            "Page",
            TypeConfig {
                manage: vec!["Slides".into()],
                relationships: Vec::new(),
            },
        );
        let result = CascadeEngine::new(
            Arc::new(MockStorage::new()),
            Arc::new(config),
            Arc::new(SystemClock),
        );
        assert!(matches!(
            result,
            Err(StrataError::Config(ConfigError::UnknownRelationship { .. }))
        ));
    }

    #[test]
    fn test_new_rejects_cycles() {
        let config = CascadeConfig::new()
            .with_type(
                "Page",
                TypeConfig::new().manages(Relationship::plural("Slides", "Slide", "page_id")),
            )
            .with_type(
                "Slide",
                TypeConfig::new().manages(Relationship::singular("Owner", "Page")),
            );
        let result = CascadeEngine::new(
            Arc::new(MockStorage::new()),
            Arc::new(config),
            Arc::new(SystemClock),
        );
        assert!(matches!(
            result,
            Err(StrataError::Config(ConfigError::CyclicRelationships { .. }))
        ));
    }

    #[test]
    fn test_require_key_rejects_unsaved() {
        let record = VersionedRecord::unsaved(
            "Slide",
            Some("new-7".into()),
            Default::default(),
            chrono::Utc::now(),
        );
        assert!(matches!(
            require_key(&record),
            Err(StrataError::Cascade(CascadeError::UnsavedRecord { .. }))
        ));
    }
}
