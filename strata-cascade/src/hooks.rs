//! Lifecycle hooks for storage hosts that drive publishing themselves.
//!
//! A host that performs the record's own publish, unpublish or rollback calls
//! these around it; `CascadeEngine`'s top-level operations are the same steps
//! run back to back. Each hook runs in its own storage transaction, which
//! nests inside any transaction the host already has open.

use crate::engine::{require_key, CascadeEngine};
use crate::report::{PublishReport, RollbackReport, UnpublishReport};
use crate::resolver::distinct_keys;
use crate::scope::StageScope;
use crate::transaction::Transaction;
use strata_core::{
    CascadeError, PublishMode, PublishSource, RollbackTarget, Stage, StageContext, StrataResult,
    VersionedRecord,
};

/// Hook points around a single record's lifecycle operations.
pub trait LifecycleHooks {
    /// Called before the record's own publish from `from` to `to`.
    ///
    /// Returns `PublishMode::NewVersion` when the host must write a new
    /// version even though the record's fields did not change.
    fn before_publish(
        &self,
        record: &VersionedRecord,
        from: PublishSource,
        to: Stage,
    ) -> StrataResult<PublishMode>;

    /// Called after the record's own publish; publishes children and removes
    /// stale live children. `mode` is what `before_publish` returned.
    ///
    /// `previous` is the record's live row from before the host's publish, or
    /// `None` if it was not on Live. Singular children it linked are checked
    /// for removal along with the current live children.
    fn after_publish(
        &self,
        record: &VersionedRecord,
        previous: Option<&VersionedRecord>,
        mode: PublishMode,
    ) -> StrataResult<PublishReport>;

    /// Called after the record was removed from Live.
    ///
    /// Singular children are found through the record's draft row only.
    fn after_unpublish(&self, record: &VersionedRecord) -> StrataResult<UnpublishReport>;

    /// Called after the record's draft was restored from `target`.
    fn after_rollback(
        &self,
        record: &VersionedRecord,
        target: RollbackTarget,
    ) -> StrataResult<RollbackReport>;

    /// `already_modified`, or whether any descendant has unpublished changes.
    fn is_modified_on_stage(
        &self,
        record: &VersionedRecord,
        already_modified: bool,
    ) -> StrataResult<bool>;
}

impl LifecycleHooks for CascadeEngine {
    fn before_publish(
        &self,
        record: &VersionedRecord,
        from: PublishSource,
        to: Stage,
    ) -> StrataResult<PublishMode> {
        let key = require_key(record)?;
        if to != Stage::Live || !self.config.cascades(&key.record_type) {
            return Ok(PublishMode::Existing);
        }

        let tx = Transaction::begin(self.storage())?;
        let mode = self.plan_publish(&key, from, &StageScope::default())?;
        tx.commit()?;
        Ok(mode)
    }

    fn after_publish(
        &self,
        record: &VersionedRecord,
        previous: Option<&VersionedRecord>,
        mode: PublishMode,
    ) -> StrataResult<PublishReport> {
        let key = require_key(record)?;
        let version = self
            .storage
            .version_on_stage(&key, Stage::Live)?
            .ok_or_else(|| CascadeError::RecordMissing {
                key: key.clone(),
                context: StageContext::Live,
            })?;

        let tx = Transaction::begin(self.storage())?;
        let mut report = PublishReport::new(key.clone(), version, mode.is_new_version());
        if self.config.cascades(&key.record_type) {
            let scope = StageScope::default();
            let previously_live = scope.with_context(StageContext::Live, |ctx| {
                self.resolver()
                    .resolve_children_from(&key, previous, ctx)
                    .map(distinct_keys)
            })?;
            self.publish_children(&key, &previously_live, &scope, &mut report)?;
        }
        tx.commit()?;
        Ok(report)
    }

    fn after_unpublish(&self, record: &VersionedRecord) -> StrataResult<UnpublishReport> {
        let key = require_key(record)?;
        let tx = Transaction::begin(self.storage())?;
        let mut report = UnpublishReport::new(key.clone());
        report.removed = self.unpublish_children(&key, &StageScope::default())?;
        tx.commit()?;
        Ok(report)
    }

    fn after_rollback(
        &self,
        record: &VersionedRecord,
        target: RollbackTarget,
    ) -> StrataResult<RollbackReport> {
        let key = require_key(record)?;
        let tx = Transaction::begin(self.storage())?;
        let scope = StageScope::default();

        let date = self.rollback_snapshot(&key, target)?.last_edited;
        let mut report = RollbackReport::new(key.clone(), date);
        self.tombstones().clear_resurrected(&key)?;
        if self.config.cascades(&key.record_type) {
            let current = scope.with_context(StageContext::Draft, |ctx| {
                self.resolver().resolve_children(&key, ctx)
            })?;
            self.rollback_children(&key, target, date, &current, &scope, &mut report)?;
        }
        tx.commit()?;
        Ok(report)
    }

    fn is_modified_on_stage(
        &self,
        record: &VersionedRecord,
        already_modified: bool,
    ) -> StrataResult<bool> {
        if already_modified {
            return Ok(true);
        }
        match record.key() {
            Some(key) => self
                .detector()
                .children_modified(&key, &StageScope::default()),
            None => Ok(false),
        }
    }
}
