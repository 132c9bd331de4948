//! Rollback Cascade
//!
//! Rolling a record back to a version rolls its children back to whatever
//! they were at that version's `last_edited`, read through the archive. Every
//! level below uses the top-level date, so the subtree lands on one
//! consistent moment. Rolling back to Live restores children from Live.
//! Children the target does not have are removed from Draft.

use crate::behavior::StageDeletion;
use crate::engine::CascadeEngine;
use crate::report::RollbackReport;
use crate::scope::StageScope;
use strata_core::{
    CascadeError, RecordKey, RollbackTarget, Stage, StageContext, StorageError, StrataResult,
    Timestamp, VersionedRecord,
};

impl CascadeEngine {
    /// Roll back one record and, if its type cascades, its subtree.
    ///
    /// `date` is the moment inherited from an ancestor's rollback. Returns the
    /// moment this record's subtree was rolled back to.
    pub(crate) fn rollback_tree(
        &self,
        key: &RecordKey,
        target: RollbackTarget,
        date: Option<Timestamp>,
        scope: &StageScope,
        report: &mut RollbackReport,
    ) -> StrataResult<Timestamp> {
        let cascades = self.config.cascades(&key.record_type);
        let date = match date {
            Some(date) => date,
            None => self.rollback_snapshot(key, target)?.last_edited,
        };

        // Taken before the record's own rollback rewrites its singular links.
        let current = if cascades {
            scope.with_context(StageContext::Draft, |ctx| {
                self.resolver().resolve_children(key, ctx)
            })?
        } else {
            Vec::new()
        };

        let restored = self
            .behavior(&key.record_type)
            .rollback_to(self.storage(), key, target)?;
        self.tombstones().clear_resurrected(key)?;
        tracing::debug!(record = %key, %target, version = restored.version, "rolled back");

        if cascades {
            self.rollback_children(key, target, date, &current, scope, report)?;
        }
        Ok(date)
    }

    /// Row a rollback to `target` copies from.
    pub(crate) fn rollback_snapshot(
        &self,
        key: &RecordKey,
        target: RollbackTarget,
    ) -> StrataResult<VersionedRecord> {
        match target {
            RollbackTarget::Version(version) => self
                .storage
                .read_version(key, version)?
                .ok_or_else(|| {
                    StorageError::InvalidVersion {
                        key: key.clone(),
                        version,
                    }
                    .into()
                }),
            RollbackTarget::Live => self.storage.read(key, StageContext::Live)?.ok_or_else(|| {
                CascadeError::RecordMissing {
                    key: key.clone(),
                    context: StageContext::Live,
                }
                .into()
            }),
        }
    }

    /// After-rollback step, given the Draft children from before the rollback.
    pub(crate) fn rollback_children(
        &self,
        key: &RecordKey,
        target: RollbackTarget,
        date: Timestamp,
        current: &[VersionedRecord],
        scope: &StageScope,
        report: &mut RollbackReport,
    ) -> StrataResult<()> {
        let target_context = match target {
            RollbackTarget::Version(_) => StageContext::Archive(date),
            RollbackTarget::Live => StageContext::Live,
        };
        let targets = scope.with_context(target_context, |ctx| {
            self.resolver().resolve_children(key, ctx)
        })?;

        let mut kept: Vec<RecordKey> = Vec::new();
        for child in &targets {
            let Some(child_key) = child.key() else {
                continue;
            };
            if kept.contains(&child_key) {
                continue;
            }
            let child_target = match target {
                RollbackTarget::Version(_) => RollbackTarget::Version(child.version),
                RollbackTarget::Live => RollbackTarget::Live,
            };
            self.rollback_tree(&child_key, child_target, Some(date), scope, report)?;
            report.restored.push(child_key.clone());
            kept.push(child_key);
        }

        let mut dropped: Vec<RecordKey> = Vec::new();
        for child in current {
            let Some(deletion) = StageDeletion::of(child, Stage::Draft) else {
                continue;
            };
            if kept.contains(&deletion.key) || dropped.contains(&deletion.key) {
                continue;
            }
            self.behavior(&deletion.key.record_type)
                .delete_from_stage(self.storage(), &deletion)?;
            tracing::debug!(record = %deletion.key, "removed from draft by rollback");
            report.removed.push(deletion.key.clone());
            dropped.push(deletion.key);
        }

        tracing::debug!(
            record = %key,
            %target_context,
            restored = kept.len(),
            removed = dropped.len(),
            "children rolled back"
        );
        Ok(())
    }
}
