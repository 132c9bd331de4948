//! Unpublish Cascade

use crate::behavior::StageDeletion;
use crate::engine::CascadeEngine;
use crate::scope::StageScope;
use strata_core::{RecordKey, Stage, StageContext, StrataResult};

impl CascadeEngine {
    /// Take every child of `key` off Live.
    ///
    /// Children are enumerated in the active context and again in Live, so a
    /// child already removed from Draft but still published is removed too.
    /// Returns the records removed, depth first.
    pub(crate) fn unpublish_children(
        &self,
        key: &RecordKey,
        scope: &StageScope,
    ) -> StrataResult<Vec<RecordKey>> {
        if !self.config.cascades(&key.record_type) {
            return Ok(Vec::new());
        }
        let resolver = self.resolver();

        let mut children = resolver.child_keys(key, scope.current())?;
        let live = scope.with_context(StageContext::Live, |ctx| resolver.child_keys(key, ctx))?;
        for child in live {
            if !children.contains(&child) {
                children.push(child);
            }
        }

        let mut removed = Vec::new();
        for child in &children {
            self.remove_from_live(child, scope, &mut removed)?;
        }
        Ok(removed)
    }

    /// Remove one child, and its own children first, from Live.
    ///
    /// The tombstone is written before the type's delete step runs. Records
    /// with nothing on Live are skipped.
    pub(crate) fn remove_from_live(
        &self,
        key: &RecordKey,
        scope: &StageScope,
        removed: &mut Vec<RecordKey>,
    ) -> StrataResult<()> {
        if self.config.cascades(&key.record_type) {
            let resolver = self.resolver();
            let grandchildren =
                scope.with_context(StageContext::Live, |ctx| resolver.child_keys(key, ctx))?;
            for grandchild in &grandchildren {
                self.remove_from_live(grandchild, scope, removed)?;
            }
        }

        let Some(version) = self.storage.version_on_stage(key, Stage::Live)? else {
            return Ok(());
        };
        self.tombstones().record_live_deletion(key, self.clock.now())?;
        let deletion = StageDeletion::new(key.clone(), Stage::Live, Some(version));
        self.behavior(&key.record_type)
            .delete_from_stage(self.storage(), &deletion)?;

        tracing::debug!(record = %key, version, "removed from live");
        removed.push(key.clone());
        Ok(())
    }
}
