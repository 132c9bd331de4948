//! Modification Detector
//!
//! A record needs publishing when its own Draft and Live versions differ, or
//! when any managed descendant does. Children are checked twice: once as seen
//! from Draft and once as seen from Live, so a child removed from Draft but
//! still live also counts as a pending change.

use crate::resolver::RelationshipResolver;
use crate::scope::StageScope;
use strata_core::{CascadeConfig, RecordKey, Stage, StageContext, StrataResult, VersionedRecord};
use strata_storage::VersionedStorage;

/// Recursive draft/live divergence check. Nothing is cached between calls.
#[derive(Clone, Copy)]
pub struct ModificationDetector<'a> {
    storage: &'a dyn VersionedStorage,
    config: &'a CascadeConfig,
}

impl<'a> ModificationDetector<'a> {
    pub fn new(storage: &'a dyn VersionedStorage, config: &'a CascadeConfig) -> Self {
        Self { storage, config }
    }

    /// Whether the record or anything below it differs between Draft and Live.
    pub fn is_modified(&self, key: &RecordKey, scope: &StageScope) -> StrataResult<bool> {
        Ok(self.self_modified(key)? || self.children_modified(key, scope)?)
    }

    /// Same as `is_modified`, but unsaved records are never modified.
    pub fn record_modified(
        &self,
        record: &VersionedRecord,
        scope: &StageScope,
    ) -> StrataResult<bool> {
        match record.key() {
            Some(key) => self.is_modified(&key, scope),
            None => Ok(false),
        }
    }

    /// Draft and Live point at different versions.
    ///
    /// A draft with nothing on Live diverges; a record on neither stage does not.
    pub fn self_modified(&self, key: &RecordKey) -> StrataResult<bool> {
        let draft = self.storage.version_on_stage(key, Stage::Draft)?;
        let live = self.storage.version_on_stage(key, Stage::Live)?;
        Ok(draft != live)
    }

    /// Whether any managed descendant is modified, ignoring the record itself.
    pub fn children_modified(&self, key: &RecordKey, scope: &StageScope) -> StrataResult<bool> {
        if !self.config.cascades(&key.record_type) {
            return Ok(false);
        }
        let resolver = RelationshipResolver::new(self.storage, self.config);

        for context in [StageContext::Draft, StageContext::Live] {
            let children =
                scope.with_context(context, |ctx| resolver.resolve_children(key, ctx))?;
            for child in &children {
                if self.record_modified(child, scope)? {
                    tracing::trace!(record = %key, child = ?child.key(), %context, "modified child");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
