//! Publish Cascade
//!
//! Before the record's own publish, decide whether it needs a forced new
//! version and note which children are on Live. After it, publish every Draft
//! child and take every Live child that was not just published off Live,
//! tombstoning it.

use crate::engine::CascadeEngine;
use crate::report::PublishReport;
use crate::scope::StageScope;
use strata_core::{
    PublishMode, PublishSource, RecordKey, StageContext, StrataResult, VersionNumber,
};

impl CascadeEngine {
    /// Publish one record and, if its type cascades, its subtree.
    pub(crate) fn publish_tree(
        &self,
        key: &RecordKey,
        scope: &StageScope,
        report: &mut PublishReport,
    ) -> StrataResult<(VersionNumber, PublishMode)> {
        let cascades = self.config.cascades(&key.record_type);
        let previously_live = if cascades {
            // Singular links on the old live row are gone once it is replaced.
            scope.with_context(StageContext::Live, |ctx| {
                self.resolver().child_keys(key, ctx)
            })?
        } else {
            Vec::new()
        };
        let mode = self.plan_publish(key, PublishSource::default(), scope)?;

        let version = self
            .behavior(&key.record_type)
            .publish(self.storage(), key, mode)?;
        tracing::debug!(record = %key, version, ?mode, "published");

        if cascades {
            self.publish_children(key, &previously_live, scope, report)?;
        }
        Ok((version, mode))
    }

    /// Before-publish step.
    ///
    /// Forces a new version when only descendants changed, so the cascade gets
    /// its own history entry. Otherwise, when the record itself changed, the
    /// source version's `last_edited` is moved to now so the parent is never
    /// older than the children published with it. A missing source row is
    /// reported and the fix-up skipped.
    ///
    /// When neither the record nor any descendant changed, nothing is touched
    /// and the record is republished as is, so publishing twice in a row
    /// leaves Live and the history unchanged.
    pub(crate) fn plan_publish(
        &self,
        key: &RecordKey,
        source: PublishSource,
        scope: &StageScope,
    ) -> StrataResult<PublishMode> {
        let detector = self.detector();
        let self_modified = detector.self_modified(key)?;
        let children_modified = detector.children_modified(key, scope)?;

        if children_modified && !self_modified {
            tracing::debug!(record = %key, "only descendants changed, forcing a new version");
            return Ok(PublishMode::NewVersion);
        }
        if !self_modified {
            return Ok(PublishMode::Existing);
        }

        let source_version = match source {
            PublishSource::Stage(stage) => self.storage.version_on_stage(key, stage)?,
            PublishSource::Version(version) => self
                .storage
                .read_version(key, version)?
                .map(|row| row.version),
        };
        match source_version {
            Some(version) => self.storage.touch_version(key, version, self.clock.now())?,
            None => tracing::warn!(
                record = %key,
                %source,
                "source row missing, skipping last-edited update"
            ),
        }
        Ok(PublishMode::Existing)
    }

    /// After-publish step.
    ///
    /// `previously_live` are children read from Live before the record's own
    /// publish; they are checked for removal along with the current Live set.
    pub(crate) fn publish_children(
        &self,
        key: &RecordKey,
        previously_live: &[RecordKey],
        scope: &StageScope,
        report: &mut PublishReport,
    ) -> StrataResult<()> {
        let resolver = self.resolver();

        let published = scope.with_context(StageContext::Draft, |ctx| {
            let mut published: Vec<RecordKey> = Vec::new();
            for child in resolver.resolve_children(key, ctx)? {
                let Some(child_key) = child.key() else {
                    continue;
                };
                if published.contains(&child_key) {
                    tracing::warn!(
                        record = %key,
                        child = %child_key,
                        "child reachable twice, publishing once"
                    );
                    continue;
                }
                self.publish_tree(&child_key, scope, report)?;
                report.published.push(child_key.clone());
                published.push(child_key);
            }
            StrataResult::Ok(published)
        })?;

        scope.with_context(StageContext::Live, |ctx| {
            let mut candidates = previously_live.to_vec();
            for child_key in resolver.child_keys(key, ctx)? {
                if !candidates.contains(&child_key) {
                    candidates.push(child_key);
                }
            }
            for child_key in candidates.iter().filter(|k| !published.contains(k)) {
                self.remove_from_live(child_key, scope, &mut report.removed)?;
            }
            StrataResult::Ok(())
        })?;

        tracing::debug!(
            record = %key,
            children = published.len(),
            "children published"
        );
        Ok(())
    }
}
