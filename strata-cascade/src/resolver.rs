//! Relationship Resolver
//!
//! Turns a parent's managed relationship declarations into the concrete child
//! records visible in one stage context.

use strata_core::{
    link_value, CascadeConfig, RecordKey, RelationshipKind, StageContext, StrataResult,
    VersionedRecord,
};
use strata_storage::VersionedStorage;

/// Read-only view over storage that enumerates managed children.
#[derive(Clone, Copy)]
pub struct RelationshipResolver<'a> {
    storage: &'a dyn VersionedStorage,
    config: &'a CascadeConfig,
}

impl<'a> RelationshipResolver<'a> {
    pub fn new(storage: &'a dyn VersionedStorage, config: &'a CascadeConfig) -> Self {
        Self { storage, config }
    }

    /// Children of `parent` as they exist in `context`.
    ///
    /// Relationships are walked in `manage` order; plural members keep their
    /// collection order. A record reachable through two relationships appears
    /// twice. Singular links are read from the parent's row in the same
    /// context, so a parent absent from that context contributes no singular
    /// children.
    pub fn resolve_children(
        &self,
        parent: &RecordKey,
        context: StageContext,
    ) -> StrataResult<Vec<VersionedRecord>> {
        if self.config.managed_relationships(&parent.record_type).is_empty() {
            return Ok(Vec::new());
        }
        let parent_row = self.storage.read(parent, context)?;
        self.resolve_children_from(parent, parent_row.as_ref(), context)
    }

    /// Like `resolve_children`, but singular links come from `parent_row`
    /// instead of the parent's row in `context`.
    ///
    /// Used when the row that carried the links has already been replaced,
    /// such as the live row before a host-driven publish.
    pub fn resolve_children_from(
        &self,
        parent: &RecordKey,
        parent_row: Option<&VersionedRecord>,
        context: StageContext,
    ) -> StrataResult<Vec<VersionedRecord>> {
        let relationships = self.config.managed_relationships(&parent.record_type);
        let mut children = Vec::new();

        for relationship in relationships {
            match &relationship.kind {
                RelationshipKind::Singular => {
                    let Some(child_id) = parent_row.and_then(|row| row.linked_id(&relationship.name))
                    else {
                        continue;
                    };
                    let child_key = RecordKey::new(relationship.child_type.clone(), child_id);
                    if let Some(child) = self.storage.read(&child_key, context)? {
                        children.push(child);
                    }
                }
                RelationshipKind::Plural { foreign_key } => {
                    let members = self.storage.query(
                        &relationship.child_type,
                        context,
                        foreign_key,
                        &link_value(parent.id),
                    )?;
                    children.extend(members);
                }
            }
        }

        children.retain(|child| !child.is_unsaved());
        Ok(children)
    }

    /// Keys of `resolve_children`, duplicates removed, first occurrence kept.
    pub fn child_keys(
        &self,
        parent: &RecordKey,
        context: StageContext,
    ) -> StrataResult<Vec<RecordKey>> {
        Ok(distinct_keys(self.resolve_children(parent, context)?))
    }
}

/// Keys of `children`, duplicates removed, first occurrence kept.
pub fn distinct_keys(children: Vec<VersionedRecord>) -> Vec<RecordKey> {
    let mut keys: Vec<RecordKey> = Vec::new();
    for key in children.iter().filter_map(VersionedRecord::key) {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}
