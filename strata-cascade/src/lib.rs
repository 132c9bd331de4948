//! Strata Cascade - Cascading Lifecycle Operations
//!
//! Publishing, unpublishing or rolling back a record carries the same
//! operation to every child reachable through the record type's managed
//! relationships, recursively. The engine also answers whether a record has
//! unpublished changes anywhere in its subtree, and keeps deletion tombstones
//! so archive reads and rollbacks see children that were later removed.
//!
//! Storage is reached only through [`strata_storage::VersionedStorage`].

pub mod behavior;
pub mod detector;
pub mod engine;
pub mod hooks;
mod publish;
pub mod report;
pub mod resolver;
mod rollback;
pub mod scope;
pub mod tombstone;
pub mod transaction;
mod unpublish;

#[cfg(test)]
mod test_support;

pub use behavior::{BehaviorRegistry, Cascadable, DefaultBehavior, StageDeletion};
pub use detector::ModificationDetector;
pub use engine::CascadeEngine;
pub use hooks::LifecycleHooks;
pub use report::{PublishReport, RollbackReport, UnpublishReport};
pub use resolver::RelationshipResolver;
pub use scope::StageScope;
pub use tombstone::TombstoneTracker;
pub use transaction::Transaction;
