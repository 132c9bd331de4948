//! Outcome reports of top-level operations.

use serde::{Deserialize, Serialize};
use strata_core::{RecordKey, Timestamp, VersionNumber};

/// What a publish cascade did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    pub record: RecordKey,
    /// Version of `record` now on Live.
    pub version: VersionNumber,
    /// A new version was written because only descendants had changed.
    pub forced_new_version: bool,
    /// Descendants published, depth first.
    pub published: Vec<RecordKey>,
    /// Descendants removed from Live and tombstoned.
    pub removed: Vec<RecordKey>,
}

impl PublishReport {
    pub fn new(record: RecordKey, version: VersionNumber, forced_new_version: bool) -> Self {
        Self {
            record,
            version,
            forced_new_version,
            published: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// What an unpublish cascade did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpublishReport {
    pub record: RecordKey,
    /// Descendants removed from Live.
    pub removed: Vec<RecordKey>,
}

impl UnpublishReport {
    pub fn new(record: RecordKey) -> Self {
        Self {
            record,
            removed: Vec::new(),
        }
    }
}

/// What a rollback cascade did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub record: RecordKey,
    /// Moment the whole subtree was rolled back to.
    pub date: Timestamp,
    /// Descendants restored from the target.
    pub restored: Vec<RecordKey>,
    /// Descendants removed from Draft because the target did not have them.
    pub removed: Vec<RecordKey>,
}

impl RollbackReport {
    pub fn new(record: RecordKey, date: Timestamp) -> Self {
        Self {
            record,
            date,
            restored: Vec::new(),
            removed: Vec::new(),
        }
    }
}
