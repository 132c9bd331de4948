//! Transaction guard around top-level operations.

use strata_core::StrataResult;
use strata_storage::VersionedStorage;

/// Open storage transaction that aborts when dropped uncommitted.
///
/// Every top-level cascade runs inside one, so a failure in the middle of a
/// multi-child walk leaves storage as it was before the call.
pub struct Transaction<'a> {
    storage: &'a dyn VersionedStorage,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(storage: &'a dyn VersionedStorage) -> StrataResult<Self> {
        storage.begin_transaction()?;
        Ok(Self {
            storage,
            finished: false,
        })
    }

    pub fn commit(mut self) -> StrataResult<()> {
        self.finished = true;
        self.storage.commit_transaction()
    }

    pub fn abort(mut self) -> StrataResult<()> {
        self.finished = true;
        self.storage.abort_transaction()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(error) = self.storage.abort_transaction() {
            tracing::error!(%error, "failed to abort cascade transaction");
        }
    }
}
