//! Scoped stage context.
//!
//! Each top-level operation owns one `StageScope`. Cascade steps that need to
//! read from another stage switch it through `with_context`, which hands the
//! new context to the closure and restores the previous one when the closure
//! returns, fails or panics.

use std::cell::Cell;
use strata_core::StageContext;

/// Active stage context of one cascade invocation.
#[derive(Debug, Default)]
pub struct StageScope {
    current: Cell<StageContext>,
}

impl StageScope {
    pub fn new(initial: StageContext) -> Self {
        Self {
            current: Cell::new(initial),
        }
    }

    /// Context currently in effect.
    pub fn current(&self) -> StageContext {
        self.current.get()
    }

    /// Run `f` with `context` active, then restore the previous context.
    pub fn with_context<T>(&self, context: StageContext, f: impl FnOnce(StageContext) -> T) -> T {
        let _restore = RestoreGuard {
            scope: self,
            previous: self.current.replace(context),
        };
        f(context)
    }
}

struct RestoreGuard<'a> {
    scope: &'a StageScope,
    previous: StageContext,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.scope.current.set(self.previous);
    }
}
