//! Debug-only guard against user code re-entering a container.
//!
//! `Equatable`, `Hashable` and `Orderable` implementations are user code and
//! run while a container is scanning a chain or descending the skip-list
//! levels. Re-entering the same container from there would observe it
//! mid-operation. In debug builds the second entry panics and names both
//! operations; in release builds the guard is a zero-sized no-op.

use core::cell::Cell;
use core::marker::PhantomData;

/// Per-container tracker. Public entry points open a section with
/// `let _g = self.guard.enter("op");`.
#[derive(Debug)]
pub(crate) struct ScanGuard {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // Single-threaded containers: keep !Send + !Sync.
    _nosend: PhantomData<*mut ()>,
}

impl ScanGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _nosend: PhantomData,
        }
    }

    /// Open a guarded section for `op`. Panics in debug builds if another
    /// section of the same container is still open.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> Section<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("container re-entered: `{op}` called while `{outer}` is in progress");
            }
            self.active.set(Some(op));
            Section { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            Section { _z: PhantomData }
        }
    }

    #[cfg(all(test, debug_assertions))]
    pub(crate) fn active(&self) -> Option<&'static str> {
        self.active.get()
    }
}

impl Default for ScanGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII section returned by [`ScanGuard::enter`].
pub(crate) struct Section<'a> {
    #[cfg(debug_assertions)]
    owner: &'a ScanGuard,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.owner.active.get().is_some());
            self.owner.active.set(None);
        }
    }
}
