//! Completion counting for one explored directory
//!
//! A directory's own step counts as one pending operation; every child it
//! dispatches adds one more. The tracker fires when the count drops to zero
//! or when any settlement is an error, and it fires only once.

use crate::error::Result;

#[derive(Debug)]
pub(crate) struct CompletionTracker {
    pending: usize,
    fired: bool,
}

impl CompletionTracker {
    /// A tracker whose own step is still pending
    pub(crate) const fn new() -> Self {
        Self {
            pending: 1,
            fired: false,
        }
    }

    /// Count one more dispatched operation
    pub(crate) fn take(&mut self) {
        self.pending += 1;
    }

    /// Settle one operation
    ///
    /// Returns the subtree's outcome the first time the tracker fires and
    /// `None` otherwise, including every call after it fired.
    pub(crate) fn give(&mut self, result: Result<()>) -> Option<Result<()>> {
        if self.fired {
            return None;
        }
        self.pending = self.pending.saturating_sub(1);

        match result {
            Err(err) => Some(self.fire(Err(err))),
            Ok(()) if self.pending == 0 => Some(self.fire(Ok(()))),
            Ok(()) => None,
        }
    }

    pub(crate) const fn pending(&self) -> usize {
        self.pending
    }

    fn fire(&mut self, outcome: Result<()>) -> Result<()> {
        self.fired = true;
        outcome
    }
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}
