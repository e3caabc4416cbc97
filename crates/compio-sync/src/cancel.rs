//! Cooperative cancellation for long-running async work
//!
//! The token itself is `tokio_util`'s [`CancellationToken`]. It keeps its
//! own waiter list and needs no tokio runtime, so it works unchanged under
//! compio. This module adds the [`Cancelled`] error and a `?`-friendly
//! check for work that polls the token between steps.

use std::fmt;

pub use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Error returned by [`CancellationExt::check`] once the token fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("operation was cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Fallible view of a [`CancellationToken`]
///
/// # Example
///
/// ```rust
/// use compio_sync::{CancellationExt, CancellationToken};
///
/// let token = CancellationToken::new();
/// let worker_view = token.clone();
///
/// assert!(worker_view.check().is_ok());
/// token.cancel();
/// assert!(worker_view.check().is_err());
/// ```
pub trait CancellationExt {
    /// Return `Err(Cancelled)` once the token fired, for use with `?`
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the token has been cancelled.
    fn check(&self) -> Result<(), Cancelled>;
}

impl CancellationExt for CancellationToken {
    fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}
