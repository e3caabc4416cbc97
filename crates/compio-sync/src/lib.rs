//! Async synchronization primitives for compio runtime
//!
//! This crate provides async synchronization primitives that are compatible
//! with the [compio](https://github.com/compio-rs/compio) async runtime.
//!
//! # Primitives
//!
//! - [`Semaphore`] - Async semaphore for bounding concurrency, with
//!   priority-ordered admission
//! - [`CancellationToken`] - Cooperative cancellation signal shared by clones
//!   (re-exported from `tokio_util`), with [`CancellationExt::check`]
//!
//! # Example
//!
//! ```rust,no_run
//! use compio_sync::{CancellationToken, Semaphore};
//!
//! #[compio::main]
//! async fn main() {
//!     let sem = Semaphore::new(2);
//!     let token = CancellationToken::new();
//!
//!     // Lower keys are admitted first; deeper work asks for a lower key.
//!     let shallow = sem.acquire_with_priority(-1).await;
//!     let deep = sem.acquire_with_priority(-5).await;
//!     assert_eq!(sem.available_permits(), 0);
//!
//!     drop(shallow);
//!     drop(deep);
//!
//!     token.cancel();
//!     token.cancelled().await;
//!     assert!(token.is_cancelled());
//! }
//! ```

mod cancel;
mod semaphore;

pub use cancel::{CancellationExt, CancellationToken, Cancelled, WaitForCancellationFuture};
pub use semaphore::{Acquire, Semaphore, SemaphorePermit, LOWEST_PRIORITY};
