//! Async priority semaphore for compio runtime
//!
//! Provides a semaphore primitive compatible with compio's async runtime to limit
//! concurrent operations. This is critical for bounding memory usage and preventing
//! resource exhaustion during directory traversal.
//!
//! Waiters are admitted by priority key: the lowest key goes first, and waiters
//! with equal keys are admitted in arrival order. A released permit is handed
//! directly to the best waiter, so newcomers never overtake the queue.
//!
//! # Example
//!
//! ```rust,no_run
//! use compio_sync::{Semaphore, LOWEST_PRIORITY};
//!
//! # async fn example() {
//! let semaphore = Semaphore::new(8);
//!
//! // Acquire permit before starting work
//! let permit = semaphore.acquire().await;
//!
//! // Give the slot back while waiting on something else, then come back
//! // behind everyone who is already queued.
//! drop(permit);
//! let _permit = semaphore.acquire_with_priority(LOWEST_PRIORITY).await;
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

/// Priority key that is served after every other key
pub const LOWEST_PRIORITY: i64 = i64::MAX;

/// A compio-compatible async semaphore for bounding concurrency
///
/// The semaphore maintains a fixed number of permits that must be acquired
/// before performing an operation. When all permits are in use, `acquire()`
/// will wait asynchronously until a permit becomes available.
///
/// # Design
///
/// - **Priority waiters**: Blocked tasks are ordered by `(priority, arrival)`
/// - **Direct hand-off**: A released permit goes to the best waiter, not back
///   to the pool, so admission order is exactly the queue order
/// - **RAII permits**: `SemaphorePermit` automatically releases on drop
/// - **Cloneable**: Clones share the same permits
///
/// # Example
///
/// ```rust,no_run
/// use compio_sync::Semaphore;
///
/// # async fn example() {
/// let sem = Semaphore::new(100);
///
/// // Spawn multiple concurrent tasks
/// let mut handles = Vec::new();
/// for i in 0..1000 {
///     let sem = sem.clone();
///     handles.push(compio::runtime::spawn(async move {
///         let _permit = sem.acquire().await;
///         // Only 100 tasks run concurrently
///         i
///     }));
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct Semaphore {
    /// Shared state between all clones of this semaphore
    inner: Arc<SemaphoreInner>,
}

/// Internal shared state for the semaphore
struct SemaphoreInner {
    /// Permit counter and wait queue, guarded together so hand-off is atomic
    state: Mutex<State>,
    /// Maximum permits (for metrics and debugging)
    max_permits: usize,
}

struct State {
    /// Permits not held by anyone and not promised to a waiter
    available: usize,
    /// Queued acquirers, best first
    waiters: BTreeMap<WaitKey, Waker>,
    /// Waiters that were handed a permit but have not been polled since
    granted: HashSet<u64>,
    /// Arrival counter used to keep equal priorities FIFO
    next_seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct WaitKey {
    priority: i64,
    seq: u64,
}

impl Semaphore {
    /// Create a new semaphore with the given number of permits
    ///
    /// # Arguments
    ///
    /// * `permits` - The initial number of permits (maximum concurrency)
    ///
    /// # Panics
    ///
    /// Panics if `permits` is 0 (semaphore must have at least one permit)
    ///
    /// # Example
    ///
    /// ```rust
    /// use compio_sync::Semaphore;
    ///
    /// let sem = Semaphore::new(1024);
    /// assert_eq!(sem.available_permits(), 1024);
    /// ```
    #[must_use]
    pub fn new(permits: usize) -> Self {
        assert!(permits > 0, "Semaphore must have at least one permit");
        Self {
            inner: Arc::new(SemaphoreInner {
                state: Mutex::new(State {
                    available: permits,
                    waiters: BTreeMap::new(),
                    granted: HashSet::new(),
                    next_seq: 0,
                }),
                max_permits: permits,
            }),
        }
    }

    /// Acquire a permit with the default priority (0)
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use compio_sync::Semaphore;
    ///
    /// # async fn example() {
    /// let sem = Semaphore::new(10);
    ///
    /// let permit = sem.acquire().await;
    /// // Do work...
    /// drop(permit);  // Release permit
    /// # }
    /// ```
    pub fn acquire(&self) -> Acquire {
        self.acquire_with_priority(0)
    }

    /// Acquire a permit, queueing behind every waiter with a lower key
    ///
    /// Lower keys are admitted first; equal keys are admitted in the order
    /// they started waiting. Dropping the returned future before it
    /// completes leaves the queue without consuming a permit.
    pub fn acquire_with_priority(&self, priority: i64) -> Acquire {
        Acquire {
            semaphore: self.clone(),
            priority,
            key: None,
        }
    }

    /// Try to acquire a permit without waiting
    ///
    /// Returns `None` if all permits are in use or if another task is
    /// already queued for one.
    ///
    /// # Example
    ///
    /// ```rust
    /// use compio_sync::Semaphore;
    ///
    /// let sem = Semaphore::new(1);
    ///
    /// let permit1 = sem.try_acquire();
    /// assert!(permit1.is_some());
    ///
    /// let permit2 = sem.try_acquire();
    /// assert!(permit2.is_none());  // No permits left
    /// ```
    #[must_use]
    pub fn try_acquire(&self) -> Option<SemaphorePermit> {
        let mut state = self.state();
        if state.available == 0 || !state.waiters.is_empty() {
            return None;
        }
        state.available -= 1;
        drop(state);
        Some(SemaphorePermit {
            semaphore: self.clone(),
        })
    }

    /// Get the number of available permits
    ///
    /// This is useful for monitoring and debugging but should not be used
    /// for making decisions (value may change immediately after reading).
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.state().available
    }

    /// Get the maximum number of permits (configured limit)
    #[must_use]
    pub fn max_permits(&self) -> usize {
        self.inner.max_permits
    }

    /// Get the number of permits currently in use (max - available)
    ///
    /// # Example
    ///
    /// ```rust
    /// use compio_sync::Semaphore;
    ///
    /// let sem = Semaphore::new(100);
    /// let _permit = sem.try_acquire().unwrap();
    /// assert_eq!(sem.in_use(), 1);
    /// ```
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.inner.max_permits - self.available_permits()
    }

    /// Number of acquirers currently queued
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state().waiters.len()
    }

    /// Release a permit (called internally by `SemaphorePermit::drop`)
    fn release(&self) {
        let next = {
            let mut state = self.state();
            match state.waiters.pop_first() {
                Some((key, waker)) => {
                    state.granted.insert(key.seq);
                    Some(waker)
                }
                None => {
                    state.available += 1;
                    None
                }
            }
        };

        // Wake outside the lock; the woken task locks it again when polled
        if let Some(waker) = next {
            waker.wake();
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Semaphore")
            .field("available", &state.available)
            .field("max_permits", &self.inner.max_permits)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

/// RAII guard that releases a semaphore permit on drop
///
/// When dropped, the permit goes to the best queued waiter (if any),
/// otherwise back to the pool.
///
/// # Example
///
/// ```rust,no_run
/// use compio_sync::Semaphore;
///
/// # async fn example() {
/// let sem = Semaphore::new(10);
///
/// {
///     let permit = sem.acquire().await;
///     // Permit is held here
/// } // Permit released automatically when scope ends
///
/// assert_eq!(sem.available_permits(), 10);
/// # }
/// ```
pub struct SemaphorePermit {
    /// Reference to the semaphore that issued this permit
    semaphore: Semaphore,
}

impl fmt::Debug for SemaphorePermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemaphorePermit").finish_non_exhaustive()
    }
}

impl Drop for SemaphorePermit {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// Future that resolves when a semaphore permit is acquired
///
/// Returned by [`Semaphore::acquire`] and [`Semaphore::acquire_with_priority`].
/// On first poll it takes a free permit if nobody is queued, otherwise it
/// enqueues itself. A queued future completes once a releasing permit has
/// been handed to it.
#[must_use = "futures do nothing unless polled"]
pub struct Acquire {
    /// The semaphore from which to acquire a permit
    semaphore: Semaphore,
    priority: i64,
    /// Queue position once enqueued
    key: Option<WaitKey>,
}

impl Future for Acquire {
    type Output = SemaphorePermit;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let key = this.key;
        let mut state = this.semaphore.state();

        match key {
            None => {
                if state.available > 0 && state.waiters.is_empty() {
                    state.available -= 1;
                    drop(state);
                    return Poll::Ready(SemaphorePermit {
                        semaphore: this.semaphore.clone(),
                    });
                }

                let key = WaitKey {
                    priority: this.priority,
                    seq: state.next_seq,
                };
                state.next_seq += 1;
                state.waiters.insert(key, cx.waker().clone());
                this.key = Some(key);
                Poll::Pending
            }
            Some(key) => {
                if state.granted.remove(&key.seq) {
                    drop(state);
                    this.key = None;
                    return Poll::Ready(SemaphorePermit {
                        semaphore: this.semaphore.clone(),
                    });
                }

                if let Some(waker) = state.waiters.get_mut(&key) {
                    if !waker.will_wake(cx.waker()) {
                        *waker = cx.waker().clone();
                    }
                }
                Poll::Pending
            }
        }
    }
}

impl Drop for Acquire {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };

        let was_granted = {
            let mut state = self.semaphore.state();
            state.waiters.remove(&key).is_none() && state.granted.remove(&key.seq)
        };

        // A permit was handed to us but never picked up; pass it on
        if was_granted {
            self.semaphore.release();
        }
    }
}
