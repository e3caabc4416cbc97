//! Bounded, priority-ordered admission of exploration work
//!
//! One scheduler is shared by a whole traversal. Every explored entry runs
//! while holding one of its permits, so the number of entries being worked
//! on at once never exceeds the concurrency limit, no matter how many
//! directories are open. Waiting work is admitted lowest priority key first;
//! the explorer uses `-depth` so deeper entries finish before the walk
//! widens.

use crate::error::Result;
use compio_sync::{CancellationExt, CancellationToken, Cancelled, Semaphore, SemaphorePermit};
use futures::future::{self, Either, LocalBoxFuture};
use futures::stream::FuturesUnordered;
use futures::FutureExt;
use std::future::Future;
use std::pin::pin;
use tracing::trace;

/// Work items dispatched by one [`Scheduler::schedule`] call, in completion order
pub(crate) type Batch<'a, R> = FuturesUnordered<LocalBoxFuture<'a, Result<R>>>;

#[derive(Debug)]
pub(crate) struct Scheduler {
    semaphore: Semaphore,
    cancellation: Option<CancellationToken>,
}

impl Scheduler {
    pub(crate) fn new(limit: usize, cancellation: Option<CancellationToken>) -> Self {
        Self {
            semaphore: Semaphore::new(limit.max(1)),
            cancellation,
        }
    }

    /// Fail with `Cancelled` once the traversal's token fired
    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if let Some(token) = &self.cancellation {
            token.check()?;
        }
        Ok(())
    }

    /// Wait for a permit, or for cancellation
    pub(crate) async fn admit(&self, priority: i64) -> Result<SemaphorePermit> {
        self.check_cancelled()?;

        let acquire = self.semaphore.acquire_with_priority(priority);
        let permit = match &self.cancellation {
            None => acquire.await,
            Some(token) => match future::select(acquire, pin!(token.cancelled())).await {
                Either::Left((permit, _)) => permit,
                // Dropping the pending acquire gives up its place in the queue
                Either::Right(((), _)) => return Err(Cancelled.into()),
            },
        };

        trace!(
            "Admitted work at priority {} ({} of {} permits in use)",
            priority,
            self.semaphore.in_use(),
            self.semaphore.max_permits()
        );
        Ok(permit)
    }

    /// Turn `items` into admitted work items
    ///
    /// Each item waits for a permit at `priority(&item)` and then runs
    /// `worker(item, permit)`. The worker owns the permit and may drop it
    /// early. Items are queued in iteration order; the returned batch yields
    /// results as they settle.
    pub(crate) fn schedule<'a, T, R, W, Fut>(
        &'a self,
        items: impl IntoIterator<Item = T>,
        priority: impl Fn(&T) -> i64,
        worker: W,
    ) -> Batch<'a, R>
    where
        T: 'a,
        R: 'a,
        W: Fn(T, SemaphorePermit) -> Fut + Clone + 'a,
        Fut: Future<Output = Result<R>> + 'a,
    {
        items
            .into_iter()
            .map(|item| {
                let key = priority(&item);
                let worker = worker.clone();
                async move {
                    let permit = self.admit(key).await?;
                    worker(item, permit).await
                }
                .boxed_local()
            })
            .collect()
    }

    #[cfg(test)]
    fn semaphore(&self) -> &Semaphore {
        &self.semaphore
    }
}
