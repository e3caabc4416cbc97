//! Depth-first asynchronous tree exploration
//!
//! The explorer classifies a start path, reports files to a [`Visitor`], and
//! recurses into directories. Children of a directory are explored
//! concurrently, bounded by a single permit pool shared across the whole
//! traversal and biased toward deeper paths.
//!
//! # Permits
//!
//! Each entry is explored while holding one permit. A directory holds its
//! permit while it is listed and announced and while its children join the
//! queue, gives it back before waiting on them, and takes one again (behind
//! all other waiting work) before it is closed. A directory therefore never waits for a
//! permit it is holding itself, and a limit of 1 cannot deadlock.
//!
//! # Errors
//!
//! The first failure in a subtree (adapter error, visitor error, special
//! file, cancellation) ends that subtree: unfinished sibling work is
//! dropped, the directory is not closed, and the error travels up to the
//! caller unchanged.

use crate::error::{ExploreError, Result, VisitResult};
use crate::fs::{FileSystem, LocalFs, NativePaths, PathOps};
use crate::metadata::{EntryKind, EntryMetadata, EntryStats};
use crate::options::ExploreOptions;
use crate::scheduler::Scheduler;
use crate::tracker::CompletionTracker;
use compio_sync::{SemaphorePermit, LOWEST_PRIORITY};
use crate::scheduler::Batch;
use futures::future::{self, LocalBoxFuture};
use futures::{FutureExt, StreamExt};
use std::cell::Cell;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::task::Poll;
use tracing::{debug, info, trace};

/// Callbacks invoked during exploration
///
/// Every method has a default that accepts the entry, so a visitor only
/// implements what it cares about. Returning an error aborts the subtree
/// and, through it, the whole traversal.
///
/// Methods take `&self`; visitors that collect results use interior
/// mutability. The futures they return are polled on the explorer's task
/// and need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait Visitor {
    /// A leaf: a regular file, a symlink that is not explored as a
    /// directory, or a broken symlink (with `stats.target == None`)
    async fn visit_file(&self, _path: &Path, _stats: &EntryStats) -> VisitResult<()> {
        Ok(())
    }

    /// A directory is about to be explored
    ///
    /// `children` is the listing in backend order, names as the backend
    /// returned them (not necessarily UTF-8). The returned plan
    /// decides which children are explored, in which order, or whether the
    /// directory is skipped altogether.
    async fn enter_directory(
        &self,
        _path: &Path,
        _stats: &EntryStats,
        children: Vec<OsString>,
    ) -> VisitResult<DirectoryPlan> {
        Ok(DirectoryPlan::descend(children))
    }

    /// Every planned child subtree of the directory has finished
    ///
    /// `children` is the listing returned by `enter_directory`.
    async fn leave_directory(
        &self,
        _path: &Path,
        _stats: &EntryStats,
        _children: &[OsString],
    ) -> VisitResult<()> {
        Ok(())
    }
}

/// What to do with a directory after `enter_directory`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPlan {
    /// Children to explore, in dispatch order
    pub children: Vec<OsString>,
    /// Do not descend; close the directory right away
    pub skip: bool,
}

impl DirectoryPlan {
    /// Explore `children`
    #[must_use]
    pub fn descend(children: Vec<OsString>) -> Self {
        Self {
            children,
            skip: false,
        }
    }

    /// Do not explore anything below this directory
    #[must_use]
    pub fn skip(children: Vec<OsString>) -> Self {
        Self {
            children,
            skip: true,
        }
    }
}

/// Counts gathered during one successful exploration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExploreStats {
    /// Entries reported through `visit_file`
    pub files: u64,
    /// Entries reported through `enter_directory`
    pub directories: u64,
    /// Symbolic links encountered, whatever they were reported as
    pub symlinks: u64,
    /// Symbolic links whose target could not be resolved
    pub broken_symlinks: u64,
}

/// Asynchronous tree explorer over a pluggable filesystem
///
/// # Example
///
/// ```rust,no_run
/// use arwalk::{EntryStats, ExploreOptions, Explorer, LocalFs, VisitResult, Visitor};
/// use std::path::Path;
///
/// struct Print;
///
/// impl Visitor for Print {
///     async fn visit_file(&self, path: &Path, _stats: &EntryStats) -> VisitResult<()> {
///         println!("{}", path.display());
///         Ok(())
///     }
/// }
///
/// # async fn example() -> arwalk::Result<()> {
/// let explorer = Explorer::new(LocalFs)
///     .with_options(ExploreOptions::default().with_concurrency_limit(8));
/// let stats = explorer.explore("/usr/share/doc", &Print).await?;
/// println!("{} files", stats.files);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Explorer<F, P = NativePaths> {
    fs: F,
    paths: P,
    options: ExploreOptions,
}

impl<F: FileSystem> Explorer<F> {
    /// Explorer over `fs` with native path handling and default options
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            paths: NativePaths,
            options: ExploreOptions::default(),
        }
    }
}

impl<F: FileSystem, P: PathOps> Explorer<F, P> {
    /// Replace the path utility
    pub fn with_paths<Q: PathOps>(self, paths: Q) -> Explorer<F, Q> {
        Explorer {
            fs: self.fs,
            paths,
            options: self.options,
        }
    }

    /// Replace the options
    #[must_use]
    pub fn with_options(mut self, options: ExploreOptions) -> Self {
        self.options = options;
        self
    }

    /// Options every call to [`explore`](Self::explore) runs with
    pub fn options(&self) -> &ExploreOptions {
        &self.options
    }

    /// The backend being explored, e.g. to read a [`MemoryFs`](crate::MemoryFs)'s counters
    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Explore `start` and everything below it
    ///
    /// Resolves once, after every dispatched operation settled or as soon
    /// as the first error surfaced.
    ///
    /// # Errors
    ///
    /// Returns the first [`ExploreError`] raised anywhere in the tree.
    pub async fn explore<V: Visitor>(
        &self,
        start: impl AsRef<Path>,
        visitor: &V,
    ) -> Result<ExploreStats> {
        let start = start.as_ref();
        info!(
            "Starting exploration of {} (concurrency {}, follow symlinks: {}, resolve metadata: {})",
            start.display(),
            self.options.concurrency_limit(),
            self.options.follow_symlinks(),
            self.options.resolve_metadata()
        );

        let walk = Walk {
            fs: &self.fs,
            paths: &self.paths,
            options: &self.options,
            visitor,
            scheduler: Scheduler::new(
                self.options.concurrency_limit(),
                self.options.cancellation().cloned(),
            ),
            stats: Cell::new(ExploreStats::default()),
        };

        let permit = walk.scheduler.admit(0).await?;
        match walk.explore_entry(start.to_path_buf(), permit).await {
            Ok(()) => {
                let stats = walk.stats.get();
                info!(
                    "Exploration completed: {} files, {} directories, {} symlinks ({} broken)",
                    stats.files, stats.directories, stats.symlinks, stats.broken_symlinks
                );
                Ok(stats)
            }
            Err(e) => {
                debug!("Exploration of {} failed: {}", start.display(), e);
                Err(e)
            }
        }
    }
}

/// Explore `start` on the local filesystem
///
/// # Errors
///
/// Returns the first [`ExploreError`] raised anywhere in the tree.
pub async fn explore<V: Visitor>(
    start: impl AsRef<Path>,
    visitor: &V,
    options: ExploreOptions,
) -> Result<ExploreStats> {
    Explorer::new(LocalFs)
        .with_options(options)
        .explore(start, visitor)
        .await
}

/// State of one running traversal
struct Walk<'a, F, P, V> {
    fs: &'a F,
    paths: &'a P,
    options: &'a ExploreOptions,
    visitor: &'a V,
    scheduler: Scheduler,
    stats: Cell<ExploreStats>,
}

impl<'a, F, P, V> Walk<'a, F, P, V>
where
    F: FileSystem + 'a,
    P: PathOps + 'a,
    V: Visitor + 'a,
{
    /// Explore one path while holding `permit`
    fn explore_entry(&'a self, path: PathBuf, permit: SemaphorePermit) -> LocalBoxFuture<'a, Result<()>> {
        async move {
            self.scheduler.check_cancelled()?;

            let link = self
                .fs
                .lstat(&path)
                .await
                .map_err(|source| ExploreError::Lstat {
                    path: path.clone(),
                    source,
                })?;

            let mut target = None;
            if link.is_symlink() {
                self.count(|s| s.symlinks += 1);
                if self.options.resolves_links() {
                    match self.resolve_target(&path).await {
                        Ok(meta) => target = Some(meta),
                        Err(err) => {
                            debug!("Broken symlink {}: {}", path.display(), err);
                            self.count(|s| s.broken_symlinks += 1);
                            return self.report_file(&path, EntryStats::new(link, None)).await;
                        }
                    }
                }
            }

            let kind = target.as_ref().map_or(link.kind, |meta| meta.kind);
            let stats = if self.options.resolve_metadata() {
                EntryStats::new(link, target)
            } else {
                EntryStats::new(link, None)
            };

            match kind {
                EntryKind::File | EntryKind::Symlink => self.report_file(&path, stats).await,
                EntryKind::Directory if stats.is_symlink() && !self.options.follow_symlinks() => {
                    self.announce_linked_directory(&path, &stats).await
                }
                EntryKind::Directory => self.explore_directory(path, stats, permit).await,
                EntryKind::Other => Err(ExploreError::NotFileOrDirectory(path)),
            }
        }
        .boxed_local()
    }

    async fn resolve_target(&self, path: &Path) -> io::Result<EntryMetadata> {
        let resolved = self.fs.canonicalize(path).await?;
        trace!("Resolved {} to {}", path.display(), resolved.display());
        self.fs.lstat(&resolved).await
    }

    async fn report_file(&self, path: &Path, stats: EntryStats) -> Result<()> {
        self.count(|s| s.files += 1);
        self.visitor
            .visit_file(path, &stats)
            .await
            .map_err(|source| visitor_error(path, source))
    }

    /// A directory symlink that is not followed: opened and closed, never listed
    async fn announce_linked_directory(&self, path: &Path, stats: &EntryStats) -> Result<()> {
        debug!("Not following directory symlink {}", path.display());
        self.count(|s| s.directories += 1);
        // Nothing to skip, so the plan is irrelevant
        self.visitor
            .enter_directory(path, stats, Vec::new())
            .await
            .map_err(|source| visitor_error(path, source))?;
        self.close_directory(path, stats, &[]).await
    }

    async fn explore_directory(
        &'a self,
        path: PathBuf,
        stats: EntryStats,
        permit: SemaphorePermit,
    ) -> Result<()> {
        self.scheduler.check_cancelled()?;
        let listing = self
            .fs
            .read_dir(&path)
            .await
            .map_err(|source| ExploreError::ReadDir {
                path: path.clone(),
                source,
            })?;

        self.count(|s| s.directories += 1);
        let plan = self
            .visitor
            .enter_directory(&path, &stats, listing)
            .await
            .map_err(|source| visitor_error(&path, source))?;

        if plan.skip || plan.children.is_empty() {
            if plan.skip {
                debug!("Skipping directory {}", path.display());
            }
            return self.close_directory(&path, &stats, &plan.children).await;
        }

        let depth = i64::try_from(self.paths.depth(&path)).unwrap_or(i64::MAX);
        let children = plan.children.iter().map(|name| self.paths.join(&path, name));

        let mut tracker = CompletionTracker::new();
        let mut batch = self
            .scheduler
            .schedule(children, |_| -depth, move |child, permit| {
                self.explore_entry(child, permit)
            });
        for _ in 0..batch.len() {
            tracker.take();
        }
        trace!(
            "Dispatched {} children of {} at priority {}",
            tracker.pending() - 1,
            path.display(),
            -depth
        );

        // Children queue behind this permit before it is released, so it
        // passes to the deepest waiter instead of a shallower sibling.
        // Holding it while waiting on them would deadlock a limit of 1.
        let settled = start_batch(&mut batch).await;
        drop(permit);

        let mut outcome = tracker.give(Ok(()));
        for result in settled {
            if outcome.is_some() {
                break;
            }
            outcome = tracker.give(result);
        }
        while outcome.is_none() {
            let Some(result) = batch.next().await else {
                break;
            };
            outcome = tracker.give(result);
        }
        // Unfinished siblings of a failed child are abandoned here
        drop(batch);
        outcome.unwrap_or(Ok(()))?;

        let _permit = self.scheduler.admit(LOWEST_PRIORITY).await?;
        self.close_directory(&path, &stats, &plan.children).await
    }

    async fn close_directory(&self, path: &Path, stats: &EntryStats, children: &[OsString]) -> Result<()> {
        self.visitor
            .leave_directory(path, stats, children)
            .await
            .map_err(|source| visitor_error(path, source))
    }

    fn count(&self, update: impl FnOnce(&mut ExploreStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

/// Poll every item of a fresh batch once, collecting those that settle right away
async fn start_batch<R>(batch: &mut Batch<'_, R>) -> Vec<Result<R>> {
    let mut settled = Vec::new();
    // One round per item: the stream may yield early when items wake themselves
    let rounds = batch.len();
    future::poll_fn(|cx| {
        for _ in 0..rounds {
            match batch.poll_next_unpin(cx) {
                Poll::Ready(Some(result)) => settled.push(result),
                Poll::Ready(None) => break,
                Poll::Pending => {}
            }
        }
        Poll::Ready(())
    })
    .await;
    settled
}

fn visitor_error(path: &Path, source: crate::error::VisitError) -> ExploreError {
    ExploreError::Visitor {
        path: path.to_path_buf(),
        source,
    }
}
