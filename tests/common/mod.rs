//! Common test helpers for integration tests
#![allow(dead_code)]

use arwalk::{DirectoryPlan, EntryStats, VisitResult, Visitor};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct TestTimeoutGuard {
    cancelled: Arc<AtomicBool>,
}

impl Drop for TestTimeoutGuard {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Abort the test binary if the guard is still alive after `duration`
///
/// Guards against a walk that never resolves.
pub fn test_timeout_guard(duration: Duration) -> TestTimeoutGuard {
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_clone = Arc::clone(&cancelled);
    std::thread::spawn(move || {
        std::thread::sleep(duration);
        if !cancelled_clone.load(Ordering::SeqCst) {
            eprintln!("Test timeout exceeded ({}s). Aborting.", duration.as_secs());
            std::process::abort();
        }
    });
    TestTimeoutGuard { cancelled }
}

/// Run a future to completion on a fresh compio runtime
pub fn block_on<F: Future>(future: F) -> F::Output {
    compio::runtime::Runtime::new()
        .expect("Failed to create compio runtime")
        .block_on(future)
}

/// One visitor callback, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    File(PathBuf),
    Begin(PathBuf),
    End(PathBuf),
}

impl Event {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(path) | Self::Begin(path) | Self::End(path) => path,
        }
    }
}

/// Visitor that records every callback and can be told to misbehave
#[derive(Default)]
pub struct RecordingVisitor {
    events: RefCell<Vec<Event>>,
    stats: RefCell<HashMap<PathBuf, EntryStats>>,
    closed_with: RefCell<HashMap<PathBuf, Vec<String>>>,
    skip: HashSet<PathBuf>,
    exclude: HashSet<String>,
    fail_file: Option<PathBuf>,
    fail_enter: Option<PathBuf>,
    fail_leave: Option<PathBuf>,
    sorted: bool,
}

impl RecordingVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visit children in name order instead of listing order
    pub fn sorted(mut self) -> Self {
        self.sorted = true;
        self
    }

    pub fn skipping(mut self, path: impl Into<PathBuf>) -> Self {
        self.skip.insert(path.into());
        self
    }

    pub fn excluding(mut self, name: &str) -> Self {
        self.exclude.insert(name.to_string());
        self
    }

    pub fn failing_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_file = Some(path.into());
        self
    }

    pub fn failing_enter(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_enter = Some(path.into());
        self
    }

    pub fn failing_leave(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_leave = Some(path.into());
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Paths reported through `visit_file`, sorted
    pub fn files(&self) -> Vec<PathBuf> {
        self.collect(|event| matches!(event, Event::File(_)))
    }

    /// Paths reported through `enter_directory`, sorted
    pub fn directories(&self) -> Vec<PathBuf> {
        self.collect(|event| matches!(event, Event::Begin(_)))
    }

    /// Paths reported through `leave_directory`, sorted
    pub fn closed(&self) -> Vec<PathBuf> {
        self.collect(|event| matches!(event, Event::End(_)))
    }

    pub fn stats_of(&self, path: impl AsRef<Path>) -> Option<EntryStats> {
        self.stats.borrow().get(path.as_ref()).cloned()
    }

    /// Children handed to `leave_directory` for `path`
    pub fn closed_with(&self, path: impl AsRef<Path>) -> Option<Vec<String>> {
        self.closed_with.borrow().get(path.as_ref()).cloned()
    }

    /// Position of an event in the recorded sequence
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events.borrow().iter().position(|e| e == event)
    }

    fn collect(&self, keep: impl Fn(&Event) -> bool) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .events
            .borrow()
            .iter()
            .filter(|event| keep(event))
            .map(|event| event.path().to_path_buf())
            .collect();
        paths.sort();
        paths
    }

    fn record(&self, event: Event, stats: &EntryStats) {
        self.stats
            .borrow_mut()
            .insert(event.path().to_path_buf(), stats.clone());
        self.events.borrow_mut().push(event);
    }
}

impl Visitor for RecordingVisitor {
    async fn visit_file(&self, path: &Path, stats: &EntryStats) -> VisitResult<()> {
        self.record(Event::File(path.to_path_buf()), stats);
        if self.fail_file.as_deref() == Some(path) {
            return Err(format!("refusing file {}", path.display()).into());
        }
        Ok(())
    }

    async fn enter_directory(
        &self,
        path: &Path,
        stats: &EntryStats,
        mut children: Vec<OsString>,
    ) -> VisitResult<DirectoryPlan> {
        self.record(Event::Begin(path.to_path_buf()), stats);
        if self.fail_enter.as_deref() == Some(path) {
            return Err(format!("refusing directory {}", path.display()).into());
        }
        children.retain(|name| !self.exclude.contains(&*name.to_string_lossy()));
        if self.sorted {
            children.sort();
        }
        if self.skip.contains(path) {
            return Ok(DirectoryPlan::skip(children));
        }
        Ok(DirectoryPlan::descend(children))
    }

    async fn leave_directory(
        &self,
        path: &Path,
        _stats: &EntryStats,
        children: &[OsString],
    ) -> VisitResult<()> {
        self.events.borrow_mut().push(Event::End(path.to_path_buf()));
        self.closed_with
            .borrow_mut()
            .insert(
                path.to_path_buf(),
                children
                    .iter()
                    .map(|name| name.to_string_lossy().into_owned())
                    .collect(),
            );
        if self.fail_leave.as_deref() == Some(path) {
            return Err(format!("refusing to close {}", path.display()).into());
        }
        Ok(())
    }
}

/// Sorted paths of every entry `walkdir` finds at or below `root`
pub fn walkdir_oracle(root: &Path, follow_links: bool) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .follow_links(follow_links)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}
