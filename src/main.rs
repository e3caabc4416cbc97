//! arwalk: concurrent directory tree walker
//!
//! Prints every entry below a path, exploring sibling subtrees concurrently
//! on a single compio task.

use anyhow::{Context, Result};
use arwalk::{
    CancellationToken, DirectoryPlan, EntryStats, ExploreStats, Explorer, LocalFs, VisitResult,
    Visitor,
};
use clap::Parser;
use futures::future::{self, Either};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, Level};

mod cli;
mod progress;

use cli::{Args, EntryFilter};
use progress::ProgressTracker;

/// Visitor that prints entries as they are reported
struct Printer {
    root: PathBuf,
    max_depth: Option<usize>,
    exclude: Vec<String>,
    filter: EntryFilter,
    long: bool,
    progress: ProgressTracker,
}

impl Printer {
    fn new(args: &Args) -> Self {
        Self {
            root: args.path.clone(),
            max_depth: args.max_depth,
            exclude: args.exclude.clone(),
            filter: args.entry_type,
            long: args.long,
            progress: if args.progress {
                ProgressTracker::new()
            } else {
                ProgressTracker::hidden()
            },
        }
    }

    /// Levels below the starting path
    fn depth(&self, path: &Path) -> usize {
        path.strip_prefix(&self.root)
            .map_or(0, |relative| relative.components().count())
    }

    fn print(&self, path: &Path, stats: &EntryStats) {
        let line = if self.long {
            let reported = stats.reported();
            format!(
                "{:<5} {:>12} {}",
                stats.link.kind.label(),
                reported.len,
                path.display()
            )
        } else {
            path.display().to_string()
        };
        self.progress.println(&line);
    }
}

impl Visitor for Printer {
    async fn visit_file(&self, path: &Path, stats: &EntryStats) -> VisitResult<()> {
        self.progress.file();
        if self.filter.files() {
            self.print(path, stats);
        }
        Ok(())
    }

    async fn enter_directory(
        &self,
        path: &Path,
        stats: &EntryStats,
        mut children: Vec<OsString>,
    ) -> VisitResult<DirectoryPlan> {
        self.progress.directory();
        if self.filter.directories() {
            self.print(path, stats);
        }

        if self.max_depth.is_some_and(|max| self.depth(path) >= max) {
            debug!("Reached maximum depth at {}", path.display());
            return Ok(DirectoryPlan::skip(children));
        }

        children.retain(|name| {
            !self
                .exclude
                .iter()
                .any(|excluded| name == excluded.as_str())
        });
        // Listing order is backend-defined; print in a stable order
        children.sort();
        Ok(DirectoryPlan::descend(children))
    }
}

#[compio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging based on verbosity and quiet mode
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.quiet {
            Level::ERROR
        } else {
            match args.verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        })
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting arwalk v{}", env!("CARGO_PKG_VERSION"));
    info!("Path: {}", args.path.display());

    // Validate arguments
    args.validate().context("Invalid arguments")?;

    let cancellation = args.timeout().map(|_| CancellationToken::new());
    let explorer =
        Explorer::new(LocalFs).with_options(args.explore_options(cancellation.clone()));
    let printer = Printer::new(&args);

    let started = Instant::now();
    let walk = explorer.explore(&args.path, &printer);
    let result = match (args.timeout(), &cancellation) {
        (Some(timeout), Some(token)) => with_timeout(walk, timeout, token).await,
        _ => walk.await,
    }
    .with_context(|| format!("Failed to explore {}", args.path.display()));
    printer.progress.finish();

    match result {
        Ok(stats) => {
            let (files, directories) = printer.progress.counts();
            info!(
                "Walk completed in {:?}: {} files, {} directories reported",
                started.elapsed(),
                files,
                directories
            );
            if args.summary {
                print_summary(&stats, started.elapsed());
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Drive `walk`, cancelling `token` if it is still running after `timeout`
///
/// The walk is awaited to the end either way, so it unwinds through its own
/// cancellation checks.
async fn with_timeout<T>(
    walk: impl Future<Output = T>,
    timeout: Duration,
    token: &CancellationToken,
) -> T {
    match future::select(pin!(walk), pin!(compio::time::sleep(timeout))).await {
        Either::Left((output, _)) => output,
        Either::Right(((), walk)) => {
            debug!("Timeout of {:?} elapsed, cancelling", timeout);
            token.cancel();
            walk.await
        }
    }
}

fn print_summary(stats: &ExploreStats, elapsed: Duration) {
    eprintln!("files:           {}", stats.files);
    eprintln!("directories:     {}", stats.directories);
    eprintln!("symlinks:        {}", stats.symlinks);
    eprintln!("broken symlinks: {}", stats.broken_symlinks);
    eprintln!("elapsed:         {elapsed:.2?}");
}
