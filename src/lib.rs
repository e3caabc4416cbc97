//! arwalk: asynchronous, bounded-concurrency directory tree exploration
//!
//! This library walks a file tree depth first, reporting files and
//! directories to a [`Visitor`] while sibling subtrees are explored
//! concurrently. Concurrency is bounded by one permit pool for the whole
//! traversal, and waiting work is admitted deepest first so open
//! directories close early instead of the walk fanning out.
//!
//! The filesystem is pluggable through [`FileSystem`]: [`LocalFs`] uses
//! compio, [`MemoryFs`] serves an in-memory tree for tests.

pub mod error;
pub mod explore;
pub mod fs;
pub mod memory;
pub mod metadata;
pub mod options;
mod scheduler;
mod tracker;

// Re-export commonly used types
pub use compio_sync::CancellationToken;
pub use error::{ExploreError, Result, VisitError, VisitResult};
pub use explore::{explore, DirectoryPlan, ExploreStats, Explorer, Visitor};
pub use fs::{FileSystem, LocalFs, NativePaths, PathOps};
pub use memory::MemoryFs;
pub use metadata::{EntryKind, EntryMetadata, EntryStats};
pub use options::ExploreOptions;
