//! Error handling and types

use std::path::PathBuf;
use thiserror::Error;

/// Error type visitors return from their callbacks
pub type VisitError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for visitor callbacks
pub type VisitResult<T> = std::result::Result<T, VisitError>;

/// Traversal errors
///
/// Every variant is fatal to the subtree it occurs in and is forwarded
/// unchanged up to the caller of `explore`. Broken symlinks are not errors;
/// they are reported to the visitor as leaves.
#[derive(Error, Debug)]
pub enum ExploreError {
    /// `lstat` failed for a path
    #[error("Failed to stat {}: {source}", .path.display())]
    Lstat {
        /// Path that could not be inspected
        path: PathBuf,
        /// Underlying adapter error
        #[source]
        source: std::io::Error,
    },

    /// Listing a directory failed
    #[error("Failed to read directory {}: {source}", .path.display())]
    ReadDir {
        /// Directory that could not be listed
        path: PathBuf,
        /// Underlying adapter error
        #[source]
        source: std::io::Error,
    },

    /// The path is a FIFO, socket, device or similar
    #[error("not a file nor a directory: {}", .0.display())]
    NotFileOrDirectory(PathBuf),

    /// A visitor callback reported a failure
    #[error("Visitor failed at {}: {source}", .path.display())]
    Visitor {
        /// Path the callback was invoked for
        path: PathBuf,
        /// Error returned by the callback
        #[source]
        source: VisitError,
    },

    /// The traversal's cancellation token fired
    #[error("Traversal cancelled")]
    Cancelled(#[from] compio_sync::Cancelled),
}

impl ExploreError {
    /// Path the error is attached to, if any
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Lstat { path, .. }
            | Self::ReadDir { path, .. }
            | Self::Visitor { path, .. }
            | Self::NotFileOrDirectory(path) => Some(path),
            Self::Cancelled(_) => None,
        }
    }

    /// Check if the traversal stopped because it was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, ExploreError>;
