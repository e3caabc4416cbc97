//! Filesystem and path adapters
//!
//! The traversal engine never touches a filesystem directly. It talks to a
//! [`FileSystem`] for node metadata, directory listings and symlink
//! resolution, and to a [`PathOps`] for building child paths and measuring
//! depth. [`LocalFs`] and [`NativePaths`] cover the local machine; other
//! backends (remote protocols, archives, [`MemoryFs`](crate::MemoryFs))
//! plug in by implementing the same traits.

use crate::metadata::{EntryKind, EntryMetadata};
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::trace;

/// Read-only filesystem capability used by the explorer
///
/// Futures returned by these methods are polled on the explorer's task and
/// need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait FileSystem {
    /// Metadata of `path` itself, without following a final symlink
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the path cannot be inspected.
    async fn lstat(&self, path: &Path) -> io::Result<EntryMetadata>;

    /// Names (not paths) of the entries in directory `path`, in backend order
    ///
    /// Names are raw; a backend must not reject an entry because its name
    /// is not valid UTF-8.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the directory cannot be listed.
    async fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>>;

    /// Canonical absolute path of `path`, with every symlink resolved
    ///
    /// # Errors
    ///
    /// Returns an error for dangling links, link loops and missing paths.
    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    async fn lstat(&self, path: &Path) -> io::Result<EntryMetadata> {
        (**self).lstat(path).await
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        (**self).read_dir(path).await
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        (**self).canonicalize(path).await
    }
}

/// Path arithmetic used by the explorer
pub trait PathOps {
    /// Path of entry `name` inside directory `parent`
    fn join(&self, parent: &Path, name: &OsStr) -> PathBuf;

    /// Number of named components in `path`; deeper paths get served first
    fn depth(&self, path: &Path) -> usize;
}

impl<T: PathOps + ?Sized> PathOps for &T {
    fn join(&self, parent: &Path, name: &OsStr) -> PathBuf {
        (**self).join(parent, name)
    }

    fn depth(&self, path: &Path) -> usize {
        (**self).depth(path)
    }
}

/// [`PathOps`] backed by `std::path`
#[derive(Debug, Clone, Copy, Default)]
pub struct NativePaths;

impl PathOps for NativePaths {
    fn join(&self, parent: &Path, name: &OsStr) -> PathBuf {
        parent.join(name)
    }

    fn depth(&self, path: &Path) -> usize {
        path.components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count()
    }
}

/// The local filesystem, through the compio runtime
///
/// `lstat` is a native compio operation. Directory listing and
/// canonicalization have no io_uring opcode and run on compio's blocking
/// thread pool instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl FileSystem for LocalFs {
    async fn lstat(&self, path: &Path) -> io::Result<EntryMetadata> {
        let meta = compio::fs::symlink_metadata(path).await?;

        let kind = if meta.is_symlink() {
            EntryKind::Symlink
        } else if meta.is_dir() {
            EntryKind::Directory
        } else if meta.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        Ok(EntryMetadata {
            kind,
            len: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        let dir = path.to_path_buf();
        blocking(move || {
            let names = std::fs::read_dir(&dir)?
                .map(|entry| entry.map(|e| e.file_name()))
                .collect::<io::Result<Vec<_>>>()?;
            trace!("Listed {} entries in {}", names.len(), dir.display());
            Ok(names)
        })
        .await
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let path = path.to_path_buf();
        blocking(move || std::fs::canonicalize(path)).await
    }
}

/// Run a blocking filesystem call on compio's thread pool
async fn blocking<T, F>(f: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    compio::runtime::spawn_blocking(f)
        .await
        .map_err(|_| io::Error::other("blocking filesystem task panicked"))?
}
