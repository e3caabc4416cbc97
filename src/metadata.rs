//! Entry classification handed to visitors

use std::time::SystemTime;

/// What kind of node a path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link (as seen by `lstat`)
    Symlink,
    /// FIFO, socket, block or character device
    Other,
}

impl EntryKind {
    /// Short label used by the CLI's long listing
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "dir",
            Self::Symlink => "link",
            Self::Other => "other",
        }
    }
}

/// Metadata of a single node, as returned by a [`FileSystem`](crate::FileSystem) `lstat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Node classification
    pub kind: EntryKind,
    /// Size in bytes
    pub len: u64,
    /// Last modification time, when the backend knows it
    pub modified: Option<SystemTime>,
}

impl EntryMetadata {
    /// Metadata with the given kind and no size or timestamp
    #[must_use]
    pub const fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            len: 0,
            modified: None,
        }
    }

    /// Set the size
    #[must_use]
    pub fn with_len(mut self, len: u64) -> Self {
        self.len = len;
        self
    }

    /// Set the modification time
    #[must_use]
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    #[must_use]
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        matches!(self.kind, EntryKind::Symlink)
    }
}

/// Stats reported for one explored path
///
/// `link` always describes the path itself. `target` is only present when
/// the path is a symlink, its target resolved, and metadata resolution was
/// requested in the options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStats {
    /// `lstat` of the path itself
    pub link: EntryMetadata,
    /// Metadata of the resolved symlink target
    pub target: Option<EntryMetadata>,
}

impl EntryStats {
    pub(crate) const fn new(link: EntryMetadata, target: Option<EntryMetadata>) -> Self {
        Self { link, target }
    }

    /// The metadata callers should treat as authoritative: the resolved
    /// target if one was reported, otherwise the link itself
    #[must_use]
    pub fn reported(&self) -> &EntryMetadata {
        self.target.as_ref().unwrap_or(&self.link)
    }

    /// Whether the explored path is itself a symbolic link
    #[must_use]
    pub const fn is_symlink(&self) -> bool {
        self.link.is_symlink()
    }
}
