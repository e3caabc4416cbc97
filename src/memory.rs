//! In-memory filesystem backend
//!
//! [`MemoryFs`] holds a virtual tree of files, directories, symlinks and
//! special nodes. It resolves symlinks the way a POSIX filesystem does,
//! can be told to fail specific operations, can make every operation
//! suspend a few times so concurrent branches interleave, and counts how
//! many operations were in flight at once.

use crate::fs::FileSystem;
use crate::metadata::{EntryKind, EntryMetadata};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// Symlink hops allowed before resolution reports a loop (Linux uses 40)
const MAX_SYMLINK_HOPS: usize = 40;

#[derive(Debug, Clone)]
enum Node {
    File { len: u64 },
    Dir { children: Vec<OsString> },
    Symlink { target: PathBuf },
    Special,
}

/// Virtual filesystem for tests, demos and dry runs
///
/// Paths are absolute; relative paths are taken relative to `/`.
///
/// # Example
///
/// ```rust
/// use arwalk::MemoryFs;
///
/// let mut fs = MemoryFs::new();
/// fs.add_file("/root/a.txt", 3)
///     .add_file("/root/sub/b.txt", 5)
///     .add_symlink("/root/link", "sub");
/// assert_eq!(fs.operations(), 0);
/// ```
#[derive(Debug)]
pub struct MemoryFs {
    nodes: BTreeMap<PathBuf, Node>,
    lstat_failures: HashSet<PathBuf>,
    read_dir_failures: HashSet<PathBuf>,
    latency: usize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    operations: AtomicUsize,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// An empty tree containing only `/`
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            PathBuf::from("/"),
            Node::Dir {
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            lstat_failures: HashSet::new(),
            read_dir_failures: HashSet::new(),
            latency: 0,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            operations: AtomicUsize::new(0),
        }
    }

    /// Add a directory, creating missing parents
    pub fn add_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = normalize(path.as_ref());
        self.insert(
            path,
            Node::Dir {
                children: Vec::new(),
            },
        );
        self
    }

    /// Add a regular file of `len` bytes, creating missing parents
    pub fn add_file(&mut self, path: impl AsRef<Path>, len: u64) -> &mut Self {
        let path = normalize(path.as_ref());
        self.insert(path, Node::File { len });
        self
    }

    /// Add a symlink; relative targets resolve against the link's directory
    pub fn add_symlink(&mut self, path: impl AsRef<Path>, target: impl AsRef<Path>) -> &mut Self {
        let path = normalize(path.as_ref());
        self.insert(
            path,
            Node::Symlink {
                target: target.as_ref().to_path_buf(),
            },
        );
        self
    }

    /// Add a node that is neither file, directory nor symlink (a FIFO, say)
    pub fn add_special(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = normalize(path.as_ref());
        self.insert(path, Node::Special);
        self
    }

    /// Make `lstat` of exactly this path fail with `PermissionDenied`
    pub fn fail_lstat(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.lstat_failures.insert(normalize(path.as_ref()));
        self
    }

    /// Make listing exactly this path fail with `PermissionDenied`
    pub fn fail_read_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.read_dir_failures.insert(normalize(path.as_ref()));
        self
    }

    /// Suspend every operation `yields` times before it completes
    pub fn set_latency(&mut self, yields: usize) -> &mut Self {
        self.latency = yields;
        self
    }

    /// Highest number of operations that were running at the same time
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Acquire)
    }

    /// Total number of operations started
    #[must_use]
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::Acquire)
    }

    fn insert(&mut self, path: PathBuf, node: Node) {
        if let Some(parent) = path.parent() {
            let parent = parent.to_path_buf();
            if !matches!(self.nodes.get(&parent), Some(Node::Dir { .. })) {
                self.insert(
                    parent.clone(),
                    Node::Dir {
                        children: Vec::new(),
                    },
                );
            }
            if let (Some(name), Some(Node::Dir { children })) = (
                path.file_name().map(|n| n.to_os_string()),
                self.nodes.get_mut(&parent),
            ) {
                if !children.contains(&name) {
                    children.push(name);
                }
            }
        }

        // Re-adding a directory keeps its listing
        if let (Node::Dir { .. }, Some(Node::Dir { .. })) = (&node, self.nodes.get(&path)) {
            return;
        }
        self.nodes.insert(path, node);
    }

    /// Resolve every symlink in `path`, like `realpath(3)`
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let mut pending: VecDeque<OsString> = names(path).collect();
        let mut resolved = PathBuf::from("/");
        let mut hops = 0;

        while let Some(name) = pending.pop_front() {
            if name == ".." {
                resolved.pop();
                continue;
            }

            let candidate = resolved.join(&name);
            match self.nodes.get(&candidate) {
                None => return Err(not_found(&candidate)),
                Some(Node::Symlink { target }) => {
                    hops += 1;
                    if hops > MAX_SYMLINK_HOPS {
                        return Err(io::Error::other(format!(
                            "too many levels of symbolic links: {}",
                            path.display()
                        )));
                    }
                    if target.is_absolute() {
                        resolved = PathBuf::from("/");
                    }
                    for (i, part) in names(target).enumerate() {
                        pending.insert(i, part);
                    }
                }
                Some(Node::File { .. } | Node::Special) if !pending.is_empty() => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("not a directory: {}", candidate.display()),
                    ));
                }
                Some(_) => resolved = candidate,
            }
        }

        Ok(resolved)
    }

    /// Resolve the parent of `path` but not its last component, like `lstat(2)`
    fn locate(&self, path: &Path) -> io::Result<PathBuf> {
        let path = normalize(path);
        match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => Ok(self.resolve(parent)?.join(name)),
            _ => Ok(path),
        }
    }

    async fn operation<T>(&self, f: impl FnOnce() -> io::Result<T>) -> io::Result<T> {
        self.operations.fetch_add(1, Ordering::AcqRel);
        let _guard = InFlight::enter(self);
        for _ in 0..self.latency {
            YieldNow::default().await;
        }
        f()
    }
}

impl FileSystem for MemoryFs {
    async fn lstat(&self, path: &Path) -> io::Result<EntryMetadata> {
        self.operation(|| {
            if self.lstat_failures.contains(&normalize(path)) {
                return Err(permission_denied(path));
            }
            let located = self.locate(path)?;
            let meta = match self.nodes.get(&located) {
                None => return Err(not_found(path)),
                Some(Node::File { len }) => EntryMetadata::new(EntryKind::File).with_len(*len),
                Some(Node::Dir { .. }) => EntryMetadata::new(EntryKind::Directory),
                Some(Node::Symlink { target }) => EntryMetadata::new(EntryKind::Symlink)
                    .with_len(target.as_os_str().len() as u64),
                Some(Node::Special) => EntryMetadata::new(EntryKind::Other),
            };
            Ok(meta)
        })
        .await
    }

    async fn read_dir(&self, path: &Path) -> io::Result<Vec<OsString>> {
        self.operation(|| {
            if self.read_dir_failures.contains(&normalize(path)) {
                return Err(permission_denied(path));
            }
            match self.nodes.get(&self.resolve(path)?) {
                Some(Node::Dir { children }) => Ok(children.clone()),
                _ => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("not a directory: {}", path.display()),
                )),
            }
        })
        .await
    }

    async fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        self.operation(|| self.resolve(path)).await
    }
}

/// Lexically normalized absolute form of `path`
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::from("/");
    for part in path.components() {
        match part {
            Component::Normal(name) => out.push(name),
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

/// Components of `path` as names, keeping `..` for the resolver
fn names(path: &Path) -> impl Iterator<Item = OsString> + '_ {
    path.components().filter_map(|part| match part {
        Component::Normal(name) => Some(name.to_os_string()),
        Component::ParentDir => Some(OsString::from("..")),
        Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
    })
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn permission_denied(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("permission denied: {}", path.display()),
    )
}

struct InFlight<'a> {
    fs: &'a MemoryFs,
}

impl<'a> InFlight<'a> {
    fn enter(fs: &'a MemoryFs) -> Self {
        let now = fs.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        fs.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        Self { fs }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.fs.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Suspends once, rescheduling itself immediately
#[derive(Default)]
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
