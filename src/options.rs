//! Traversal configuration

use compio_sync::CancellationToken;
use tracing::warn;

/// Options for one `explore` run
///
/// # Example
///
/// ```rust
/// use arwalk::ExploreOptions;
///
/// let options = ExploreOptions::default()
///     .with_follow_symlinks(true)
///     .with_concurrency_limit(0);
/// assert_eq!(options.concurrency_limit(), 1);
/// assert!(options.resolve_metadata());
/// ```
#[derive(Debug, Clone)]
pub struct ExploreOptions {
    resolve_metadata: bool,
    follow_symlinks: bool,
    concurrency_limit: usize,
    cancellation: Option<CancellationToken>,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            resolve_metadata: true,
            follow_symlinks: false,
            concurrency_limit: 1,
            cancellation: None,
        }
    }
}

impl ExploreOptions {
    /// Report a symlink's target metadata alongside the link's own (default `true`)
    #[must_use]
    pub fn with_resolve_metadata(mut self, resolve: bool) -> Self {
        self.resolve_metadata = resolve;
        self
    }

    /// Recurse into symlinks that point at directories (default `false`)
    ///
    /// When false, such links are announced as directories with no
    /// children and are never listed.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Maximum number of entries explored concurrently (default 1)
    ///
    /// A limit of 0 is raised to 1.
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        if limit == 0 {
            warn!("Concurrency limit must be at least 1, using 1");
        }
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Stop admitting new work once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub const fn resolve_metadata(&self) -> bool {
        self.resolve_metadata
    }

    #[must_use]
    pub const fn follow_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    #[must_use]
    pub const fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    #[must_use]
    pub const fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Whether symlink targets must be resolved at all
    pub(crate) const fn resolves_links(&self) -> bool {
        self.follow_symlinks || self.resolve_metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ExploreOptions::default();
        assert!(options.resolve_metadata());
        assert!(!options.follow_symlinks());
        assert_eq!(options.concurrency_limit(), 1);
        assert!(options.cancellation().is_none());
        assert!(options.resolves_links());
    }

    #[test]
    fn zero_limit_is_clamped() {
        let options = ExploreOptions::default().with_concurrency_limit(0);
        assert_eq!(options.concurrency_limit(), 1);
        let options = options.with_concurrency_limit(16);
        assert_eq!(options.concurrency_limit(), 16);
    }

    #[test]
    fn link_resolution_needed_by_either_flag() {
        let none = ExploreOptions::default().with_resolve_metadata(false);
        assert!(!none.resolves_links());
        assert!(none.clone().with_follow_symlinks(true).resolves_links());
    }
}
