//! Command-line interface definitions

use anyhow::Result;
use arwalk::{CancellationToken, ExploreOptions};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Concurrent directory tree walker
#[derive(Parser, Debug)]
#[command(author, version, about = "Concurrent directory tree walker", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Args {
    /// File or directory to explore
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Recurse into symlinks that point at directories
    #[arg(short = 'L', long)]
    pub follow_symlinks: bool,

    /// Report symlinks with their own metadata only
    #[arg(long)]
    pub no_resolve: bool,

    /// Maximum number of entries explored at once
    ///
    /// Values below 1 are raised to 1.
    #[arg(short = 'j', long, default_value = "8", allow_negative_numbers = true)]
    pub concurrency: i64,

    /// Do not descend more than N directory levels below PATH
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Skip children with this exact name (repeatable)
    #[arg(long, value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Which entries to print
    #[arg(short = 't', long = "type", value_enum, default_value = "all")]
    pub entry_type: EntryFilter,

    /// Print entry kind and size before each path
    #[arg(short = 'l', long)]
    pub long: bool,

    /// Cancel the walk after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Show a spinner with running counts
    #[arg(long)]
    pub progress: bool,

    /// Print traversal counts to stderr when done
    #[arg(long)]
    pub summary: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all logging except errors)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Entry kinds selected for printing
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EntryFilter {
    /// Files, including symlinks reported as leaves
    #[value(name = "f")]
    Files,
    /// Directories, including announced directory symlinks
    #[value(name = "d")]
    Directories,
    /// Everything
    All,
}

impl EntryFilter {
    #[must_use]
    pub const fn files(self) -> bool {
        matches!(self, Self::Files | Self::All)
    }

    #[must_use]
    pub const fn directories(self) -> bool {
        matches!(self, Self::Directories | Self::All)
    }
}

impl Args {
    /// Validate command-line arguments
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// - Both --quiet and --verbose options are used
    /// - An --exclude name is empty or contains a path separator
    /// - --timeout-secs is 0
    pub fn validate(&self) -> Result<()> {
        if self.quiet && self.verbose > 0 {
            anyhow::bail!("Cannot use both --quiet and --verbose options");
        }

        if let Some(name) = self
            .exclude
            .iter()
            .find(|name| name.is_empty() || name.contains(std::path::MAIN_SEPARATOR))
        {
            anyhow::bail!("--exclude takes a plain entry name, got: {name:?}");
        }

        if self.timeout_secs == Some(0) {
            anyhow::bail!("--timeout-secs must be at least 1");
        }

        Ok(())
    }

    /// Effective concurrency limit
    #[must_use]
    pub fn concurrency_limit(&self) -> usize {
        if self.concurrency < 1 {
            warn!(
                "Concurrency limit must be at least 1, got {}; using 1",
                self.concurrency
            );
            return 1;
        }
        usize::try_from(self.concurrency).unwrap_or(usize::MAX)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Library options for this invocation
    #[must_use]
    pub fn explore_options(&self, cancellation: Option<CancellationToken>) -> ExploreOptions {
        let options = ExploreOptions::default()
            .with_follow_symlinks(self.follow_symlinks)
            .with_resolve_metadata(!self.no_resolve)
            .with_concurrency_limit(self.concurrency_limit());
        match cancellation {
            Some(token) => options.with_cancellation(token),
            None => options,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("arwalk").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["/tmp"]);
        assert_eq!(args.path, PathBuf::from("/tmp"));
        assert!(!args.follow_symlinks);
        assert!(!args.no_resolve);
        assert_eq!(args.concurrency_limit(), 8);
        assert_eq!(args.entry_type, EntryFilter::All);
        assert!(args.exclude.is_empty());
        assert!(args.validate().is_ok());

        let options = args.explore_options(None);
        assert!(options.resolve_metadata());
        assert!(!options.follow_symlinks());
        assert!(options.cancellation().is_none());
    }

    #[test]
    fn test_non_positive_concurrency_becomes_one() {
        assert_eq!(parse(&["-j", "0", "/tmp"]).concurrency_limit(), 1);
        assert_eq!(parse(&["-j", "-3", "/tmp"]).concurrency_limit(), 1);
        assert_eq!(parse(&["--concurrency", "32", "/tmp"]).concurrency_limit(), 32);
    }

    #[test]
    fn test_flags_map_to_options() {
        let args = parse(&["-L", "--no-resolve", "-j", "4", "/tmp"]);
        let token = CancellationToken::new();
        let options = args.explore_options(Some(token));
        assert!(options.follow_symlinks());
        assert!(!options.resolve_metadata());
        assert_eq!(options.concurrency_limit(), 4);
        assert!(options.cancellation().is_some());
    }

    #[test]
    fn test_repeated_excludes_and_type() {
        let args = parse(&["--exclude", "target", "--exclude", ".git", "-t", "d", "/tmp"]);
        assert_eq!(args.exclude, vec!["target", ".git"]);
        assert_eq!(args.entry_type, EntryFilter::Directories);
        assert!(args.entry_type.directories());
        assert!(!args.entry_type.files());
    }

    #[test]
    fn test_validate_rejects_conflicts() {
        assert!(parse(&["-q", "-v", "/tmp"]).validate().is_err());
        assert!(parse(&["--exclude", "a/b", "/tmp"]).validate().is_err());
        assert!(parse(&["--exclude", "", "/tmp"]).validate().is_err());
        assert!(parse(&["--timeout-secs", "0", "/tmp"]).validate().is_err());
        assert_eq!(
            parse(&["--timeout-secs", "3", "/tmp"]).timeout(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_about_names_the_tool() {
        let command = Args::command();
        let about = command.get_about().map(ToString::to_string);
        assert_eq!(about.as_deref(), Some("Concurrent directory tree walker"));
    }

    #[test]
    fn test_missing_path_is_rejected() {
        assert!(Args::try_parse_from(["arwalk"]).is_err());
    }
}
