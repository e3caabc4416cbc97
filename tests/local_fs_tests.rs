//! Exploration of real directory trees, checked against walkdir

mod common;

use arwalk::{explore, EntryKind, ExploreError, ExploreOptions, Explorer, LocalFs};
use common::{block_on, test_timeout_guard, walkdir_oracle, Event, RecordingVisitor};
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Creates a small project-like tree
fn create_tree(root: &Path) {
    fs::create_dir_all(root.join("src/nested/deeper")).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::create_dir(root.join("empty")).unwrap();
    fs::write(root.join("README.md"), b"# readme").unwrap();
    fs::write(root.join("src/lib.rs"), b"pub fn f() {}").unwrap();
    fs::write(root.join("src/nested/mod.rs"), b"").unwrap();
    fs::write(root.join("src/nested/deeper/data.bin"), vec![0_u8; 4096]).unwrap();
    for i in 0..20 {
        fs::write(root.join(format!("docs/page{i}.md")), format!("page {i}")).unwrap();
    }
}

/// Every path the visitor saw, sorted
fn reported(visitor: &RecordingVisitor) -> Vec<PathBuf> {
    let mut all = visitor.files();
    all.extend(visitor.directories());
    all.sort();
    all
}

#[rstest]
#[case(1)]
#[case(4)]
#[case(32)]
fn test_matches_walkdir(#[case] limit: usize) {
    let _guard = test_timeout_guard(Duration::from_secs(60));
    let temp = TempDir::new().unwrap();
    create_tree(temp.path());

    let visitor = RecordingVisitor::new();
    let stats = block_on(explore(
        temp.path(),
        &visitor,
        ExploreOptions::default().with_concurrency_limit(limit),
    ))
    .unwrap();

    assert_eq!(reported(&visitor), walkdir_oracle(temp.path(), false));
    assert_eq!(visitor.closed(), visitor.directories());
    assert_eq!(stats.files, 24);
    assert_eq!(stats.directories, 6);
}

#[compio::test]
async fn test_file_metadata_matches_std() {
    let temp = TempDir::new().unwrap();
    create_tree(temp.path());

    let visitor = RecordingVisitor::new();
    Explorer::new(LocalFs)
        .explore(temp.path(), &visitor)
        .await
        .unwrap();

    let data = temp.path().join("src/nested/deeper/data.bin");
    let stats = visitor.stats_of(&data).unwrap();
    assert_eq!(stats.link.kind, EntryKind::File);
    assert_eq!(stats.link.len, fs::metadata(&data).unwrap().len());
    assert_eq!(
        stats.link.modified,
        Some(fs::metadata(&data).unwrap().modified().unwrap())
    );
}

#[compio::test]
async fn test_listing_reaches_visitor() {
    let temp = TempDir::new().unwrap();
    create_tree(temp.path());

    let visitor = RecordingVisitor::new().sorted();
    Explorer::new(LocalFs)
        .explore(temp.path(), &visitor)
        .await
        .unwrap();

    assert_eq!(
        visitor.closed_with(temp.path()).unwrap(),
        vec!["README.md", "docs", "empty", "src"]
    );
    assert_eq!(
        visitor.closed_with(temp.path().join("empty")).unwrap(),
        Vec::<String>::new()
    );
}

#[compio::test]
async fn test_missing_start_is_not_found() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope");

    let visitor = RecordingVisitor::new();
    let err = explore(&missing, &visitor, ExploreOptions::default())
        .await
        .unwrap_err();

    match err {
        ExploreError::Lstat { path, source } => {
            assert_eq!(path, missing);
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(visitor.events().is_empty());
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::symlink;
    use std::os::unix::net::UnixListener;

    fn create_linked_tree(root: &Path) {
        create_tree(root);
        symlink(root.join("src"), root.join("src-link")).unwrap();
        symlink(root.join("README.md"), root.join("readme-link")).unwrap();
        symlink(root.join("does-not-exist"), root.join("dangling")).unwrap();
    }

    #[compio::test]
    async fn test_symlinks_not_followed_match_walkdir() {
        let temp = TempDir::new().unwrap();
        create_linked_tree(temp.path());

        let visitor = RecordingVisitor::new();
        let stats = Explorer::new(LocalFs)
            .with_options(ExploreOptions::default().with_concurrency_limit(8))
            .explore(temp.path(), &visitor)
            .await
            .unwrap();

        assert_eq!(reported(&visitor), walkdir_oracle(temp.path(), false));

        let link = temp.path().join("src-link");
        assert!(visitor.position(&Event::Begin(link.clone())).is_some());
        assert!(visitor.position(&Event::End(link.clone())).is_some());
        assert!(visitor.position(&Event::File(link.join("lib.rs"))).is_none());

        let readme = visitor.stats_of(temp.path().join("readme-link")).unwrap();
        assert!(readme.is_symlink());
        assert_eq!(readme.target.map(|t| t.len), Some(8));

        let dangling = visitor.stats_of(temp.path().join("dangling")).unwrap();
        assert!(dangling.target.is_none());

        assert_eq!(stats.symlinks, 3);
        assert_eq!(stats.broken_symlinks, 1);
    }

    #[compio::test]
    async fn test_symlinks_followed_match_walkdir() {
        let temp = TempDir::new().unwrap();
        create_linked_tree(temp.path());
        fs::remove_file(temp.path().join("dangling")).unwrap();

        let visitor = RecordingVisitor::new();
        Explorer::new(LocalFs)
            .with_options(
                ExploreOptions::default()
                    .with_follow_symlinks(true)
                    .with_concurrency_limit(8),
            )
            .explore(temp.path(), &visitor)
            .await
            .unwrap();

        assert_eq!(reported(&visitor), walkdir_oracle(temp.path(), true));
        assert!(visitor
            .files()
            .contains(&temp.path().join("src-link/nested/deeper/data.bin")));
    }

    #[cfg(target_os = "linux")]
    #[compio::test]
    async fn test_names_that_are_not_utf8_are_explored() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().unwrap();
        let bad = temp.path().join(OsStr::from_bytes(b"bad\xff"));
        fs::write(temp.path().join("ok.txt"), b"ok").unwrap();
        fs::write(&bad, b"bad").unwrap();

        let visitor = RecordingVisitor::new();
        let stats = Explorer::new(LocalFs)
            .explore(temp.path(), &visitor)
            .await
            .unwrap();

        assert_eq!(stats.files, 2);
        assert!(visitor.files().contains(&bad));
        assert!(visitor.files().contains(&temp.path().join("ok.txt")));
        assert_eq!(reported(&visitor), walkdir_oracle(temp.path(), false));
    }

    #[compio::test]
    async fn test_socket_is_not_file_nor_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), b"a").unwrap();
        let socket = temp.path().join("sock");
        let _listener = UnixListener::bind(&socket).unwrap();

        let visitor = RecordingVisitor::new();
        let err = Explorer::new(LocalFs)
            .explore(temp.path(), &visitor)
            .await
            .unwrap_err();

        assert!(matches!(err, ExploreError::NotFileOrDirectory(ref p) if *p == socket));
        assert!(err.to_string().starts_with("not a file nor a directory"));
    }
}
