use filetidy::catalog::Catalog;
use filetidy::scanner::{ScanError, Scanner, ScannerConfig, ScannerError, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn scanner() -> Scanner {
    Scanner::new(ScannerConfig::default().with_io_threads(2))
}

fn paths(catalog: &Catalog) -> Vec<PathBuf> {
    catalog
        .all_entries()
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect()
}

#[test]
fn test_scan_assigns_seq_in_walk_order() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root.join("a.txt"), "same");
    write(&root.join("b/a.txt"), "same");
    write(&root.join("c.txt"), "other");

    let mut catalog = Catalog::open_in_memory().unwrap();
    let stats = scanner().scan(&root, &mut catalog).unwrap();

    assert_eq!(stats.files_seen, 3);
    assert_eq!(stats.inserted, 3);
    assert_eq!(stats.failed(), 0);
    assert!(!stats.interrupted);

    let entries = catalog.all_entries().unwrap();
    assert_eq!(
        paths(&catalog),
        vec![root.join("a.txt"), root.join("b/a.txt"), root.join("c.txt")]
    );
    assert!(entries[0].seq < entries[1].seq);
    assert!(entries[1].seq < entries[2].seq);
    assert_eq!(entries[0].digest, entries[1].digest);
    assert_ne!(entries[0].digest, entries[2].digest);
}

#[test]
fn test_rescan_unchanged_tree_is_idempotent() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("one.txt"), "1");
    write(&dir.path().join("sub/two.txt"), "2");

    let mut catalog = Catalog::open_in_memory().unwrap();
    scanner().scan(dir.path(), &mut catalog).unwrap();
    let before = catalog.all_entries().unwrap();

    let stats = scanner().scan(dir.path(), &mut catalog).unwrap();
    assert_eq!(stats.unchanged, 2);
    assert_eq!(stats.hashed(), 0);
    assert_eq!(stats.bytes_hashed, 0);

    let after = catalog.all_entries().unwrap();
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.seq, a.seq);
        assert_eq!(b.digest, a.digest);
    }
}

#[test]
fn test_changed_file_is_rehashed_in_place() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("doc.txt");
    write(&file, "first");

    let mut catalog = Catalog::open_in_memory().unwrap();
    scanner().scan(dir.path(), &mut catalog).unwrap();
    let original = catalog.all_entries().unwrap().remove(0);

    write(&file, "second, longer");
    let stats = scanner().scan(dir.path(), &mut catalog).unwrap();
    assert_eq!(stats.updated, 1);

    let updated = catalog.all_entries().unwrap().remove(0);
    assert_eq!(updated.seq, original.seq);
    assert_ne!(updated.digest, original.digest);
    assert_eq!(updated.size, 14);
}

#[test]
fn test_no_refresh_leaves_stale_entry() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("doc.txt");
    write(&file, "first");

    let mut catalog = Catalog::open_in_memory().unwrap();
    scanner().scan(dir.path(), &mut catalog).unwrap();
    let original = catalog.all_entries().unwrap().remove(0);

    write(&file, "changed content");
    let stale = Scanner::new(ScannerConfig::default().with_refresh_changed(false));
    let stats = stale.scan(dir.path(), &mut catalog).unwrap();
    assert_eq!(stats.stale_skipped, 1);
    assert_eq!(catalog.all_entries().unwrap()[0].digest, original.digest);
}

#[test]
fn test_same_size_different_mtime_is_rehashed() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("doc.txt");
    write(&file, "aaaa");

    let mut catalog = Catalog::open_in_memory().unwrap();
    scanner().scan(dir.path(), &mut catalog).unwrap();

    write(&file, "bbbb");
    let later = SystemTime::now() + Duration::from_secs(60);
    filetime::set_file_mtime(&file, filetime::FileTime::from_system_time(later)).unwrap();

    let stats = scanner().scan(dir.path(), &mut catalog).unwrap();
    assert_eq!(stats.updated, 1);
}

#[test]
fn test_empty_files_are_cataloged() {
    let dir = tempdir().unwrap();
    fs::File::create(dir.path().join("empty1")).unwrap();
    fs::File::create(dir.path().join("empty2")).unwrap();

    let mut catalog = Catalog::open_in_memory().unwrap();
    let stats = scanner().scan(dir.path(), &mut catalog).unwrap();
    assert_eq!(stats.inserted, 2);

    let entries = catalog.all_entries().unwrap();
    assert_eq!(entries[0].size, 0);
    assert_eq!(entries[0].digest, entries[1].digest);
}

#[test]
fn test_missing_root_is_an_error() {
    let dir = tempdir().unwrap();
    let mut catalog = Catalog::open_in_memory().unwrap();

    let err = scanner()
        .scan(&dir.path().join("missing"), &mut catalog)
        .unwrap_err();
    assert!(matches!(err, ScannerError::Scan(ScanError::NotFound(_))));
    assert_eq!(catalog.entry_count().unwrap(), 0);
}

#[test]
fn test_file_root_is_an_error() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("file.txt");
    write(&file, "x");
    let mut catalog = Catalog::open_in_memory().unwrap();

    let err = scanner().scan(&file, &mut catalog).unwrap_err();
    assert!(matches!(err, ScannerError::Scan(ScanError::NotADirectory(_))));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_counts_as_one_failure() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(&dir.path().join("ok.txt"), "fine");
    let locked = dir.path().join("locked.txt");
    write(&locked, "secret");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not apply to root
    if fs::read(&locked).is_ok() {
        return;
    }

    let mut catalog = Catalog::open_in_memory().unwrap();
    let stats = scanner().scan(dir.path(), &mut catalog).unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(stats.failed(), 1);
    assert!(stats.failures[0].path.ends_with("locked.txt"));
    assert_eq!(stats.inserted, 1);
    assert_eq!(catalog.entry_count().unwrap(), 1);
}

#[test]
fn test_filters_limit_what_is_cataloged() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("small.txt"), "x");
    write(&dir.path().join("large.txt"), &"x".repeat(100));
    write(&dir.path().join("skip.log"), &"x".repeat(100));
    write(&dir.path().join(".git/objects/blob"), &"x".repeat(100));

    let walker = WalkerConfig::default()
        .with_min_size(Some(10))
        .with_ignore_patterns(vec!["*.log".to_string()]);
    let scanner = Scanner::new(ScannerConfig::default().with_walker(walker));

    let mut catalog = Catalog::open_in_memory().unwrap();
    scanner.scan(dir.path(), &mut catalog).unwrap();

    let names: Vec<_> = paths(&catalog)
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["large.txt"]);
}

#[test]
fn test_cancelled_scan_reports_interrupted() {
    let dir = tempdir().unwrap();
    for i in 0..5 {
        write(&dir.path().join(format!("f{i}.txt")), &i.to_string());
    }

    let flag = Arc::new(AtomicBool::new(true));
    let scanner = Scanner::new(ScannerConfig::default().with_shutdown_flag(flag));
    let mut catalog = Catalog::open_in_memory().unwrap();

    let stats = scanner.scan(dir.path(), &mut catalog).unwrap();
    assert!(stats.interrupted);
    assert!(catalog
        .get_metadata(filetidy::catalog::keys::LAST_COMPLETED_AT)
        .unwrap()
        .is_none());
}

#[test]
fn test_catalog_survives_reopen() {
    let dir = tempdir().unwrap();
    let tree = dir.path().join("tree");
    write(&tree.join("a.txt"), "a");
    let db = dir.path().join("hashdata.sqlite");

    {
        let mut catalog = Catalog::open(&db).unwrap();
        scanner().scan(&tree, &mut catalog).unwrap();
    }

    let mut catalog = Catalog::open(&db).unwrap();
    assert_eq!(catalog.entry_count().unwrap(), 1);
    let stats = scanner().scan(&tree, &mut catalog).unwrap();
    assert_eq!(stats.unchanged, 1);
}
