use filetidy::catalog::Catalog;
use filetidy::duplicates::compute_duplicates;
use filetidy::scanner::{Scanner, ScannerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn scan(roots: &[&Path], catalog: &mut Catalog) {
    let scanner = Scanner::new(ScannerConfig::default());
    for root in roots {
        scanner.scan(root, catalog).unwrap();
    }
}

#[test]
fn test_first_found_copy_is_canonical() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root.join("a.txt"), "hello");
    write(&root.join("b/a.txt"), "hello");
    write(&root.join("c.txt"), "different");

    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&[&root], &mut catalog);

    let report = compute_duplicates(&catalog).unwrap();
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.duplicate_count, 1);
    assert_eq!(report.wasted_space, 5);
    assert_eq!(report.total_entries, 3);

    let group = &report.groups[0];
    assert_eq!(group.canonical().path, root.join("a.txt"));
    assert_eq!(group.duplicates()[0].path, root.join("b/a.txt"));
}

#[test]
fn test_canonical_follows_root_order_across_scans() {
    let dir = tempdir().unwrap();
    let base = dir.path().canonicalize().unwrap();
    let second = base.join("second");
    let first = base.join("first");
    write(&second.join("z.bin"), "payload");
    write(&first.join("a.bin"), "payload");

    // "second" is scanned first, so its copy wins despite sorting later
    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&[&second, &first], &mut catalog);

    let report = compute_duplicates(&catalog).unwrap();
    assert_eq!(report.groups[0].canonical().path, second.join("z.bin"));
}

#[test]
fn test_groups_ordered_by_canonical_seq() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root.join("1.txt"), "one");
    write(&root.join("2.txt"), "two");
    write(&root.join("3.txt"), "one");
    write(&root.join("4.txt"), "two");
    write(&root.join("5.txt"), "two");

    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&[&root], &mut catalog);

    let report = compute_duplicates(&catalog).unwrap();
    let canonicals: Vec<PathBuf> = report
        .groups
        .iter()
        .map(|g| g.canonical().path.clone())
        .collect();
    assert_eq!(canonicals, vec![root.join("1.txt"), root.join("2.txt")]);
    assert_eq!(report.groups[1].len(), 3);
    assert_eq!(report.duplicate_count, 3);
}

#[test]
fn test_marking_is_idempotent() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a"), "x");
    write(&dir.path().join("b"), "x");
    write(&dir.path().join("c"), "y");

    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&[dir.path()], &mut catalog);

    let report = compute_duplicates(&catalog).unwrap();
    assert_eq!(report.mark(&mut catalog).unwrap(), 1);
    let first: Vec<bool> = catalog
        .all_entries()
        .unwrap()
        .iter()
        .map(|e| e.duplicate)
        .collect();

    let report = compute_duplicates(&catalog).unwrap();
    report.mark(&mut catalog).unwrap();
    let second: Vec<bool> = catalog
        .all_entries()
        .unwrap()
        .iter()
        .map(|e| e.duplicate)
        .collect();

    assert_eq!(first, vec![false, true, false]);
    assert_eq!(first, second);
}

#[test]
fn test_deleted_entries_leave_groups() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a"), "same");
    write(&dir.path().join("b"), "same");

    let mut catalog = Catalog::open_in_memory().unwrap();
    scan(&[dir.path()], &mut catalog);

    let b = catalog.all_entries().unwrap()[1].path.clone();
    catalog.mark_deleted(&b).unwrap();

    let report = compute_duplicates(&catalog).unwrap();
    assert!(report.is_empty());
    assert_eq!(report.total_entries, 1);
}

#[test]
fn test_empty_catalog_has_no_duplicates() {
    let catalog = Catalog::open_in_memory().unwrap();
    let report = compute_duplicates(&catalog).unwrap();
    assert!(report.is_empty());
    assert_eq!(report.wasted_space, 0);
}
