use filetidy::actions::{execute_delete, DeleteConfig, DeletePlan};
use filetidy::catalog::{keys, ActionKind, ActionOutcome, Catalog};
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

/// a.txt and b/a.txt share content, c.txt is unique.
fn scanned_tree() -> (tempfile::TempDir, PathBuf, Catalog) {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root.join("a.txt"), "hello");
    write(&root.join("b/a.txt"), "hello");
    write(&root.join("c.txt"), "unique");

    let mut catalog = Catalog::open_in_memory().unwrap();
    Scanner::new(ScannerConfig::default())
        .scan(&root, &mut catalog)
        .unwrap();
    (dir, root, catalog)
}

fn plan(catalog: &Catalog) -> DeletePlan {
    DeletePlan::from_report(&compute_duplicates(catalog).unwrap())
}

#[test]
fn test_delete_keeps_first_found_copy() {
    let (_dir, root, mut catalog) = scanned_tree();

    let plan = plan(&catalog);
    assert_eq!(plan.len(), 1);
    assert_eq!(plan.items[0].path, root.join("b/a.txt"));

    let result = execute_delete(&plan, &mut catalog, &DeleteConfig::default()).unwrap();
    assert_eq!(result.success_count(), 1);
    assert_eq!(result.bytes_freed, 5);
    assert!(result.all_succeeded());

    assert!(root.join("a.txt").exists());
    assert!(!root.join("b/a.txt").exists());
    assert!(root.join("c.txt").exists());

    let entry = catalog.lookup(&root.join("b/a.txt")).unwrap().unwrap();
    assert!(entry.deleted);

    let actions = catalog.actions().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].kind, ActionKind::Delete);
    assert_eq!(actions[0].outcome, ActionOutcome::Success);
    assert_eq!(
        catalog.get_metadata(keys::LAST_OPERATION).unwrap().as_deref(),
        Some("delete")
    );
}

#[test]
fn test_rescan_after_delete_finds_nothing_new() {
    let (_dir, root, mut catalog) = scanned_tree();
    execute_delete(&plan(&catalog), &mut catalog, &DeleteConfig::default()).unwrap();

    let stats = Scanner::new(ScannerConfig::default())
        .scan(&root, &mut catalog)
        .unwrap();
    assert_eq!(stats.files_seen, 2);
    assert_eq!(stats.hashed(), 0);
    assert!(compute_duplicates(&catalog).unwrap().is_empty());
}

#[test]
fn test_dry_run_changes_nothing() {
    let (_dir, root, mut catalog) = scanned_tree();

    let config = DeleteConfig::default().with_dry_run(true);
    let result = execute_delete(&plan(&catalog), &mut catalog, &config).unwrap();

    assert!(result.dry_run);
    assert_eq!(result.success_count(), 1);
    assert!(result.summary().contains("would delete"));
    assert!(root.join("b/a.txt").exists());
    assert!(catalog.actions().unwrap().is_empty());
    assert!(!catalog.lookup(&root.join("b/a.txt")).unwrap().unwrap().deleted);
}

#[test]
fn test_modified_copy_is_skipped() {
    let (_dir, root, mut catalog) = scanned_tree();
    let plan = plan(&catalog);

    write(&root.join("b/a.txt"), "edited since the scan");

    let result = execute_delete(&plan, &mut catalog, &DeleteConfig::default()).unwrap();
    assert_eq!(result.skipped_count(), 1);
    assert!(root.join("b/a.txt").exists());
    assert_eq!(catalog.actions().unwrap()[0].outcome, ActionOutcome::Skipped);
}

#[test]
fn test_missing_canonical_protects_duplicates() {
    let (_dir, root, mut catalog) = scanned_tree();
    let plan = plan(&catalog);

    fs::remove_file(root.join("a.txt")).unwrap();

    let result = execute_delete(&plan, &mut catalog, &DeleteConfig::default()).unwrap();
    assert_eq!(result.success_count(), 0);
    assert_eq!(result.skipped_count(), 1);
    assert!(root.join("b/a.txt").exists());
}

#[test]
fn test_rerun_after_partial_delete_only_retries_remaining() {
    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    for name in ["a", "b", "c", "d"] {
        write(&root.join(name), "same");
    }
    let mut catalog = Catalog::open_in_memory().unwrap();
    Scanner::new(ScannerConfig::default())
        .scan(&root, &mut catalog)
        .unwrap();

    let full = plan(&catalog);
    assert_eq!(full.len(), 3);

    // Someone else removed one copy before the run
    fs::remove_file(root.join("c")).unwrap();
    let result = execute_delete(&full, &mut catalog, &DeleteConfig::default()).unwrap();
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.skipped_count(), 1);

    assert!(plan(&catalog).is_empty());
    assert!(root.join("a").exists());
    assert_eq!(catalog.live_entry_count().unwrap(), 1);
}

#[test]
fn test_changed_canonical_protects_duplicates() {
    let (_dir, root, mut catalog) = scanned_tree();
    let plan = plan(&catalog);

    // The kept copy no longer holds the shared content
    write(&root.join("a.txt"), "rewritten after the scan");

    for config in [
        DeleteConfig::default(),
        DeleteConfig::default().with_verify(false),
    ] {
        let result = execute_delete(&plan, &mut catalog, &config).unwrap();
        assert_eq!(result.success_count(), 0);
        assert_eq!(result.skipped_count(), 1);
        assert!(result.skipped[0].1.contains("canonical copy changed"));
    }

    assert_eq!(fs::read_to_string(root.join("b/a.txt")).unwrap(), "hello");
    assert!(!catalog.lookup(&root.join("b/a.txt")).unwrap().unwrap().deleted);
    assert!(catalog
        .actions()
        .unwrap()
        .iter()
        .all(|a| a.outcome == ActionOutcome::Skipped));
}

#[cfg(unix)]
#[test]
fn test_one_failed_delete_does_not_stop_the_batch() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    write(&root.join("a.txt"), "same");
    write(&root.join("b/a.txt"), "same");
    write(&root.join("c/a.txt"), "same");

    let mut catalog = Catalog::open_in_memory().unwrap();
    Scanner::new(ScannerConfig::default())
        .scan(&root, &mut catalog)
        .unwrap();
    let plan = plan(&catalog);
    assert_eq!(plan.len(), 2);

    let locked = root.join("b");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

    // Permission bits do not apply to root
    let canary = locked.join("canary");
    if fs::write(&canary, "x").is_ok() {
        fs::remove_file(&canary).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = execute_delete(&plan, &mut catalog, &DeleteConfig::default()).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.failures[0].0, root.join("b/a.txt"));
    assert_eq!(result.success_count(), 1);
    assert!(root.join("a.txt").exists());
    assert!(root.join("b/a.txt").exists());
    assert!(!root.join("c/a.txt").exists());

    let actions = catalog.actions().unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].outcome, ActionOutcome::Failed);
    assert!(actions[0].reason.is_some());
    assert_eq!(actions[1].outcome, ActionOutcome::Success);
    assert!(!catalog.lookup(&root.join("b/a.txt")).unwrap().unwrap().deleted);
}
