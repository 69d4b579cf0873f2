use filetidy::actions::{
    execute_grouping, plan_grouping, DuplicatePolicy, GroupConfig, GroupError, GroupingMode,
};
use filetidy::catalog::{keys, ActionKind, ActionOutcome, Catalog};
use filetidy::config::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn setup() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let base = dir.path().canonicalize().unwrap();
    let origin = base.join("origin");
    fs::create_dir_all(&origin).unwrap();
    (dir, origin, base.join("sorted"))
}

fn run(config: &GroupConfig, catalog: &mut Catalog) -> filetidy::actions::GroupResult {
    let plan = plan_grouping(config, catalog).unwrap();
    execute_grouping(&plan, catalog, config).unwrap()
}

#[test]
fn test_group_by_extension_scenario() {
    let (_dir, origin, dest) = setup();
    write(&origin.join("report.pdf"), "report");
    write(&origin.join("notes.pdf"), "notes");
    write(&origin.join("image.png"), "image");

    let mut catalog = Catalog::open_in_memory().unwrap();
    let result = run(&GroupConfig::new(&origin, &dest), &mut catalog);

    assert_eq!(result.copied.len(), 3);
    assert!(dest.join("pdf/report.pdf").is_file());
    assert!(dest.join("pdf/notes.pdf").is_file());
    assert!(dest.join("png/image.png").is_file());
    // Copies, not moves
    assert!(origin.join("report.pdf").is_file());

    let actions = catalog.actions().unwrap();
    assert_eq!(actions.len(), 3);
    assert!(actions.iter().all(|a| a.kind == ActionKind::Copy));
    assert_eq!(
        catalog.get_metadata(keys::LAST_OPERATION).unwrap().as_deref(),
        Some("group")
    );
}

#[test]
fn test_group_by_file_name_and_misc_folder() {
    let (_dir, origin, dest) = setup();
    write(&origin.join("report.pdf"), "pdf");
    write(&origin.join("old/report.docx"), "docx");
    write(&origin.join("Makefile"), "all:");

    let mut catalog = Catalog::open_in_memory().unwrap();
    let config = GroupConfig::new(&origin, &dest).with_mode(GroupingMode::FileName);
    let result = run(&config, &mut catalog);
    assert_eq!(result.copied.len(), 3);
    assert!(dest.join("report/report.pdf").is_file());
    assert!(dest.join("report/report.docx").is_file());
    assert!(dest.join("Makefile/Makefile").is_file());

    let (_dir2, origin2, dest2) = setup();
    write(&origin2.join("Makefile"), "all:");
    write(&origin2.join("a.TXT"), "a");
    let config = GroupConfig::new(&origin2, &dest2).with_mode(GroupingMode::DotExtension);
    run(&config, &mut catalog);
    assert!(dest2.join("Miscellaneous/Makefile").is_file());
    assert!(dest2.join("dot txt/a.TXT").is_file());
}

#[test]
fn test_existing_different_file_gets_numbered_name() {
    let (_dir, origin, dest) = setup();
    write(&origin.join("notes.txt"), "new notes");
    write(&dest.join("txt/notes.txt"), "someone else's notes");

    let mut catalog = Catalog::open_in_memory().unwrap();
    let result = run(&GroupConfig::new(&origin, &dest), &mut catalog);

    assert_eq!(result.copied.len(), 1);
    assert_eq!(
        fs::read_to_string(dest.join("txt/notes.txt")).unwrap(),
        "someone else's notes"
    );
    assert_eq!(
        fs::read_to_string(dest.join("txt/notes (1).txt")).unwrap(),
        "new notes"
    );
}

#[test]
fn test_identical_file_already_present() {
    let (_dir, origin, dest) = setup();
    write(&origin.join("notes.txt"), "same");
    write(&dest.join("txt/notes.txt"), "same");

    let mut catalog = Catalog::open_in_memory().unwrap();
    let result = run(&GroupConfig::new(&origin, &dest), &mut catalog);

    assert!(result.copied.is_empty());
    assert_eq!(result.already_present.len(), 1);
    assert!(!dest.join("txt/notes (1).txt").exists());
}

#[test]
fn test_skip_policy_spans_runs() {
    let (_dir, origin, dest) = setup();
    write(&origin.join("a.txt"), "payload");

    let mut catalog = Catalog::open_in_memory().unwrap();
    let config = GroupConfig::new(&origin, &dest);
    run(&config, &mut catalog);

    // Same content under another name, added after the first run
    write(&origin.join("later/b.txt"), "payload");
    let result = run(&config, &mut catalog);
    assert!(result.copied.is_empty());
    assert_eq!(result.skipped_duplicates.len(), 1);

    let (_dir2, origin2, dest2) = setup();
    write(&origin2.join("a.txt"), "payload");
    write(&origin2.join("b.txt"), "payload");
    let anyway =
        GroupConfig::new(&origin2, &dest2).with_duplicate_policy(DuplicatePolicy::CopyAnyway);
    assert_eq!(run(&anyway, &mut catalog).copied.len(), 2);
}

#[test]
fn test_interrupted_run_resumes_from_work_list() {
    let (_dir, origin, dest) = setup();
    write(&origin.join("a.txt"), "a");
    write(&origin.join("b.txt"), "b");

    let dir = tempdir().unwrap();
    let db = dir.path().join("hashdata.sqlite");

    {
        let mut catalog = Catalog::open(&db).unwrap();
        let stopped = GroupConfig::new(&origin, &dest)
            .with_shutdown_flag(Arc::new(AtomicBool::new(true)));
        let plan = plan_grouping(&stopped, &mut catalog).unwrap();
        let result = execute_grouping(&plan, &mut catalog, &stopped).unwrap();
        assert!(result.interrupted);
    }

    let mut catalog = Catalog::open(&db).unwrap();
    let config = GroupConfig::new(&origin, &dest);
    let plan = plan_grouping(&config, &mut catalog).unwrap();
    assert_eq!(plan.newly_planned, 0);
    assert_eq!(plan.pending_count(), 2);

    let result = execute_grouping(&plan, &mut catalog, &config).unwrap();
    assert_eq!(result.copied.len(), 2);
    assert!(catalog.pending_file_groups(&plan.destination).unwrap().is_empty());
}

#[test]
fn test_overlapping_roots_are_refused() {
    let (_dir, origin, _dest) = setup();
    write(&origin.join("a.txt"), "a");
    let mut catalog = Catalog::open_in_memory().unwrap();

    let same = GroupConfig::new(&origin, &origin);
    assert!(matches!(
        plan_grouping(&same, &mut catalog),
        Err(GroupError::Config(ConfigError::SameDirectory(_)))
    ));

    let inside = GroupConfig::new(&origin, origin.join("sorted"));
    assert!(matches!(
        inside.validate(),
        Err(ConfigError::DestinationInsideOrigin { .. })
    ));

    let outside = GroupConfig::new(&origin, origin.parent().unwrap());
    assert!(matches!(
        outside.validate(),
        Err(ConfigError::OriginInsideDestination { .. })
    ));
    assert_eq!(catalog.entry_count().unwrap(), 0);
}

#[test]
fn test_copy_never_replaces_a_file_named_like_a_temp_file() {
    let (_dir, origin, dest) = setup();
    write(&origin.join("a/x.partial"), "PARTIAL-CONTENT");
    write(&origin.join("b/x"), "X-CONTENT");

    let mut catalog = Catalog::open_in_memory().unwrap();
    let config = GroupConfig::new(&origin, &dest).with_mode(GroupingMode::FileName);
    let result = run(&config, &mut catalog);

    assert_eq!(result.copied.len(), 2);
    assert_eq!(
        fs::read_to_string(dest.join("x/x.partial")).unwrap(),
        "PARTIAL-CONTENT"
    );
    assert_eq!(fs::read_to_string(dest.join("x/x")).unwrap(), "X-CONTENT");
    assert_eq!(fs::read_dir(dest.join("x")).unwrap().count(), 2);
}

#[cfg(unix)]
#[test]
fn test_unreadable_origin_file_fails_alone() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, origin, dest) = setup();
    write(&origin.join("a.txt"), "a");
    write(&origin.join("c.txt"), "c");
    let locked = origin.join("b.txt");
    write(&locked, "b");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Permission bits do not apply to root
    if fs::read(&locked).is_ok() {
        return;
    }

    let mut catalog = Catalog::open_in_memory().unwrap();
    let config = GroupConfig::new(&origin, &dest);
    let result = run(&config, &mut catalog);

    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].0, locked);
    assert_eq!(result.copied.len(), 2);
    assert!(dest.join("txt/a.txt").is_file());
    assert!(dest.join("txt/c.txt").is_file());
    assert!(!dest.join("txt/b.txt").exists());
    assert!(result.summary().contains("1 failed"));

    let failed: Vec<_> = catalog
        .actions()
        .unwrap()
        .into_iter()
        .filter(|a| a.outcome == ActionOutcome::Failed)
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, locked);

    // The failed row stays on the work list and succeeds once readable
    let destination = dest.canonicalize().unwrap();
    assert_eq!(catalog.pending_file_groups(&destination).unwrap().len(), 1);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    let retry = run(&config, &mut catalog);
    assert_eq!(retry.copied.len(), 1);
    assert_eq!(fs::read_to_string(dest.join("txt/b.txt")).unwrap(), "b");
}

#[cfg(unix)]
#[test]
fn test_unreadable_existing_target_gets_numbered_copy() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, origin, dest) = setup();
    write(&origin.join("notes.txt"), "notes");
    let existing = dest.join("txt/notes.txt");
    write(&existing, "notes");
    fs::set_permissions(&existing, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::read(&existing).is_ok() {
        return;
    }

    let mut catalog = Catalog::open_in_memory().unwrap();
    let result = run(&GroupConfig::new(&origin, &dest), &mut catalog);
    fs::set_permissions(&existing, fs::Permissions::from_mode(0o644)).unwrap();

    // Content that cannot be read is never assumed identical
    assert!(result.already_present.is_empty());
    assert_eq!(result.copied.len(), 1);
    assert_eq!(
        fs::read_to_string(dest.join("txt/notes (1).txt")).unwrap(),
        "notes"
    );
}
