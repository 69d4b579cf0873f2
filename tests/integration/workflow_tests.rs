use clap::Parser;
use filetidy::actions::{DeleteConfig, DeletePlan, GroupConfig};
use filetidy::catalog::{keys, Catalog};
use filetidy::cli::Cli;
use filetidy::config::ConfigError;
use filetidy::error::ExitCode;
use filetidy::scanner::Scanner;
use filetidy::workflow::{Phase, Workflow, WorkflowError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// A tree with one duplicate pair and the catalog path next to it.
fn setup() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().unwrap();
    let base = dir.path().canonicalize().unwrap();
    let root = base.join("tree");
    write(&root.join("a.txt"), "hello");
    write(&root.join("b/a.txt"), "hello");
    write(&root.join("c.txt"), "unique");
    (dir, root, base.join("hashdata.sqlite"))
}

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let cli = Cli::try_parse_from(std::iter::once("filetidy").chain(args.iter().copied()))
        .unwrap();
    filetidy::run_app(cli)
}

#[test]
fn test_session_resumes_from_catalog_file() {
    let (_dir, root, db) = setup();

    {
        let mut workflow = Workflow::new(Catalog::open(&db).unwrap()).unwrap();
        workflow.scan(&Scanner::default(), &[root.clone()]).unwrap();
        assert_eq!(workflow.phase(), Phase::Ready);
    }

    // A later process picks up where the scan left off
    let mut workflow = Workflow::from_existing(Catalog::open(&db).unwrap()).unwrap();
    assert_eq!(workflow.phase(), Phase::Ready);

    let plan = DeletePlan::from_report(workflow.resolve(true).unwrap());
    let result = workflow.delete(&plan, &DeleteConfig::default()).unwrap();
    assert_eq!(result.success_count(), 1);
    assert_eq!(workflow.phase(), Phase::Idle);
    assert_eq!(
        workflow
            .catalog()
            .get_metadata(keys::OPERATION_STATE)
            .unwrap()
            .as_deref(),
        Some("idle")
    );
}

#[test]
fn test_crash_while_executing_resumes_ready() {
    let (_dir, root, db) = setup();
    {
        let mut workflow = Workflow::new(Catalog::open(&db).unwrap()).unwrap();
        workflow.scan(&Scanner::default(), &[root]).unwrap();
        let mut catalog = workflow.into_catalog();
        catalog
            .set_metadata(keys::OPERATION_STATE, "executing")
            .unwrap();
    }

    let workflow = Workflow::from_existing(Catalog::open(&db).unwrap()).unwrap();
    assert_eq!(workflow.phase(), Phase::Ready);
}

#[test]
fn test_group_requires_ready() {
    let (_dir, root, _db) = setup();
    let dest = root.parent().unwrap().join("sorted");
    let config = GroupConfig::new(&root, &dest);

    let mut workflow = Workflow::new(Catalog::open_in_memory().unwrap()).unwrap();
    assert!(matches!(
        workflow.plan_group(&config),
        Err(WorkflowError::InvalidTransition {
            from: Phase::Idle,
            ..
        })
    ));

    workflow.scan(&Scanner::default(), &[root.clone()]).unwrap();
    let plan = workflow.plan_group(&config).unwrap();
    let result = workflow.group(&plan, &config).unwrap();

    // Same content twice; only the first copy lands in the destination
    assert_eq!(result.copied.len(), 2);
    assert_eq!(result.skipped_duplicates.len(), 1);
    assert_eq!(workflow.phase(), Phase::Idle);
    assert!(dest.join("txt/a.txt").is_file());
    assert!(dest.join("txt/c.txt").is_file());
}

#[test]
fn test_cli_scan_duplicates_delete_cycle() {
    let (_dir, root, db) = setup();
    let db = db.to_str().unwrap();
    let root_arg = root.to_str().unwrap();

    assert_eq!(
        run(&["-q", "--db", db, "scan", root_arg]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(
        run(&["-q", "--db", db, "duplicates", "--output", "json"]).unwrap(),
        ExitCode::Success
    );
    assert_eq!(
        run(&["-q", "--db", db, "delete", "--dry-run"]).unwrap(),
        ExitCode::Success
    );
    assert!(root.join("b/a.txt").exists());

    assert_eq!(
        run(&["-q", "--db", db, "delete", "--yes"]).unwrap(),
        ExitCode::Success
    );
    assert!(root.join("a.txt").exists());
    assert!(!root.join("b/a.txt").exists());

    assert_eq!(
        run(&["-q", "--db", db, "duplicates"]).unwrap(),
        ExitCode::NoDuplicates
    );
    assert_eq!(
        run(&["-q", "--db", db, "status", "--output", "json"]).unwrap(),
        ExitCode::Success
    );

    assert_eq!(
        run(&["-q", "--db", db, "clear", "--yes"]).unwrap(),
        ExitCode::Success
    );
    assert!(run(&["-q", "--db", db, "duplicates"]).is_err());
}

#[test]
fn test_cli_group_copies_by_extension() {
    let dir = tempdir().unwrap();
    let base = dir.path().canonicalize().unwrap();
    let origin = base.join("in");
    let dest = base.join("out");
    write(&origin.join("report.pdf"), "report");
    write(&origin.join("notes.pdf"), "notes");
    write(&origin.join("image.png"), "image");
    let db = base.join("hashdata.sqlite");

    let code = run(&[
        "-q",
        "--db",
        db.to_str().unwrap(),
        "group",
        origin.to_str().unwrap(),
        dest.to_str().unwrap(),
        "--mode",
        "extension",
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(dest.join("pdf/report.pdf").is_file());
    assert!(dest.join("pdf/notes.pdf").is_file());
    assert!(dest.join("png/image.png").is_file());
}

#[test]
fn test_cli_group_refuses_nested_destination() {
    let (_dir, root, db) = setup();
    let err = run(&[
        "-q",
        "--db",
        db.to_str().unwrap(),
        "group",
        root.to_str().unwrap(),
        root.join("sorted").to_str().unwrap(),
    ])
    .unwrap_err();

    assert!(err.downcast_ref::<ConfigError>().is_some());
    // Refused before the catalog was created
    assert!(!db.exists());
}

#[test]
fn test_cli_missing_root_fails() {
    let (_dir, root, db) = setup();
    let result = run(&[
        "-q",
        "--db",
        db.to_str().unwrap(),
        "scan",
        root.join("missing").to_str().unwrap(),
    ]);
    assert!(result.is_err());
}
