use filetidy::catalog::{
    keys, ActionKind, ActionOutcome, ActionRecord, Catalog, CatalogError, NewEntry, NewFileGroup,
    UpsertOutcome, SCHEMA_VERSION,
};
use filetidy::scanner::Digest;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn entry(path: &str, byte: u8) -> NewEntry {
    NewEntry::new(
        path,
        Digest::from_bytes([byte; 32]),
        u64::from(byte),
        SystemTime::UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789),
    )
}

#[test]
fn test_rows_persist_across_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested/dir/hashdata.sqlite");

    {
        let mut catalog = Catalog::open(&db).unwrap();
        catalog.upsert(&entry("/data/a.txt", 1)).unwrap();
        catalog.set_metadata(keys::LAST_ROOT, "/data").unwrap();
        catalog
            .record_action(&ActionRecord::new(
                ActionKind::Delete,
                Path::new("/data/b.txt"),
                ActionOutcome::Success,
            ))
            .unwrap();
    }

    let catalog = Catalog::open(&db).unwrap();
    assert_eq!(catalog.path(), Some(db.as_path()));
    let stored = catalog.lookup(Path::new("/data/a.txt")).unwrap().unwrap();
    assert_eq!(stored.digest, Digest::from_bytes([1; 32]));
    assert_eq!(
        stored.modified,
        SystemTime::UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789)
    );
    assert_eq!(
        catalog.get_metadata(keys::LAST_ROOT).unwrap().as_deref(),
        Some("/data")
    );
    assert_eq!(catalog.actions().unwrap().len(), 1);
}

#[test]
fn test_newer_schema_is_rejected() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("future.sqlite");
    {
        let conn = rusqlite::Connection::open(&db).unwrap();
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1))
            .unwrap();
    }

    let err = Catalog::open(&db).unwrap_err();
    assert!(matches!(err, CatalogError::UnsupportedSchema { .. }));
}

#[test]
fn test_upsert_revives_deleted_entry_with_same_seq() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    assert_eq!(
        catalog.upsert(&entry("/x", 1)).unwrap(),
        UpsertOutcome::Inserted
    );
    let seq = catalog.lookup(Path::new("/x")).unwrap().unwrap().seq;

    assert!(catalog.mark_deleted(Path::new("/x")).unwrap());
    assert_eq!(catalog.live_entry_count().unwrap(), 0);
    assert_eq!(catalog.entry_count().unwrap(), 1);

    assert_eq!(
        catalog.upsert(&entry("/x", 2)).unwrap(),
        UpsertOutcome::Updated
    );
    let revived = catalog.lookup(Path::new("/x")).unwrap().unwrap();
    assert_eq!(revived.seq, seq);
    assert!(!revived.deleted);
    assert_eq!(catalog.live_entry_count().unwrap(), 1);
}

#[test]
fn test_grouped_by_digest_skips_deleted() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_batch(&[entry("/a", 7), entry("/b", 7), entry("/c", 8)])
        .unwrap();
    catalog.mark_deleted(Path::new("/b")).unwrap();

    let groups = catalog.entries_grouped_by_digest().unwrap();
    let sevens = &groups[&Digest::from_bytes([7; 32])];
    assert_eq!(sevens.len(), 1);
    assert_eq!(sevens[0].path, PathBuf::from("/a"));
}

#[test]
fn test_mark_duplicates_replaces_previous_flags() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_batch(&[entry("/a", 1), entry("/b", 1), entry("/c", 1)])
        .unwrap();
    let seqs: Vec<i64> = catalog.all_entries().unwrap().iter().map(|e| e.seq).collect();

    assert_eq!(catalog.mark_duplicates([seqs[1], seqs[2]]).unwrap(), 2);
    assert_eq!(catalog.mark_duplicates([seqs[2]]).unwrap(), 1);

    let flags: Vec<bool> = catalog
        .all_entries()
        .unwrap()
        .iter()
        .map(|e| e.duplicate)
        .collect();
    assert_eq!(flags, vec![false, false, true]);
}

#[test]
fn test_file_group_work_list() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    let dest = Path::new("/dest");
    let planned = |name: &str| NewFileGroup {
        origin_path: PathBuf::from(format!("/origin/{name}")),
        destination_root: dest.to_path_buf(),
        destination_path: PathBuf::from(format!("/dest/txt/{name}")),
        file_name: name.to_string(),
        group_key: "txt".to_string(),
    };

    assert_eq!(
        catalog
            .insert_file_groups(&[planned("a.txt"), planned("b.txt")])
            .unwrap(),
        2
    );
    // Replanning the same origin adds nothing
    assert_eq!(catalog.insert_file_groups(&[planned("a.txt")]).unwrap(), 0);

    let rows = catalog.file_groups(dest).unwrap();
    assert_eq!(rows.len(), 2);

    let digest = Digest::from_bytes([3; 32]);
    catalog
        .mark_file_group_copied(rows[0].id, &digest, Path::new("/dest/txt/a.txt"))
        .unwrap();
    catalog
        .mark_file_group_duplicate(rows[1].id, &digest)
        .unwrap();

    assert!(catalog.pending_file_groups(dest).unwrap().is_empty());
    assert!(catalog.copied_digests(dest).unwrap().contains(&digest));
    assert!(catalog.copied_digests(Path::new("/other")).unwrap().is_empty());
}

#[test]
fn test_clear_restarts_numbering() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    catalog.upsert_batch(&[entry("/a", 1), entry("/b", 2)]).unwrap();
    catalog.set_metadata(keys::LAST_OPERATION, "scan").unwrap();

    catalog.clear().unwrap();
    assert_eq!(catalog.entry_count().unwrap(), 0);
    assert!(catalog.get_metadata(keys::LAST_OPERATION).unwrap().is_none());

    catalog.upsert(&entry("/c", 3)).unwrap();
    assert_eq!(catalog.all_entries().unwrap()[0].seq, 1);
}

#[test]
fn test_action_log_keeps_reasons_in_order() {
    let mut catalog = Catalog::open_in_memory().unwrap();
    catalog
        .record_action(
            &ActionRecord::new(ActionKind::Copy, Path::new("/o/a.pdf"), ActionOutcome::Success)
                .with_destination(Path::new("/d/pdf/a.pdf")),
        )
        .unwrap();
    catalog
        .record_action(
            &ActionRecord::new(ActionKind::Delete, Path::new("/o/b"), ActionOutcome::Failed)
                .with_reason("permission denied"),
        )
        .unwrap();

    let actions = catalog.actions().unwrap();
    assert_eq!(actions[0].kind, ActionKind::Copy);
    assert_eq!(
        actions[0].destination.as_deref(),
        Some(Path::new("/d/pdf/a.pdf"))
    );
    assert_eq!(actions[1].outcome, ActionOutcome::Failed);
    assert_eq!(actions[1].reason.as_deref(), Some("permission denied"));
}
