//! SQLite-backed catalog.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::entry::{
    parts_to_time, time_to_parts, ActionKind, ActionOutcome, ActionRecord, CatalogEntry,
    FileGroupRecord, NewEntry, NewFileGroup, UpsertOutcome,
};
use crate::scanner::Digest;

/// Current on-disk schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entries (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    path         TEXT    NOT NULL UNIQUE,
    digest       TEXT    NOT NULL,
    size         INTEGER NOT NULL,
    mtime_secs   INTEGER NOT NULL,
    mtime_nanos  INTEGER NOT NULL,
    scanned_at   TEXT    NOT NULL,
    duplicate    INTEGER NOT NULL DEFAULT 0,
    deleted      INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_entries_digest ON entries(digest);

CREATE TABLE IF NOT EXISTS actions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    kind         TEXT    NOT NULL,
    path         TEXT    NOT NULL,
    destination  TEXT,
    outcome      TEXT    NOT NULL,
    reason       TEXT,
    recorded_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS file_groups (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    origin_path      TEXT    NOT NULL,
    destination_root TEXT    NOT NULL,
    destination_path TEXT    NOT NULL,
    file_name        TEXT    NOT NULL,
    group_key        TEXT    NOT NULL,
    digest           TEXT,
    copied           INTEGER NOT NULL DEFAULT 0,
    duplicate        INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT    NOT NULL,
    UNIQUE (origin_path, destination_root)
);

CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const ENTRY_COLUMNS: &str =
    "seq, path, digest, size, mtime_secs, mtime_nanos, scanned_at, duplicate, deleted";

const FILE_GROUP_COLUMNS: &str = "id, origin_path, destination_root, destination_path, \
     file_name, group_key, digest, copied, duplicate, created_at";

/// Errors from the catalog. Always fatal to the running operation.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The database file could not be opened or created.
    #[error("Failed to open catalog at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The directory that should hold the database could not be created.
    #[error("Failed to create catalog directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A read or write against the database failed.
    #[error("Catalog database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The file was written by a newer version of filetidy.
    #[error("Catalog schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i64, supported: i64 },

    /// A stored row could not be decoded, or a value cannot be stored.
    #[error("Corrupt catalog entry for {path}: {reason}")]
    CorruptEntry { path: String, reason: String },
}

/// Result alias for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Persistent record of hashed files, actions and grouping work.
///
/// Owned by exactly one workflow at a time; there is no process-wide
/// instance.
pub struct Catalog {
    conn: Connection,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").field("path", &self.path).finish()
    }
}

impl Catalog {
    /// Open the catalog at `path`, creating the file (and its parent
    /// directories) if missing. Existing rows are preserved.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Open`] if SQLite cannot open the file,
    /// [`CatalogError::UnsupportedSchema`] for a newer schema.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| CatalogError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|source| CatalogError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        catalog.initialize()?;
        log::debug!("Opened catalog at {}", path.display());
        Ok(catalog)
    }

    /// Open a throwaway in-memory catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> CatalogResult<Self> {
        let conn = Connection::open_in_memory()?;
        let catalog = Self { conn, path: None };
        catalog.initialize()?;
        Ok(catalog)
    }

    /// Location of the database file, `None` when in memory.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(&self) -> CatalogResult<()> {
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;

        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(CatalogError::UnsupportedSchema {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }

        self.conn.execute_batch(SCHEMA)?;
        if version < SCHEMA_VERSION {
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
            log::debug!("Catalog schema initialized (version {})", SCHEMA_VERSION);
        }
        Ok(())
    }

    // ── Entries ──────────────────────────────────────────────────

    /// Insert or overwrite the entry for `entry.path`.
    ///
    /// An overwrite keeps the original `seq` and clears the `duplicate` and
    /// `deleted` flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert(&mut self, entry: &NewEntry) -> CatalogResult<UpsertOutcome> {
        upsert_on(&self.conn, entry)
    }

    /// Write many entries in a single transaction, in slice order.
    ///
    /// Either every entry is written or none is.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; the transaction is rolled back.
    pub fn upsert_batch(&mut self, entries: &[NewEntry]) -> CatalogResult<Vec<UpsertOutcome>> {
        let tx = self.conn.transaction()?;
        let mut outcomes = Vec::with_capacity(entries.len());
        for entry in entries {
            outcomes.push(upsert_on(&tx, entry)?);
        }
        tx.commit()?;
        Ok(outcomes)
    }

    /// Find the entry for an exact path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row is corrupt.
    pub fn lookup(&self, path: &Path) -> CatalogResult<Option<CatalogEntry>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM entries WHERE path = ?1", ENTRY_COLUMNS),
                params![path_to_text(path)],
                RawEntry::from_row,
            )
            .optional()?;
        raw.map(RawEntry::into_entry).transpose()
    }

    /// Every entry in insertion order, including deleted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn all_entries(&self) -> CatalogResult<Vec<CatalogEntry>> {
        self.query_entries(&format!(
            "SELECT {} FROM entries ORDER BY seq",
            ENTRY_COLUMNS
        ))
    }

    /// Entries not flagged deleted, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn live_entries(&self) -> CatalogResult<Vec<CatalogEntry>> {
        self.query_entries(&format!(
            "SELECT {} FROM entries WHERE deleted = 0 ORDER BY seq",
            ENTRY_COLUMNS
        ))
    }

    /// Live entries keyed by digest, each list in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn entries_grouped_by_digest(&self) -> CatalogResult<BTreeMap<Digest, Vec<CatalogEntry>>> {
        let mut grouped: BTreeMap<Digest, Vec<CatalogEntry>> = BTreeMap::new();
        for entry in self.live_entries()? {
            grouped.entry(entry.digest).or_default().push(entry);
        }
        Ok(grouped)
    }

    fn query_entries(&self, sql: &str) -> CatalogResult<Vec<CatalogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raws = stmt
            .query_map([], RawEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawEntry::into_entry).collect()
    }

    /// Flag exactly the entries in `seqs` as duplicates, clearing the flag
    /// everywhere else.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails; nothing is changed then.
    pub fn mark_duplicates<I>(&mut self, seqs: I) -> CatalogResult<usize>
    where
        I: IntoIterator<Item = i64>,
    {
        let tx = self.conn.transaction()?;
        tx.execute("UPDATE entries SET duplicate = 0 WHERE duplicate != 0", [])?;
        let mut marked = 0;
        {
            let mut stmt = tx.prepare_cached("UPDATE entries SET duplicate = 1 WHERE seq = ?1")?;
            for seq in seqs {
                marked += stmt.execute(params![seq])?;
            }
        }
        tx.commit()?;
        Ok(marked)
    }

    /// Flag the entry for `path` as deleted. Returns false if no entry exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_deleted(&mut self, path: &Path) -> CatalogResult<bool> {
        let changed = self.conn.execute(
            "UPDATE entries SET deleted = 1 WHERE path = ?1",
            params![path_to_text(path)],
        )?;
        Ok(changed > 0)
    }

    /// Total number of entries, deleted ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn entry_count(&self) -> CatalogResult<usize> {
        self.count("SELECT COUNT(*) FROM entries")
    }

    /// Number of entries not flagged deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn live_entry_count(&self) -> CatalogResult<usize> {
        self.count("SELECT COUNT(*) FROM entries WHERE deleted = 0")
    }

    fn count(&self, sql: &str) -> CatalogResult<usize> {
        let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    // ── Actions ──────────────────────────────────────────────────

    /// Append an action record.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_action(&mut self, record: &ActionRecord) -> CatalogResult<()> {
        self.conn.execute(
            "INSERT INTO actions (kind, path, destination, outcome, reason, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.kind.as_str(),
                path_to_text(&record.path),
                record.destination.as_deref().map(path_to_text),
                record.outcome.as_str(),
                record.reason,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All action records in the order they were appended.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn actions(&self) -> CatalogResult<Vec<ActionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, path, destination, outcome, reason, recorded_at \
             FROM actions ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(kind, path, destination, outcome, reason, recorded_at)| {
                let kind = ActionKind::parse(&kind).ok_or_else(|| CatalogError::CorruptEntry {
                    path: path.clone(),
                    reason: format!("unknown action kind {:?}", kind),
                })?;
                let outcome =
                    ActionOutcome::parse(&outcome).ok_or_else(|| CatalogError::CorruptEntry {
                        path: path.clone(),
                        reason: format!("unknown action outcome {:?}", outcome),
                    })?;
                let recorded_at = parse_timestamp(&path, &recorded_at)?;
                Ok(ActionRecord {
                    kind,
                    path: PathBuf::from(path),
                    destination: destination.map(PathBuf::from),
                    outcome,
                    reason,
                    recorded_at,
                })
            })
            .collect()
    }

    // ── Metadata ─────────────────────────────────────────────────

    /// Store a metadata value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_metadata(&mut self, key: &str, value: &str) -> CatalogResult<()> {
        self.conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Read a metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_metadata(&self, key: &str) -> CatalogResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    // ── File groups ──────────────────────────────────────────────

    /// Add planned copies to the work list. Rows already present for the
    /// same origin and destination root are left untouched.
    ///
    /// Returns how many rows were new.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; the transaction is rolled back.
    pub fn insert_file_groups(&mut self, items: &[NewFileGroup]) -> CatalogResult<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO file_groups \
                 (origin_path, destination_root, destination_path, file_name, group_key, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for item in items {
                inserted += stmt.execute(params![
                    path_to_text(&item.origin_path),
                    path_to_text(&item.destination_root),
                    path_to_text(&item.destination_path),
                    item.file_name,
                    item.group_key,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Every work-list row for `destination_root`, in planning order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn file_groups(&self, destination_root: &Path) -> CatalogResult<Vec<FileGroupRecord>> {
        self.query_file_groups(
            &format!(
                "SELECT {} FROM file_groups WHERE destination_root = ?1 ORDER BY id",
                FILE_GROUP_COLUMNS
            ),
            destination_root,
        )
    }

    /// Rows for `destination_root` that are neither copied nor skipped as
    /// duplicates, in planning order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row is corrupt.
    pub fn pending_file_groups(
        &self,
        destination_root: &Path,
    ) -> CatalogResult<Vec<FileGroupRecord>> {
        self.query_file_groups(
            &format!(
                "SELECT {} FROM file_groups \
                 WHERE destination_root = ?1 AND copied = 0 AND duplicate = 0 ORDER BY id",
                FILE_GROUP_COLUMNS
            ),
            destination_root,
        )
    }

    fn query_file_groups(
        &self,
        sql: &str,
        destination_root: &Path,
    ) -> CatalogResult<Vec<FileGroupRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raws = stmt
            .query_map(params![path_to_text(destination_root)], RawFileGroup::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawFileGroup::into_record).collect()
    }

    /// Mark a work-list row as copied to `destination_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_file_group_copied(
        &mut self,
        id: i64,
        digest: &Digest,
        destination_path: &Path,
    ) -> CatalogResult<()> {
        self.conn.execute(
            "UPDATE file_groups SET copied = 1, digest = ?2, destination_path = ?3 WHERE id = ?1",
            params![id, digest.to_hex(), path_to_text(destination_path)],
        )?;
        Ok(())
    }

    /// Mark a work-list row as skipped because its content is already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn mark_file_group_duplicate(&mut self, id: i64, digest: &Digest) -> CatalogResult<()> {
        self.conn.execute(
            "UPDATE file_groups SET duplicate = 1, digest = ?2 WHERE id = ?1",
            params![id, digest.to_hex()],
        )?;
        Ok(())
    }

    /// Digests already copied into `destination_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a digest is corrupt.
    pub fn copied_digests(&self, destination_root: &Path) -> CatalogResult<HashSet<Digest>> {
        let mut stmt = self.conn.prepare(
            "SELECT origin_path, digest FROM file_groups \
             WHERE destination_root = ?1 AND copied = 1 AND digest IS NOT NULL",
        )?;
        let rows = stmt
            .query_map(params![path_to_text(destination_root)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(path, hex)| parse_digest(&path, &hex))
            .collect()
    }

    // ── Maintenance ──────────────────────────────────────────────

    /// Delete every row of every table and restart `seq` numbering.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails; nothing is removed then.
    pub fn clear(&mut self) -> CatalogResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DELETE FROM entries;
             DELETE FROM actions;
             DELETE FROM file_groups;
             DELETE FROM metadata;
             DELETE FROM sqlite_sequence;",
        )?;
        tx.commit()?;
        log::info!("Catalog cleared");
        Ok(())
    }
}

fn upsert_on(conn: &Connection, entry: &NewEntry) -> CatalogResult<UpsertOutcome> {
    let path = path_to_text(&entry.path);
    let size = i64::try_from(entry.size).map_err(|_| CatalogError::CorruptEntry {
        path: path.clone(),
        reason: format!("size {} does not fit in the catalog", entry.size),
    })?;
    let (mtime_secs, mtime_nanos) = time_to_parts(entry.modified);

    let existed = conn
        .query_row(
            "SELECT 1 FROM entries WHERE path = ?1",
            params![path],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    conn.prepare_cached(
        "INSERT INTO entries (path, digest, size, mtime_secs, mtime_nanos, scanned_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(path) DO UPDATE SET \
             digest = excluded.digest, \
             size = excluded.size, \
             mtime_secs = excluded.mtime_secs, \
             mtime_nanos = excluded.mtime_nanos, \
             scanned_at = excluded.scanned_at, \
             duplicate = 0, \
             deleted = 0",
    )?
    .execute(params![
        path,
        entry.digest.to_hex(),
        size,
        mtime_secs,
        mtime_nanos,
        Utc::now().to_rfc3339(),
    ])?;

    Ok(if existed {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

fn path_to_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn parse_digest(path: &str, hex: &str) -> CatalogResult<Digest> {
    Digest::from_hex(hex).map_err(|e| CatalogError::CorruptEntry {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn parse_timestamp(path: &str, text: &str) -> CatalogResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CatalogError::CorruptEntry {
            path: path.to_string(),
            reason: format!("bad timestamp {:?}: {}", text, e),
        })
}

/// Row as stored, before validation.
struct RawEntry {
    seq: i64,
    path: String,
    digest: String,
    size: i64,
    mtime_secs: i64,
    mtime_nanos: i64,
    scanned_at: String,
    duplicate: bool,
    deleted: bool,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            path: row.get(1)?,
            digest: row.get(2)?,
            size: row.get(3)?,
            mtime_secs: row.get(4)?,
            mtime_nanos: row.get(5)?,
            scanned_at: row.get(6)?,
            duplicate: row.get(7)?,
            deleted: row.get(8)?,
        })
    }

    fn into_entry(self) -> CatalogResult<CatalogEntry> {
        let digest = parse_digest(&self.path, &self.digest)?;
        let size = u64::try_from(self.size).map_err(|_| CatalogError::CorruptEntry {
            path: self.path.clone(),
            reason: format!("negative size {}", self.size),
        })?;
        let nanos = u32::try_from(self.mtime_nanos)
            .ok()
            .filter(|n| *n < 1_000_000_000)
            .ok_or_else(|| CatalogError::CorruptEntry {
                path: self.path.clone(),
                reason: format!("bad mtime nanoseconds {}", self.mtime_nanos),
            })?;
        let scanned_at = parse_timestamp(&self.path, &self.scanned_at)?;

        Ok(CatalogEntry {
            seq: self.seq,
            modified: parts_to_time(self.mtime_secs, nanos),
            path: PathBuf::from(self.path),
            digest,
            size,
            scanned_at,
            duplicate: self.duplicate,
            deleted: self.deleted,
        })
    }
}

struct RawFileGroup {
    id: i64,
    origin_path: String,
    destination_root: String,
    destination_path: String,
    file_name: String,
    group_key: String,
    digest: Option<String>,
    copied: bool,
    duplicate: bool,
    created_at: String,
}

impl RawFileGroup {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            origin_path: row.get(1)?,
            destination_root: row.get(2)?,
            destination_path: row.get(3)?,
            file_name: row.get(4)?,
            group_key: row.get(5)?,
            digest: row.get(6)?,
            copied: row.get(7)?,
            duplicate: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_record(self) -> CatalogResult<FileGroupRecord> {
        let digest = self
            .digest
            .as_deref()
            .map(|hex| parse_digest(&self.origin_path, hex))
            .transpose()?;
        let created_at = parse_timestamp(&self.origin_path, &self.created_at)?;

        Ok(FileGroupRecord {
            id: self.id,
            origin_path: PathBuf::from(self.origin_path),
            destination_root: PathBuf::from(self.destination_root),
            destination_path: PathBuf::from(self.destination_path),
            file_name: self.file_name,
            group_key: self.group_key,
            digest,
            copied: self.copied,
            duplicate: self.duplicate,
            created_at,
        })
    }
}
