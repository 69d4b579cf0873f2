//! Persistent catalog of hashed files.
//!
//! The catalog is a single SQLite file (by default `hashdata.sqlite`) that
//! outlives any one run. It holds:
//!
//! * [`database`]: the [`Catalog`] itself, schema management and queries.
//! * [`entry`]: the row types ([`CatalogEntry`], [`ActionRecord`], ...).
//!
//! # Change detection
//!
//! An entry is considered current when the file's path, size and
//! modification time all match what was recorded. Anything else is stale and
//! gets re-hashed by the next scan.
//!
//! # Ordering
//!
//! Every entry carries a `seq` assigned on first insertion. Overwriting an
//! entry keeps its `seq`, so "first found" survives re-scans.

pub mod database;
pub mod entry;

pub use database::{Catalog, CatalogError, CatalogResult, SCHEMA_VERSION};
pub use entry::{
    ActionKind, ActionOutcome, ActionRecord, CatalogEntry, FileGroupRecord, NewEntry,
    NewFileGroup, UpsertOutcome,
};

/// Well-known metadata keys.
pub mod keys {
    /// Current workflow phase (`idle`, `scanning`, `ready`, `executing`)
    pub const OPERATION_STATE: &str = "operation_state";
    /// Last operation started (`scan`, `delete`, `group`)
    pub const LAST_OPERATION: &str = "last_operation";
    /// Root of the most recent scan
    pub const LAST_ROOT: &str = "last_root";
    /// Path of the item handled last by a delete or group run
    pub const LAST_PATH: &str = "last_path";
    /// Files handled so far by the running or last operation
    pub const PROCESSED_COUNT: &str = "processed_count";
    /// Files discovered by the most recent scan
    pub const TOTAL_FILES: &str = "total_files";
    /// RFC 3339 time the last operation finished
    pub const LAST_COMPLETED_AT: &str = "last_completed_at";
}
