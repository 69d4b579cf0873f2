//! Rows stored in the catalog and their conversions.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scanner::Digest;

/// One hashed file as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Insertion order. Lower means found earlier; survives re-scans.
    pub seq: i64,
    /// Absolute path of the file
    pub path: PathBuf,
    /// BLAKE3 content digest
    pub digest: Digest,
    /// Size in bytes at scan time
    pub size: u64,
    /// Modification time at scan time
    pub modified: SystemTime,
    /// When the file was last hashed
    pub scanned_at: DateTime<Utc>,
    /// Set once the duplicate report has flagged this entry as non-canonical
    pub duplicate: bool,
    /// Set once a delete action removed the file
    pub deleted: bool,
}

impl CatalogEntry {
    /// Whether `size` and `modified` still match what was recorded.
    ///
    /// Used both to skip unchanged files on re-scan and to verify a file
    /// before deleting it.
    #[must_use]
    pub fn matches_metadata(&self, size: u64, modified: SystemTime) -> bool {
        self.size == size && time_to_parts(self.modified) == time_to_parts(modified)
    }
}

/// A freshly hashed file, ready to be written to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub path: PathBuf,
    pub digest: Digest,
    pub size: u64,
    pub modified: SystemTime,
}

impl NewEntry {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, digest: Digest, size: u64, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            digest,
            size,
            modified,
        }
    }
}

/// Result of writing a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No entry existed for the path; a new `seq` was assigned.
    Inserted,
    /// An entry existed and was overwritten in place.
    Updated,
}

/// Kind of destructive or copying action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Delete,
    Copy,
}

impl ActionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Copy => "copy",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "delete" => Some(Self::Delete),
            "copy" => Some(Self::Copy),
            _ => None,
        }
    }
}

/// How an individual action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    Success,
    Skipped,
    Failed,
}

impl ActionOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Append-only log line describing one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub path: PathBuf,
    /// Copy target; `None` for deletes
    pub destination: Option<PathBuf>,
    pub outcome: ActionOutcome,
    /// Why the action was skipped or failed
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ActionRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(kind: ActionKind, path: &Path, outcome: ActionOutcome) -> Self {
        Self {
            kind,
            path: path.to_path_buf(),
            destination: None,
            outcome,
            reason: None,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_destination(mut self, destination: &Path) -> Self {
        self.destination = Some(destination.to_path_buf());
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// One planned copy in a grouping run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileGroupRecord {
    pub id: i64,
    pub origin_path: PathBuf,
    pub destination_root: PathBuf,
    /// Full target path, before any collision suffix
    pub destination_path: PathBuf,
    pub file_name: String,
    /// Folder name the file was grouped under (e.g. `pdf`, `Miscellaneous`)
    pub group_key: String,
    pub digest: Option<Digest>,
    pub copied: bool,
    /// Not copied because identical content was already in the destination
    pub duplicate: bool,
    pub created_at: DateTime<Utc>,
}

/// A planned copy to add to the grouping work list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileGroup {
    pub origin_path: PathBuf,
    pub destination_root: PathBuf,
    pub destination_path: PathBuf,
    pub file_name: String,
    pub group_key: String,
}

/// Split a timestamp into signed seconds and nanoseconds relative to the
/// Unix epoch. Times before the epoch get negative seconds.
pub(crate) fn time_to_parts(time: SystemTime) -> (i64, u32) {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => (i64::try_from(d.as_secs()).unwrap_or(i64::MAX), d.subsec_nanos()),
        Err(e) => {
            let before = e.duration();
            let secs = i64::try_from(before.as_secs()).unwrap_or(i64::MAX);
            if before.subsec_nanos() == 0 {
                (-secs, 0)
            } else {
                (-secs - 1, 1_000_000_000 - before.subsec_nanos())
            }
        }
    }
}

/// Inverse of [`time_to_parts`].
pub(crate) fn parts_to_time(secs: i64, nanos: u32) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs.unsigned_abs(), nanos)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(u64::from(nanos))
    }
}
