//! Permanent deletion of duplicate files.
//!
//! # Overview
//!
//! Deletion is split in two phases:
//!
//! 1. [`DeletePlan::from_report`] is pure: it lists every non-canonical
//!    member of every duplicate group, with the size and mtime the catalog
//!    recorded. The plan can be inspected or shown before anything happens.
//! 2. [`execute_delete`] walks the plan item by item, re-checks the
//!    filesystem, removes the file and records the outcome in the catalog.
//!
//! # Safety
//!
//! - The canonical member of a group is never in the plan.
//! - The canonical file is re-hashed once per group before its first
//!   deletion. If it has disappeared or no longer holds the group's content,
//!   every item of the group is skipped so the last copy is never removed.
//! - With verification on, a file whose size or mtime changed since the scan
//!   is skipped.
//! - Files are removed with [`std::fs::remove_file`]; there is no trash and
//!   no undo. Callers must confirm with the user first.
//!
//! # Example
//!
//! ```no_run
//! use filetidy::actions::delete::{execute_delete, DeleteConfig, DeletePlan};
//! use filetidy::catalog::Catalog;
//! use filetidy::duplicates::compute_duplicates;
//! use std::path::Path;
//!
//! let mut catalog = Catalog::open(Path::new("hashdata.sqlite")).unwrap();
//! let report = compute_duplicates(&catalog).unwrap();
//! let plan = DeletePlan::from_report(&report);
//! let result = execute_delete(&plan, &mut catalog, &DeleteConfig::default()).unwrap();
//! println!("{}", result.summary());
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::entry::time_to_parts;
use crate::catalog::{keys, ActionKind, ActionOutcome, ActionRecord, Catalog, CatalogError};
use crate::duplicates::DuplicateReport;
use crate::progress::ProgressCallback;
use crate::scanner::{Digest, Hasher};

/// Error for a single file. Never aborts the batch.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when attempting to delete.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File was modified since scan (TOCTOU protection).
    #[error("file modified since scan: {path} ({reason})")]
    Modified { path: PathBuf, reason: String },

    /// The canonical copy of the group is gone, so nothing may be deleted.
    #[error("canonical copy missing: {0}")]
    CanonicalMissing(PathBuf),

    /// The canonical copy no longer holds the group's content.
    #[error("canonical copy changed since scan: {path} ({reason})")]
    CanonicalChanged { path: PathBuf, reason: String },

    /// Permanent delete operation failed.
    #[error("permanent delete failed for {path}: {message}")]
    PermanentDeleteFailed { path: PathBuf, message: String },

    /// Attempted to delete all copies (at least one must be preserved).
    #[error("cannot delete all copies - at least one file must be preserved")]
    AllCopiesWouldBeDeleted,

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeleteError {
    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p)
            | Self::PermissionDenied(p)
            | Self::CanonicalMissing(p)
            | Self::Modified { path: p, .. }
            | Self::CanonicalChanged { path: p, .. }
            | Self::PermanentDeleteFailed { path: p, .. }
            | Self::Io { path: p, .. } => Some(p),
            Self::AllCopiesWouldBeDeleted => None,
        }
    }

    fn from_io(path: &Path, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: e,
            },
        }
    }
}

/// Errors that stop a delete batch.
#[derive(Debug, Error)]
pub enum DeleteBatchError {
    /// The plan would remove every copy of some group.
    #[error("refusing unsafe delete plan: {0}")]
    UnsafePlan(#[source] DeleteError),

    /// The catalog could not record an outcome. Every earlier action is
    /// already recorded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// A file scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteItem {
    /// File to delete
    pub path: PathBuf,
    /// Size recorded in the catalog
    pub size: u64,
    /// Modification time recorded in the catalog
    pub modified: SystemTime,
    /// Shared content digest
    pub digest: Digest,
    /// Index into [`DeletePlan::groups`]
    pub group: usize,
}

/// The members of one duplicate group as seen by the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedGroup {
    /// Copy that is kept
    pub canonical: PathBuf,
    /// Every member, canonical first
    pub members: Vec<PathBuf>,
}

/// Inspectable list of deletions derived from a duplicate report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletePlan {
    pub groups: Vec<PlannedGroup>,
    pub items: Vec<DeleteItem>,
}

impl DeletePlan {
    /// Schedule every non-canonical member of every group. Pure.
    #[must_use]
    pub fn from_report(report: &DuplicateReport) -> Self {
        let mut plan = Self::default();
        for group in &report.groups {
            let index = plan.groups.len();
            plan.groups.push(PlannedGroup {
                canonical: group.canonical().path.clone(),
                members: group.paths(),
            });
            plan.items
                .extend(group.duplicates().iter().map(|member| DeleteItem {
                    path: member.path.clone(),
                    size: member.size,
                    modified: member.modified,
                    digest: member.digest,
                    group: index,
                }));
        }
        plan
    }

    /// Number of files scheduled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bytes that would be freed if every item is deleted.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|i| i.size).fold(0u64, u64::saturating_add)
    }

    /// Canonical path for an item.
    #[must_use]
    pub fn canonical_of(&self, item: &DeleteItem) -> Option<&Path> {
        self.groups.get(item.group).map(|g| g.canonical.as_path())
    }

    /// Check that every group keeps at least one member and that no item is
    /// its group's canonical copy.
    ///
    /// # Errors
    ///
    /// [`DeleteError::AllCopiesWouldBeDeleted`] for an unsafe plan.
    pub fn validate(&self) -> Result<(), DeleteError> {
        for (index, group) in self.groups.iter().enumerate() {
            let selected: Vec<PathBuf> = self
                .items
                .iter()
                .filter(|i| i.group == index)
                .map(|i| i.path.clone())
                .collect();
            if selected.contains(&group.canonical) {
                return Err(DeleteError::AllCopiesWouldBeDeleted);
            }
            validate_preserves_copy(&selected, &group.members)?;
        }
        if self.items.iter().any(|i| i.group >= self.groups.len()) {
            return Err(DeleteError::AllCopiesWouldBeDeleted);
        }
        Ok(())
    }
}

/// Result of a successful deletion.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    /// Path that was deleted.
    pub path: PathBuf,
    /// Size of the deleted file in bytes.
    pub size: u64,
}

/// Results of a batch deletion.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchDeleteResult {
    /// Deleted files (or files that would be deleted in a dry run).
    pub successes: Vec<DeleteResult>,
    /// Files left alone on purpose, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    /// Files that could not be deleted, with the error.
    pub failures: Vec<(PathBuf, String)>,
    /// Total bytes freed.
    pub bytes_freed: u64,
    /// Whether the batch stopped early because cancellation was requested.
    pub interrupted: bool,
    /// Nothing was touched.
    pub dry_run: bool,
}

impl BatchDeleteResult {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Total number of items handled.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.successes.len() + self.skipped.len() + self.failures.len()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "would delete" } else { "deleted" };
        let mut line = format!(
            "{} {}, {} skipped, {} failed, {} freed",
            self.success_count(),
            verb,
            self.skipped_count(),
            self.failure_count(),
            bytesize::ByteSize::b(self.bytes_freed)
        );
        if self.interrupted {
            line.push_str(" (interrupted)");
        }
        line
    }
}

/// Configuration for deletion operations.
#[derive(Clone)]
pub struct DeleteConfig {
    /// Skip files whose size or mtime differ from the catalog.
    pub verify: bool,
    /// Report what would happen without deleting or recording anything.
    pub dry_run: bool,
    /// Optional shutdown flag, checked between items.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DeleteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteConfig")
            .field("verify", &self.verify)
            .field("dry_run", &self.dry_run)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for DeleteConfig {
    fn default() -> Self {
        Self {
            verify: true,
            dry_run: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl DeleteConfig {
    /// Enable/disable TOCTOU verification.
    #[must_use]
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Enable/disable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// File metadata snapshot for TOCTOU verification.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl FileSnapshot {
    /// Capture a file's current state without following a final symlink.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or can't be accessed.
    pub fn capture(path: &Path) -> Result<Self, DeleteError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        })
    }

    /// Check the snapshot against recorded size and mtime.
    ///
    /// # Errors
    ///
    /// [`DeleteError::Modified`] naming what changed.
    pub fn verify_against(&self, size: u64, modified: SystemTime) -> Result<(), DeleteError> {
        if self.size != size {
            return Err(DeleteError::Modified {
                path: self.path.clone(),
                reason: format!("size changed from {} to {}", size, self.size),
            });
        }
        match self.mtime {
            Some(current) if time_to_parts(current) == time_to_parts(modified) => Ok(()),
            _ => Err(DeleteError::Modified {
                path: self.path.clone(),
                reason: "modification time changed".to_string(),
            }),
        }
    }
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `PermanentDeleteFailed` if the delete operation fails
pub fn permanent_delete(path: &Path) -> Result<DeleteResult, DeleteError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| DeleteError::from_io(path, e))?;
    let size = metadata.len();

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        match e.kind() {
            io::ErrorKind::PermissionDenied => DeleteError::PermissionDenied(path.to_path_buf()),
            _ => DeleteError::PermanentDeleteFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        }
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(DeleteResult {
        path: path.to_path_buf(),
        size,
    })
}

/// Validate that a selection doesn't delete all copies.
///
/// # Errors
///
/// Returns `AllCopiesWouldBeDeleted` if all copies would be deleted.
///
/// # Example
///
/// ```
/// use filetidy::actions::delete::validate_preserves_copy;
/// use std::path::PathBuf;
///
/// let group = vec![
///     PathBuf::from("/original.txt"),
///     PathBuf::from("/copy1.txt"),
/// ];
///
/// assert!(validate_preserves_copy(&[PathBuf::from("/copy1.txt")], &group).is_ok());
/// assert!(validate_preserves_copy(&group, &group).is_err());
/// ```
pub fn validate_preserves_copy(
    selected_paths: &[PathBuf],
    group_paths: &[PathBuf],
) -> Result<(), DeleteError> {
    let selected_set: HashSet<&PathBuf> = selected_paths.iter().collect();
    let preserved_count = group_paths
        .iter()
        .filter(|p| !selected_set.contains(p))
        .count();

    if preserved_count == 0 {
        log::error!(
            "Attempted to delete all {} copies of a duplicate group",
            group_paths.len()
        );
        Err(DeleteError::AllCopiesWouldBeDeleted)
    } else {
        Ok(())
    }
}

enum ItemOutcome {
    Deleted(DeleteResult),
    Skipped(String),
    Failed(String),
}

/// Execute a delete plan against the filesystem and the catalog.
///
/// Each item ends as deleted, skipped or failed; a failure never stops the
/// batch. After every item the outcome is appended to the action log and a
/// deleted (or already missing) file has its entry flagged deleted, so a
/// re-run only retries what is left.
///
/// # Errors
///
/// - [`DeleteBatchError::UnsafePlan`] before touching anything if the plan
///   would remove a canonical copy
/// - [`DeleteBatchError::Catalog`] if an outcome cannot be recorded
pub fn execute_delete(
    plan: &DeletePlan,
    catalog: &mut Catalog,
    config: &DeleteConfig,
) -> Result<BatchDeleteResult, DeleteBatchError> {
    plan.validate().map_err(DeleteBatchError::UnsafePlan)?;

    let mut result = BatchDeleteResult {
        dry_run: config.dry_run,
        ..Default::default()
    };

    if !config.dry_run {
        catalog.set_metadata(keys::LAST_OPERATION, "delete")?;
        catalog.set_metadata(keys::PROCESSED_COUNT, "0")?;
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_phase_start("delete", plan.len());
    }

    let hasher = Hasher::new();
    // Per group: None if the canonical still holds the content
    let mut canonical_checks: HashMap<usize, Option<String>> = HashMap::new();

    for (index, item) in plan.items.iter().enumerate() {
        if config.is_shutdown_requested() {
            log::warn!("Delete interrupted after {} of {} items", index, plan.len());
            result.interrupted = true;
            break;
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_progress(index + 1, &item.path.to_string_lossy());
        }

        let canonical = plan.canonical_of(item).unwrap_or(item.path.as_path());
        let protected = canonical_checks
            .entry(item.group)
            .or_insert_with(|| {
                check_canonical(&hasher, canonical, &item.digest)
                    .err()
                    .map(|e| e.to_string())
            })
            .clone();
        let (outcome, gone) = match protected {
            Some(reason) => (ItemOutcome::Skipped(reason), false),
            None => delete_item(item, config),
        };

        let record = ActionRecord::new(ActionKind::Delete, &item.path, ActionOutcome::Success);
        match outcome {
            ItemOutcome::Deleted(deleted) => {
                result.bytes_freed += deleted.size;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_item_completed(deleted.size);
                }
                if !config.dry_run {
                    catalog.mark_deleted(&item.path)?;
                    catalog.record_action(&record)?;
                }
                result.successes.push(deleted);
            }
            ItemOutcome::Skipped(reason) => {
                log::info!("Skipped {}: {}", item.path.display(), reason);
                if !config.dry_run {
                    if gone {
                        catalog.mark_deleted(&item.path)?;
                    }
                    let record = ActionRecord {
                        outcome: ActionOutcome::Skipped,
                        ..record
                    }
                    .with_reason(reason.clone());
                    catalog.record_action(&record)?;
                }
                result.skipped.push((item.path.clone(), reason));
            }
            ItemOutcome::Failed(reason) => {
                log::warn!("Failed to delete {}: {}", item.path.display(), reason);
                if !config.dry_run {
                    let record = ActionRecord {
                        outcome: ActionOutcome::Failed,
                        ..record
                    }
                    .with_reason(reason.clone());
                    catalog.record_action(&record)?;
                }
                result.failures.push((item.path.clone(), reason));
            }
        }

        if !config.dry_run {
            catalog.set_metadata(keys::PROCESSED_COUNT, &(index + 1).to_string())?;
        }
    }

    if !config.dry_run && !result.interrupted {
        catalog.set_metadata(keys::LAST_COMPLETED_AT, &chrono::Utc::now().to_rfc3339())?;
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_phase_end("delete");
    }

    log::info!("{}", result.summary());
    Ok(result)
}

/// Confirm the canonical file still exists and still hashes to `digest`.
///
/// # Errors
///
/// [`DeleteError::CanonicalMissing`] or [`DeleteError::CanonicalChanged`].
pub fn check_canonical(
    hasher: &Hasher,
    canonical: &Path,
    digest: &Digest,
) -> Result<(), DeleteError> {
    match fs::metadata(canonical) {
        Ok(m) if m.is_file() => {}
        _ => return Err(DeleteError::CanonicalMissing(canonical.to_path_buf())),
    }
    match hasher.hash_file(canonical) {
        Ok(current) if current == *digest => Ok(()),
        Ok(current) => Err(DeleteError::CanonicalChanged {
            path: canonical.to_path_buf(),
            reason: format!("digest is now {}", &current.to_hex()[..16]),
        }),
        Err(e) => Err(DeleteError::CanonicalChanged {
            path: canonical.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Decide and (unless dry-run) perform one deletion.
///
/// The flag is true when the file is known to be gone afterwards.
fn delete_item(item: &DeleteItem, config: &DeleteConfig) -> (ItemOutcome, bool) {
    let snapshot = match FileSnapshot::capture(&item.path) {
        Ok(snapshot) => snapshot,
        Err(DeleteError::NotFound(_)) => {
            return (ItemOutcome::Skipped("already gone".to_string()), true);
        }
        Err(e) => return (ItemOutcome::Failed(e.to_string()), false),
    };

    if config.verify {
        if let Err(e) = snapshot.verify_against(item.size, item.modified) {
            return (ItemOutcome::Skipped(e.to_string()), false);
        }
    }

    if config.dry_run {
        log::info!("Would delete: {} ({} bytes)", item.path.display(), snapshot.size);
        return (
            ItemOutcome::Deleted(DeleteResult {
                path: item.path.clone(),
                size: snapshot.size,
            }),
            false,
        );
    }

    match permanent_delete(&item.path) {
        Ok(deleted) => (ItemOutcome::Deleted(deleted), true),
        Err(DeleteError::NotFound(_)) => (ItemOutcome::Skipped("already gone".to_string()), true),
        Err(e) => (ItemOutcome::Failed(e.to_string()), false),
    }
}
