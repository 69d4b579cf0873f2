//! Grouping files into per-extension or per-name folders.
//!
//! Files under an origin directory are copied (never moved) into
//! `<destination>/<group>/<file name>`, where the group is derived from the
//! file's extension or stem. Like deletion, grouping is two-phase:
//!
//! 1. [`plan_grouping`] walks the origin and records every planned copy in
//!    the catalog's work list. Rows from an earlier, unfinished run are kept,
//!    so planning again after an interruption resumes where it stopped.
//! 2. [`execute_grouping`] processes every pending row: it hashes the file
//!    (reusing the catalog digest when the file is unchanged), applies the
//!    [`DuplicatePolicy`], resolves name collisions and copies through a
//!    uniquely named hidden temp file that is moved into place without ever
//!    replacing an existing file.
//!
//! A destination name that already holds identical content counts as
//! already copied. A destination name holding different content is never
//! overwritten; the copy gets a numbered name instead (`notes (1).txt`).

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{
    keys, ActionKind, ActionOutcome, ActionRecord, Catalog, CatalogError, FileGroupRecord,
    NewEntry, NewFileGroup,
};
use crate::config::ConfigError;
use crate::progress::ProgressCallback;
use crate::scanner::{Digest, HashError, Hasher, ScanError, Walker, WalkerConfig};

/// Folder used for files with no extension (or no stem).
pub const MISC_GROUP: &str = "Miscellaneous";

/// Prefix and suffix of the temp file a copy is written to before being
/// moved into place. The middle part is random.
const PARTIAL_PREFIX: &str = ".filetidy-";
const PARTIAL_SUFFIX: &str = ".partial";

/// Upper bound on `name (n).ext` attempts for one file.
const MAX_COLLISION_SUFFIX: u32 = 10_000;

/// How the destination folder of a file is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingMode {
    /// Lower-cased extension: `pdf`
    #[default]
    Extension,
    /// Lower-cased extension with a `dot ` prefix: `dot pdf`
    DotExtension,
    /// File name without its extension: `report`
    FileName,
}

impl GroupingMode {
    /// Folder name for `path` under this mode.
    ///
    /// ```
    /// use filetidy::actions::group::GroupingMode;
    /// use std::path::Path;
    ///
    /// assert_eq!(GroupingMode::Extension.group_key(Path::new("a/Report.PDF")), "pdf");
    /// assert_eq!(GroupingMode::DotExtension.group_key(Path::new("x.txt")), "dot txt");
    /// assert_eq!(GroupingMode::FileName.group_key(Path::new("report.pdf")), "report");
    /// assert_eq!(GroupingMode::Extension.group_key(Path::new("Makefile")), "Miscellaneous");
    /// ```
    #[must_use]
    pub fn group_key(self, path: &Path) -> String {
        let key = match self {
            Self::FileName => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty()),
            Self::Extension | Self::DotExtension => path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .filter(|e| !e.is_empty())
                .map(|e| {
                    if self == Self::DotExtension {
                        format!("dot {}", e)
                    } else {
                        e
                    }
                }),
        };
        key.map_or_else(|| MISC_GROUP.to_string(), |k| sanitize_folder_name(&k))
    }
}

/// Make a group key safe to use as a single path component.
#[must_use]
pub fn sanitize_folder_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        MISC_GROUP.to_string()
    } else if trimmed == "." || trimmed == ".." {
        trimmed.replace('.', "_")
    } else {
        cleaned
    }
}

/// What to do with a file whose content was already copied into the
/// destination root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Leave it out
    #[default]
    Skip,
    /// Copy it as well
    CopyAnyway,
}

/// Errors that stop a grouping run.
#[derive(Debug, Error)]
pub enum GroupError {
    /// Origin or destination were rejected before anything was touched.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The catalog could not be read or written.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The origin could not be walked.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The destination root could not be created.
    #[error("failed to create destination {path}: {source}")]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Configuration for a grouping run.
#[derive(Clone)]
pub struct GroupConfig {
    /// Directory whose files are grouped
    pub origin: PathBuf,
    /// Directory the groups are created in
    pub destination: PathBuf,
    pub mode: GroupingMode,
    pub duplicate_policy: DuplicatePolicy,
    /// Report without copying or writing to the catalog
    pub dry_run: bool,
    /// Filters for the origin walk
    pub walker: WalkerConfig,
    /// Optional shutdown flag, checked between files
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for GroupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupConfig")
            .field("origin", &self.origin)
            .field("destination", &self.destination)
            .field("mode", &self.mode)
            .field("duplicate_policy", &self.duplicate_policy)
            .field("dry_run", &self.dry_run)
            .field("walker", &self.walker)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl GroupConfig {
    /// Create a config with default mode and policy.
    #[must_use]
    pub fn new(origin: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            mode: GroupingMode::default(),
            duplicate_policy: DuplicatePolicy::default(),
            dry_run: false,
            walker: WalkerConfig::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: GroupingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_walker(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

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

    /// Check the origin and destination without touching the filesystem.
    ///
    /// # Errors
    ///
    /// A [`ConfigError`] when the origin is missing or not a directory, the
    /// destination is not a directory, the two are the same, or one is
    /// nested inside the other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolved_roots().map(|_| ())
    }

    /// Absolute, symlink-free origin and destination.
    ///
    /// The destination does not need to exist yet.
    ///
    /// # Errors
    ///
    /// Same as [`GroupConfig::validate`].
    pub fn resolved_roots(&self) -> Result<(PathBuf, PathBuf), ConfigError> {
        let origin = match fs::metadata(&self.origin) {
            Ok(m) if m.is_dir() => self
                .origin
                .canonicalize()
                .map_err(|_| ConfigError::OriginMissing(self.origin.clone()))?,
            Ok(_) => return Err(ConfigError::OriginNotADirectory(self.origin.clone())),
            Err(_) => return Err(ConfigError::OriginMissing(self.origin.clone())),
        };

        if let Ok(m) = fs::metadata(&self.destination) {
            if !m.is_dir() {
                return Err(ConfigError::DestinationNotADirectory(
                    self.destination.clone(),
                ));
            }
        }
        let destination = resolve_destination(&self.destination)?;

        if origin == destination {
            return Err(ConfigError::SameDirectory(origin));
        }
        if destination.starts_with(&origin) {
            return Err(ConfigError::DestinationInsideOrigin {
                origin,
                destination,
            });
        }
        if origin.starts_with(&destination) {
            return Err(ConfigError::OriginInsideDestination {
                origin,
                destination,
            });
        }
        Ok((origin, destination))
    }
}

/// Canonicalize the longest existing ancestor and re-append the rest.
fn resolve_destination(path: &Path) -> Result<PathBuf, ConfigError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|_| ConfigError::DestinationUnresolvable(path.to_path_buf()))?
            .join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut resolved = canonical;
            for component in missing.iter().rev() {
                resolved.push(component);
            }
            return Ok(resolved);
        }
        match (existing.parent(), existing.components().next_back()) {
            (Some(parent), Some(Component::Normal(name))) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Err(ConfigError::DestinationUnresolvable(path.to_path_buf())),
        }
    }
}

/// One planned copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyItem {
    /// Work-list row; `None` for dry-run plans, which are not persisted
    pub id: Option<i64>,
    pub origin: PathBuf,
    pub group_key: String,
    /// `<destination>/<group_key>`
    pub destination_dir: PathBuf,
    pub file_name: String,
    /// Already handled by an earlier run
    pub done: bool,
}

impl CopyItem {
    fn from_record(record: FileGroupRecord) -> Self {
        let destination_dir = record.destination_root.join(&record.group_key);
        Self {
            id: Some(record.id),
            origin: record.origin_path,
            group_key: record.group_key,
            destination_dir,
            file_name: record.file_name,
            done: record.copied || record.duplicate,
        }
    }

    /// Target path before any collision suffix.
    #[must_use]
    pub fn target(&self) -> PathBuf {
        self.destination_dir.join(&self.file_name)
    }
}

/// Inspectable list of copies for one origin and destination.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyPlan {
    pub origin: PathBuf,
    pub destination: PathBuf,
    pub items: Vec<CopyItem>,
    /// Rows added to the work list by this planning pass
    pub newly_planned: usize,
    /// Files the walk could not read
    pub walk_failures: Vec<(PathBuf, String)>,
}

impl CopyPlan {
    /// Items not handled yet.
    pub fn pending(&self) -> impl Iterator<Item = &CopyItem> {
        self.items.iter().filter(|i| !i.done)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Walk the origin and record every planned copy.
///
/// Nothing on disk is modified. Unless `dry_run` is set the plan is
/// persisted to the catalog work list; rows from earlier runs are kept with
/// their progress.
///
/// # Errors
///
/// - [`GroupError::Config`] for an unusable origin or destination
/// - [`GroupError::Catalog`] if the work list cannot be written
pub fn plan_grouping(config: &GroupConfig, catalog: &mut Catalog) -> Result<CopyPlan, GroupError> {
    let (origin, destination) = config.resolved_roots()?;

    let mut walker = Walker::new(&origin, config.walker.clone());
    if let Some(ref flag) = config.shutdown_flag {
        walker = walker.with_shutdown_flag(Arc::clone(flag));
    }
    walker.validate_root()?;

    let mut planned = Vec::new();
    let mut walk_failures = Vec::new();
    for result in walker.walk() {
        match result {
            Ok(file) => {
                let group_key = config.mode.group_key(&file.path);
                let file_name = file
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                planned.push(NewFileGroup {
                    destination_path: destination.join(&group_key).join(&file_name),
                    origin_path: file.path,
                    destination_root: destination.clone(),
                    file_name,
                    group_key,
                });
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", e.path().display(), e);
                walk_failures.push((e.path().to_path_buf(), e.to_string()));
            }
        }
    }

    let mut plan = CopyPlan {
        origin: origin.clone(),
        destination: destination.clone(),
        walk_failures,
        ..Default::default()
    };

    if config.dry_run {
        plan.items = planned
            .into_iter()
            .map(|row| CopyItem {
                id: None,
                destination_dir: row.destination_root.join(&row.group_key),
                origin: row.origin_path,
                group_key: row.group_key,
                file_name: row.file_name,
                done: false,
            })
            .collect();
        plan.newly_planned = plan.items.len();
    } else {
        plan.newly_planned = catalog.insert_file_groups(&planned)?;
        plan.items = catalog
            .file_groups(&destination)?
            .into_iter()
            .filter(|r| r.origin_path.starts_with(&origin))
            .map(CopyItem::from_record)
            .collect();
    }

    log::info!(
        "Planned {} copies from {} into {} ({} new, {} pending)",
        plan.len(),
        origin.display(),
        destination.display(),
        plan.newly_planned,
        plan.pending_count()
    );
    Ok(plan)
}

/// A file copied into the destination.
#[derive(Debug, Clone, Serialize)]
pub struct CopiedFile {
    pub origin: PathBuf,
    pub destination: PathBuf,
    pub size: u64,
}

/// Aggregate outcome of a grouping run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupResult {
    /// Copies made (or that would be made in a dry run)
    pub copied: Vec<CopiedFile>,
    /// Left out because identical content was already copied
    pub skipped_duplicates: Vec<PathBuf>,
    /// Identical file already at the target name
    pub already_present: Vec<PathBuf>,
    /// Per-file failures with the reason
    pub failures: Vec<(PathBuf, String)>,
    pub bytes_copied: u64,
    pub interrupted: bool,
    pub dry_run: bool,
}

impl GroupResult {
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.copied.len()
            + self.skipped_duplicates.len()
            + self.already_present.len()
            + self.failures.len()
    }

    /// Human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "would copy" } else { "copied" };
        let mut line = format!(
            "{} {} ({}), {} duplicates skipped, {} already present, {} failed",
            self.copied.len(),
            verb,
            bytesize::ByteSize::b(self.bytes_copied),
            self.skipped_duplicates.len(),
            self.already_present.len(),
            self.failures.len()
        );
        if self.interrupted {
            line.push_str(" (interrupted)");
        }
        line
    }
}

enum ItemOutcome {
    Copied(PathBuf, u64),
    Duplicate,
    AlreadyPresent(PathBuf),
}

/// Copy every pending item of `plan`.
///
/// Per-file problems are recorded and the run continues. After each item
/// the work-list row and the action log are updated, so an interrupted run
/// picks up at the next pending row.
///
/// # Errors
///
/// - [`GroupError::CreateDestination`] if the destination root cannot be made
/// - [`GroupError::Catalog`] if progress cannot be recorded
pub fn execute_grouping(
    plan: &CopyPlan,
    catalog: &mut Catalog,
    config: &GroupConfig,
) -> Result<GroupResult, GroupError> {
    let mut result = GroupResult {
        dry_run: config.dry_run,
        ..Default::default()
    };

    if !config.dry_run {
        fs::create_dir_all(&plan.destination).map_err(|source| GroupError::CreateDestination {
            path: plan.destination.clone(),
            source,
        })?;
        catalog.set_metadata(keys::LAST_OPERATION, "group")?;
        catalog.set_metadata(keys::PROCESSED_COUNT, "0")?;
    }

    let mut hasher = Hasher::new();
    if let Some(ref flag) = config.shutdown_flag {
        hasher = hasher.with_shutdown_flag(Arc::clone(flag));
    }

    let mut copied_digests = catalog.copied_digests(&plan.destination)?;
    // Targets claimed by this run; only matters for dry runs
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    let pending: Vec<&CopyItem> = plan.pending().collect();
    if let Some(ref cb) = config.progress_callback {
        cb.on_phase_start("group", pending.len());
    }

    for (index, item) in pending.iter().enumerate() {
        if config.is_shutdown_requested() {
            log::warn!("Grouping interrupted after {} of {} items", index, pending.len());
            result.interrupted = true;
            break;
        }
        if let Some(ref cb) = config.progress_callback {
            cb.on_progress(index + 1, &item.origin.to_string_lossy());
        }

        let digest = match obtain_digest(&item.origin, catalog, &hasher, config.dry_run) {
            Ok(digest) => digest,
            Err(GroupItemError::Hash(HashError::Interrupted(_))) => {
                result.interrupted = true;
                break;
            }
            Err(GroupItemError::Catalog(e)) => return Err(e.into()),
            Err(e) => {
                record_failure(catalog, config, item, e.to_string(), &mut result)?;
                continue;
            }
        };

        let outcome = if config.duplicate_policy == DuplicatePolicy::Skip
            && copied_digests.contains(&digest)
        {
            Ok(ItemOutcome::Duplicate)
        } else {
            place_copy(item, &digest, &hasher, config.dry_run, &mut claimed)
        };

        match outcome {
            Ok(ItemOutcome::Copied(destination, size)) => {
                copied_digests.insert(digest);
                result.bytes_copied += size;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_item_completed(size);
                }
                if !config.dry_run {
                    if let Some(id) = item.id {
                        catalog.mark_file_group_copied(id, &digest, &destination)?;
                    }
                    catalog.record_action(
                        &ActionRecord::new(ActionKind::Copy, &item.origin, ActionOutcome::Success)
                            .with_destination(&destination),
                    )?;
                }
                log::info!(
                    "{} {} -> {}",
                    if config.dry_run { "Would copy" } else { "Copied" },
                    item.origin.display(),
                    destination.display()
                );
                result.copied.push(CopiedFile {
                    origin: item.origin.clone(),
                    destination,
                    size,
                });
            }
            Ok(ItemOutcome::Duplicate) => {
                log::info!("Skipping duplicate content: {}", item.origin.display());
                if !config.dry_run {
                    if let Some(id) = item.id {
                        catalog.mark_file_group_duplicate(id, &digest)?;
                    }
                    catalog.record_action(
                        &ActionRecord::new(ActionKind::Copy, &item.origin, ActionOutcome::Skipped)
                            .with_reason("content already copied into destination"),
                    )?;
                }
                result.skipped_duplicates.push(item.origin.clone());
            }
            Ok(ItemOutcome::AlreadyPresent(destination)) => {
                copied_digests.insert(digest);
                log::info!(
                    "Already present: {} at {}",
                    item.origin.display(),
                    destination.display()
                );
                if !config.dry_run {
                    if let Some(id) = item.id {
                        catalog.mark_file_group_copied(id, &digest, &destination)?;
                    }
                    catalog.record_action(
                        &ActionRecord::new(ActionKind::Copy, &item.origin, ActionOutcome::Skipped)
                            .with_destination(&destination)
                            .with_reason("identical file already at destination"),
                    )?;
                }
                result.already_present.push(item.origin.clone());
            }
            Err(e) => record_failure(catalog, config, item, e.to_string(), &mut result)?,
        }

        if !config.dry_run {
            catalog.set_metadata(keys::LAST_PATH, &item.origin.to_string_lossy())?;
            catalog.set_metadata(keys::PROCESSED_COUNT, &(index + 1).to_string())?;
        }
    }

    if !config.dry_run && !result.interrupted {
        catalog.set_metadata(keys::LAST_COMPLETED_AT, &chrono::Utc::now().to_rfc3339())?;
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_phase_end("group");
    }

    log::info!("{}", result.summary());
    Ok(result)
}

/// Per-file failure while grouping.
#[derive(Debug, Error)]
enum GroupItemError {
    #[error("{0}")]
    Hash(#[from] HashError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("origin file unavailable: {0}")]
    Origin(#[source] io::Error),
    #[error("failed to copy to {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no free name for {0} after {MAX_COLLISION_SUFFIX} attempts")]
    NoFreeName(PathBuf),
}

fn record_failure(
    catalog: &mut Catalog,
    config: &GroupConfig,
    item: &CopyItem,
    reason: String,
    result: &mut GroupResult,
) -> Result<(), CatalogError> {
    log::warn!("Failed to group {}: {}", item.origin.display(), reason);
    if !config.dry_run {
        catalog.record_action(
            &ActionRecord::new(ActionKind::Copy, &item.origin, ActionOutcome::Failed)
                .with_reason(reason.clone()),
        )?;
    }
    result.failures.push((item.origin.clone(), reason));
    Ok(())
}

/// Catalog digest if the file is unchanged, else a fresh hash recorded in
/// the catalog.
fn obtain_digest(
    path: &Path,
    catalog: &mut Catalog,
    hasher: &Hasher,
    dry_run: bool,
) -> Result<Digest, GroupItemError> {
    let metadata = fs::metadata(path).map_err(GroupItemError::Origin)?;
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

    if let Some(entry) = catalog.lookup(path)? {
        if !entry.deleted && entry.matches_metadata(metadata.len(), modified) {
            return Ok(entry.digest);
        }
    }

    let digest = hasher.hash_file(path)?;
    if !dry_run {
        catalog.upsert(&NewEntry::new(path, digest, metadata.len(), modified))?;
    }
    Ok(digest)
}

/// Name for collision number `n`: `stem (n).ext`.
fn numbered_name(file_name: &str, n: u32) -> String {
    let path = Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) if !stem.is_empty() => format!(
            "{} ({}).{}",
            stem.to_string_lossy(),
            n,
            ext.to_string_lossy()
        ),
        _ => format!("{} ({})", file_name, n),
    }
}

/// Find the target name and copy, unless identical content is already
/// there.
fn place_copy(
    item: &CopyItem,
    digest: &Digest,
    hasher: &Hasher,
    dry_run: bool,
    claimed: &mut HashSet<PathBuf>,
) -> Result<ItemOutcome, GroupItemError> {
    for n in 0..=MAX_COLLISION_SUFFIX {
        let name = if n == 0 {
            item.file_name.clone()
        } else {
            numbered_name(&item.file_name, n)
        };
        let candidate = item.destination_dir.join(&name);

        if claimed.contains(&candidate) {
            continue;
        }
        match fs::symlink_metadata(&candidate) {
            Ok(m) if m.is_file() => {
                if hasher.hash_file(&candidate).ok().as_ref() == Some(digest) {
                    return Ok(ItemOutcome::AlreadyPresent(candidate));
                }
                continue;
            }
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(GroupItemError::Copy {
                    path: candidate,
                    source,
                })
            }
        }

        if dry_run {
            let size = fs::metadata(&item.origin)
                .map_err(GroupItemError::Origin)?
                .len();
            claimed.insert(candidate.clone());
            return Ok(ItemOutcome::Copied(candidate, size));
        }

        let size = copy_via_partial(&item.origin, &candidate).map_err(|source| {
            GroupItemError::Copy {
                path: candidate.clone(),
                source,
            }
        })?;
        return Ok(ItemOutcome::Copied(candidate, size));
    }
    Err(GroupItemError::NoFreeName(item.target()))
}

/// Copy `origin` to `target` through a fresh temp file in the target's
/// directory, keeping the origin's modification time and permissions.
///
/// The temp file is created exclusively and moved with `persist_noclobber`,
/// so an existing file at `target` is never replaced. It is removed on
/// failure.
fn copy_via_partial(origin: &Path, target: &Path) -> io::Result<u64> {
    let parent = target.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "target has no parent directory")
    })?;
    fs::create_dir_all(parent)?;

    let mut partial = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .suffix(PARTIAL_SUFFIX)
        .tempfile_in(parent)?;

    let mut source = fs::File::open(origin)?;
    let size = io::copy(&mut source, partial.as_file_mut())?;
    partial.as_file().sync_all()?;

    let metadata = source.metadata()?;
    let mtime = filetime::FileTime::from_last_modification_time(&metadata);
    filetime::set_file_mtime(partial.path(), mtime)?;
    fs::set_permissions(partial.path(), metadata.permissions())?;

    partial.persist_noclobber(target).map_err(|e| e.error)?;
    Ok(size)
}
