//! Scan pipeline: walk a tree, hash new or changed files, record them.
//!
//! Files are discovered sequentially in walk order. Files that need hashing
//! are collected into batches; each batch is hashed on a bounded rayon pool
//! and then written to the catalog in one transaction, in walk order. The
//! catalog therefore only ever holds complete entries, and insertion order
//! matches discovery order regardless of which hash finished first.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use super::{FileEntry, HashError, Hasher, ScanError, Walker, WalkerConfig, DEFAULT_BUFFER_SIZE};
use crate::catalog::{keys, Catalog, CatalogError, NewEntry, UpsertOutcome};
use crate::progress::ProgressCallback;

/// Configuration for a scan.
#[derive(Clone)]
pub struct ScannerConfig {
    /// Directory walking options.
    pub walker: WalkerConfig,
    /// Number of hashing threads. Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Files hashed and committed per catalog transaction.
    pub batch_size: usize,
    /// Re-hash files whose size or mtime changed since they were recorded.
    /// When false, such files keep their old entry.
    pub refresh_changed: bool,
    /// Read buffer size for hashing.
    pub buffer_size: usize,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for ScannerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerConfig")
            .field("walker", &self.walker)
            .field("io_threads", &self.io_threads)
            .field("batch_size", &self.batch_size)
            .field("refresh_changed", &self.refresh_changed)
            .field("buffer_size", &self.buffer_size)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            walker: WalkerConfig::default(),
            io_threads: 4,
            batch_size: 256,
            refresh_changed: true,
            buffer_size: DEFAULT_BUFFER_SIZE,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl ScannerConfig {
    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker(mut self, walker: WalkerConfig) -> Self {
        self.walker = walker;
        self
    }

    /// Set the number of hashing threads (at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the batch size (at least 1).
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Choose whether changed files are re-hashed.
    #[must_use]
    pub fn with_refresh_changed(mut self, refresh: bool) -> Self {
        self.refresh_changed = refresh;
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

/// Errors that abort a scan.
///
/// Per-file problems never end up here; they are collected in
/// [`ScanStats::failures`].
#[derive(thiserror::Error, Debug)]
pub enum ScannerError {
    /// The root cannot be scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The catalog failed; nothing after the last committed batch was written.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The hashing pool could not be started.
    #[error("Failed to start hashing threads: {0}")]
    ThreadPool(String),
}

/// A file that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Counters for one scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    /// Root that was scanned (canonical form)
    pub root: PathBuf,
    /// Regular files discovered by the walk
    pub files_seen: usize,
    /// New entries written
    pub inserted: usize,
    /// Existing entries overwritten after a re-hash
    pub updated: usize,
    /// Files skipped because path, size and mtime matched the catalog
    pub unchanged: usize,
    /// Changed files left alone because `refresh_changed` was off
    pub stale_skipped: usize,
    /// Files or directories that could not be read
    pub failures: Vec<ScanFailure>,
    /// Bytes read by the hasher
    pub bytes_hashed: u64,
    /// Wall-clock time of the scan
    pub duration: Duration,
    /// Whether the scan stopped early because cancellation was requested
    pub interrupted: bool,
}

impl ScanStats {
    /// Files hashed and written (inserted + updated).
    #[must_use]
    pub fn hashed(&self) -> usize {
        self.inserted + self.updated
    }

    /// Number of read failures.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    fn record_failure(&mut self, path: &Path, reason: impl Into<String>) {
        self.failures.push(ScanFailure {
            path: path.to_path_buf(),
            reason: reason.into(),
        });
    }

    /// Fold the counters of another scan into this one.
    pub fn merge(&mut self, other: ScanStats) {
        self.files_seen += other.files_seen;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.stale_skipped += other.stale_skipped;
        self.failures.extend(other.failures);
        self.bytes_hashed += other.bytes_hashed;
        self.duration += other.duration;
        self.interrupted |= other.interrupted;
    }
}

/// Walks directory trees and keeps the catalog in sync with them.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    config: ScannerConfig,
}

impl Scanner {
    #[must_use]
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Scan `root` and record every new or changed file in `catalog`.
    ///
    /// Unreadable files are counted as failures and the walk continues.
    /// If cancellation is requested, hashes completed so far are committed,
    /// `interrupted` is set and the scan returns normally.
    ///
    /// # Errors
    ///
    /// - [`ScannerError::Scan`] if the root is missing or not a directory
    /// - [`ScannerError::Catalog`] if the catalog cannot be read or written
    pub fn scan(&self, root: &Path, catalog: &mut Catalog) -> Result<ScanStats, ScannerError> {
        let start = Instant::now();

        Walker::new(root, self.config.walker.clone()).validate_root()?;
        let root = root
            .canonicalize()
            .map_err(|e| ScanError::from_io(root, e))?;

        let mut walker = Walker::new(&root, self.config.walker.clone());
        let mut hasher = Hasher::new().with_buffer_size(self.config.buffer_size);
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads.max(1))
            .build()
            .map_err(|e| ScannerError::ThreadPool(e.to_string()))?;

        let root_text = root.to_string_lossy();
        catalog.set_metadata(keys::LAST_OPERATION, "scan")?;
        catalog.set_metadata(keys::LAST_ROOT, &root_text)?;
        catalog.set_metadata(keys::PROCESSED_COUNT, "0")?;

        log::info!("Scanning {}", root.display());
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase_start("scan", 0);
        }

        let mut stats = ScanStats {
            root: root.clone(),
            ..Default::default()
        };
        let batch_size = self.config.batch_size.max(1);
        let mut batch: Vec<FileEntry> = Vec::with_capacity(batch_size);

        for result in walker.walk() {
            let file = match result {
                Ok(file) => file,
                Err(e) => {
                    log::warn!("Skipping {}: {}", e.path().display(), e);
                    stats.record_failure(e.path(), e.to_string());
                    continue;
                }
            };

            stats.files_seen += 1;
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_progress(stats.files_seen, &file.path.to_string_lossy());
            }

            if let Some(existing) = catalog.lookup(&file.path)? {
                if !existing.deleted {
                    if existing.matches_metadata(file.size, file.modified) {
                        log::trace!("Unchanged: {}", file.path.display());
                        stats.unchanged += 1;
                        continue;
                    }
                    if !self.config.refresh_changed {
                        log::debug!("Changed but not refreshed: {}", file.path.display());
                        stats.stale_skipped += 1;
                        continue;
                    }
                }
            }

            batch.push(file);
            if batch.len() >= batch_size {
                self.flush_batch(&pool, &hasher, &mut batch, catalog, &mut stats)?;
            }

            if self.config.is_shutdown_requested() {
                break;
            }
        }

        self.flush_batch(&pool, &hasher, &mut batch, catalog, &mut stats)?;

        stats.interrupted = self.config.is_shutdown_requested();
        stats.duration = start.elapsed();

        catalog.set_metadata(keys::TOTAL_FILES, &stats.files_seen.to_string())?;
        if !stats.interrupted {
            catalog.set_metadata(keys::LAST_COMPLETED_AT, &chrono::Utc::now().to_rfc3339())?;
        }

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_phase_end("scan");
        }

        if stats.interrupted {
            log::warn!(
                "Scan of {} interrupted after {} files ({} hashed)",
                root.display(),
                stats.files_seen,
                stats.hashed()
            );
        } else {
            log::info!(
                "Scanned {}: {} files, {} hashed, {} unchanged, {} failed in {:.2?}",
                root.display(),
                stats.files_seen,
                stats.hashed(),
                stats.unchanged,
                stats.failed(),
                stats.duration
            );
        }

        Ok(stats)
    }

    /// Hash `batch` on the pool and commit the results in one transaction.
    fn flush_batch(
        &self,
        pool: &rayon::ThreadPool,
        hasher: &Hasher,
        batch: &mut Vec<FileEntry>,
        catalog: &mut Catalog,
        stats: &mut ScanStats,
    ) -> Result<(), ScannerError> {
        if batch.is_empty() {
            return Ok(());
        }

        let files = std::mem::take(batch);
        // Indexed collect keeps walk order
        let results: Vec<(FileEntry, Result<_, HashError>)> = pool.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    let digest = hasher.hash_file(&file.path);
                    (file, digest)
                })
                .collect()
        });

        let mut entries = Vec::with_capacity(results.len());
        let mut bytes = 0u64;
        for (file, result) in results {
            match result {
                Ok(digest) => {
                    bytes += file.size;
                    entries.push(NewEntry::new(file.path, digest, file.size, file.modified));
                }
                Err(HashError::Interrupted(path)) => {
                    log::debug!("Dropped in-flight hash: {}", path.display());
                }
                Err(e) => {
                    log::warn!("Failed to hash {}: {}", file.path.display(), e);
                    stats.record_failure(&file.path, e.to_string());
                }
            }
        }

        for outcome in catalog.upsert_batch(&entries)? {
            match outcome {
                UpsertOutcome::Inserted => stats.inserted += 1,
                UpsertOutcome::Updated => stats.updated += 1,
            }
        }
        stats.bytes_hashed += bytes;

        if let Some(ref cb) = self.config.progress_callback {
            for entry in &entries {
                cb.on_item_completed(entry.size);
            }
        }

        catalog.set_metadata(keys::PROCESSED_COUNT, &stats.hashed().to_string())?;
        log::debug!("Committed batch of {} entries", entries.len());
        Ok(())
    }
}
