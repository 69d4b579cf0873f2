//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! [`Walker`] enumerates every regular file beneath a root directory in a
//! deterministic depth-first pre-order: entries of each directory are
//! visited in byte-wise name order, and a subdirectory's contents come
//! right after the subdirectory itself. The same tree always yields the same
//! sequence, which is what makes "first found is canonical" stable.
//!
//! # Features
//!
//! - Parallel directory reading using jwalk's rayon pool
//! - Symlinks skipped unless explicitly followed
//! - Version-control directories (`.git`, `GIT`) pruned
//! - Gitignore-style pattern matching via the `ignore` crate
//! - Size filtering (min/max); empty files are kept
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use filetidy::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{FileEntry, ScanError, WalkerConfig};

/// Directory names that hold version-control metadata.
const VCS_DIR_NAMES: &[&str] = &[".git", "GIT"];

/// Directory walker for deterministic file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag becomes `true`, iteration stops before the next entry.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Root directory being walked.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Check that the root exists and is a directory.
    ///
    /// # Errors
    ///
    /// [`ScanError::NotFound`], [`ScanError::NotADirectory`] or
    /// [`ScanError::PermissionDenied`] for an unusable root.
    pub fn validate_root(&self) -> Result<(), ScanError> {
        let metadata =
            std::fs::metadata(&self.root).map_err(|e| ScanError::from_io(&self.root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }
        Ok(())
    }

    /// Build gitignore matcher from config patterns and the root's .gitignore.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.exists() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            } else {
                log::debug!("Loaded .gitignore from {}", gitignore_path.display());
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Check if a file passes size filters.
    fn passes_size_filter(&self, size: u64) -> bool {
        if self.config.min_size.is_some_and(|min| size < min) {
            return false;
        }
        if self.config.max_size.is_some_and(|max| size > max) {
            return false;
        }
        true
    }

    /// Walk the directory tree, yielding file entries.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration; an unreadable subdirectory only loses its own contents.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileEntry, ScanError>> + '_ {
        let gitignore = self.build_gitignore();
        let root = self.root.clone();
        let skip_vcs = self.config.skip_vcs_dirs;

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                children.retain(|child| match child {
                    Ok(entry) => {
                        let is_dir = entry.file_type().is_dir();
                        if is_dir && skip_vcs && is_vcs_dir(entry.file_name()) {
                            log::trace!("Skipping VCS directory: {}", entry.path().display());
                            return false;
                        }
                        if is_ignored(&root, &entry.path(), is_dir, gitignore.as_ref()) {
                            log::trace!("Ignoring: {}", entry.path().display());
                            return false;
                        }
                        true
                    }
                    Err(_) => true,
                });
                // Byte-wise name order keeps the traversal deterministic
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if entry.depth() == 0 {
                        return None;
                    }

                    let path = entry.path();
                    let file_type = entry.file_type();

                    if file_type.is_dir() {
                        return None;
                    }

                    let is_symlink = file_type.is_symlink() || entry.path_is_symlink();
                    if is_symlink && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    let metadata = if self.config.follow_symlinks {
                        std::fs::metadata(&path)
                    } else {
                        std::fs::symlink_metadata(&path)
                    };

                    let metadata = match metadata {
                        Ok(m) => m,
                        Err(e) => return Some(Err(self.handle_io_error(&path, e))),
                    };

                    if !metadata.is_file() {
                        return None;
                    }

                    let size = metadata.len();
                    if !self.passes_size_filter(size) {
                        log::trace!(
                            "Skipping file due to size filter ({}): {}",
                            size,
                            path.display()
                        );
                        return None;
                    }

                    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

                    Some(Ok(FileEntry {
                        path,
                        size,
                        modified,
                        is_symlink,
                    }))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                    Some(Err(ScanError::from_io(&path, source)))
                }
            })
    }

    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        let err = ScanError::from_io(path, error);
        match err {
            ScanError::NotFound(_) => {
                log::debug!("File not found (may have been deleted): {}", path.display());
            }
            _ => log::warn!("{}", err),
        }
        err
    }
}

fn is_vcs_dir(name: &OsStr) -> bool {
    VCS_DIR_NAMES.iter().any(|vcs| name == OsStr::new(vcs))
}

fn is_ignored(root: &Path, path: &Path, is_dir: bool, gitignore: Option<&Gitignore>) -> bool {
    let Some(gi) = gitignore else {
        return false;
    };
    let relative_path = path.strip_prefix(root).unwrap_or(path);
    let path_str = relative_path.to_string_lossy();
    let normalized_path = if cfg!(windows) {
        path_str.replace('\\', "/")
    } else {
        path_str.into_owned()
    };
    gi.matched(normalized_path, is_dir).is_ignore()
}
