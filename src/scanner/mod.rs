//! Scanner module for directory traversal, file hashing and cataloging.
//!
//! This module provides functionality for:
//! - Deterministic directory walking using jwalk
//! - Streaming content hashing with BLAKE3
//! - Incremental scans that record each file into the [`Catalog`](crate::catalog::Catalog)
//!
//! # Architecture
//!
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: BLAKE3 file hashing (streaming, bounded memory)
//! - [`scan`]: The scan pipeline tying walker, hasher and catalog together
//!
//! # Example
//!
//! ```no_run
//! use filetidy::catalog::Catalog;
//! use filetidy::scanner::{Scanner, ScannerConfig};
//! use std::path::Path;
//!
//! let mut catalog = Catalog::open(Path::new("hashdata.sqlite")).unwrap();
//! let scanner = Scanner::new(ScannerConfig::default());
//! let stats = scanner.scan(Path::new("/home/user/Photos"), &mut catalog).unwrap();
//! println!("{} files hashed, {} failed", stats.hashed(), stats.failed());
//! ```

pub mod hasher;
pub mod scan;
pub mod walker;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub use hasher::{Digest, DigestParseError, Hasher, DEFAULT_BUFFER_SIZE};
pub use scan::{ScanFailure, ScanStats, Scanner, ScannerConfig, ScannerError};
pub use walker::Walker;

/// Metadata for a discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Whether this file was reached through a followed symbolic link
    pub is_symlink: bool,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            is_symlink: false,
        }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Off by default: symlinks are skipped so cycles cannot occur.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Skip version-control metadata directories (`.git`, `GIT`).
    pub skip_vcs_dirs: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            skip_hidden: false,
            skip_vcs_dirs: true,
            min_size: None,
            max_size: None,
            ignore_patterns: Vec::new(),
        }
    }
}

impl WalkerConfig {
    /// Set the minimum file size filter.
    #[must_use]
    pub fn with_min_size(mut self, min_size: Option<u64>) -> Self {
        self.min_size = min_size;
        self
    }

    /// Set the maximum file size filter.
    #[must_use]
    pub fn with_max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the ignore patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for `path`.
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur during file hashing.
///
/// A hash failure only ever skips the file concerned.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Hashing stopped because cancellation was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for `path`.
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
