//! filetidy - Bulk Filesystem Maintenance
//!
//! A cross-platform Rust CLI for finding and removing duplicate files by
//! content hash (BLAKE3) and for grouping files into directories by
//! extension or name. Scan results live in a persistent SQLite catalog so
//! scans are incremental, resumable, and can span several root directories.

pub mod actions;
pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod workflow;

pub use app::run_app;
