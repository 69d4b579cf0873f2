//! Output formatters for catalog reports and action results.
//!
//! This module provides two formats:
//! - [`text`] for people
//! - [`json`] for automation and scripting
//!
//! # Example
//!
//! ```no_run
//! use filetidy::catalog::Catalog;
//! use filetidy::duplicates::compute_duplicates;
//! use filetidy::error::ExitCode;
//! use filetidy::output::json::JsonOutput;
//! use std::path::Path;
//!
//! let catalog = Catalog::open(Path::new("hashdata.sqlite")).unwrap();
//! let report = compute_duplicates(&catalog).unwrap();
//!
//! let output = JsonOutput::new(&report, ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::catalog::{keys, Catalog, CatalogError};

// Re-export main types
pub use json::{JsonEnvelope, JsonOutput, JsonOutputError};

/// Snapshot of what the catalog holds and what ran last.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub database: PathBuf,
    /// Stored workflow phase
    pub phase: String,
    pub entries: usize,
    pub live_entries: usize,
    /// Live entries flagged as non-canonical copies
    pub duplicate_entries: usize,
    pub actions: usize,
    pub last_operation: Option<String>,
    pub last_root: Option<String>,
    pub processed_count: Option<String>,
    pub total_files: Option<String>,
    pub last_completed_at: Option<String>,
}

impl StatusReport {
    /// Read the status of `catalog`, stored at `database`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn collect(catalog: &Catalog, database: &Path) -> Result<Self, CatalogError> {
        let entries = catalog.all_entries()?;
        Ok(Self {
            database: database.to_path_buf(),
            phase: catalog
                .get_metadata(keys::OPERATION_STATE)?
                .unwrap_or_else(|| "idle".to_string()),
            entries: entries.len(),
            live_entries: entries.iter().filter(|e| !e.deleted).count(),
            duplicate_entries: entries.iter().filter(|e| e.duplicate && !e.deleted).count(),
            actions: catalog.actions()?.len(),
            last_operation: catalog.get_metadata(keys::LAST_OPERATION)?,
            last_root: catalog.get_metadata(keys::LAST_ROOT)?,
            processed_count: catalog.get_metadata(keys::PROCESSED_COUNT)?,
            total_files: catalog.get_metadata(keys::TOTAL_FILES)?,
            last_completed_at: catalog.get_metadata(keys::LAST_COMPLETED_AT)?,
        })
    }
}
