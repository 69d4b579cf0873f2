//! JSON output formatter.
//!
//! Provides machine-readable JSON output for scripting and automation.
//!
//! # Output Schema
//!
//! The duplicate report looks like:
//!
//! ```json
//! {
//!   "duplicates": [
//!     {
//!       "hash": "abc123...",
//!       "size": 1024,
//!       "canonical": "/path/to/a.txt",
//!       "duplicates": ["/path/to/b/a.txt"]
//!     }
//!   ],
//!   "summary": {
//!     "total_entries": 3,
//!     "duplicate_groups": 1,
//!     "duplicate_files": 1,
//!     "reclaimable_space": 1024,
//!     "exit_code": 0,
//!     "exit_code_name": "FT000"
//!   }
//! }
//! ```
//!
//! Scan, delete, group and status results are wrapped in a
//! [`JsonEnvelope`] with the same exit code fields.

use std::io::Write;

use serde::Serialize;

use crate::duplicates::{DuplicateGroup, DuplicateReport};
use crate::error::ExitCode;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// BLAKE3 hash as hexadecimal string (64 characters)
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// The copy that is kept
    pub canonical: String,
    /// Every other copy, in discovery order
    pub duplicates: Vec<String>,
}

impl JsonDuplicateGroup {
    #[must_use]
    pub fn from_duplicate_group(group: &DuplicateGroup) -> Self {
        Self {
            hash: group.digest.to_hex(),
            size: group.size,
            canonical: group.canonical().path.to_string_lossy().into_owned(),
            duplicates: group
                .duplicates()
                .iter()
                .map(|m| m.path.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Live catalog entries considered
    pub total_entries: usize,
    pub duplicate_groups: usize,
    /// Total number of duplicate files (excluding canonical copies)
    pub duplicate_files: usize,
    /// Bytes that removing every duplicate would free
    pub reclaimable_space: u64,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "FT000")
    pub exit_code_name: String,
}

/// Duplicate report in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    pub duplicates: Vec<JsonDuplicateGroup>,
    pub summary: JsonSummary,
}

impl JsonOutput {
    /// Build from a resolved report.
    ///
    /// # Example
    ///
    /// ```
    /// use filetidy::duplicates::DuplicateReport;
    /// use filetidy::error::ExitCode;
    /// use filetidy::output::json::JsonOutput;
    ///
    /// let output = JsonOutput::new(&DuplicateReport::default(), ExitCode::NoDuplicates);
    /// assert!(output.duplicates.is_empty());
    /// assert_eq!(output.summary.exit_code, 2);
    /// ```
    #[must_use]
    pub fn new(report: &DuplicateReport, exit_code: ExitCode) -> Self {
        Self {
            duplicates: report
                .groups
                .iter()
                .map(JsonDuplicateGroup::from_duplicate_group)
                .collect(),
            summary: JsonSummary {
                total_entries: report.total_entries,
                duplicate_groups: report.groups.len(),
                duplicate_files: report.duplicate_count,
                reclaimable_space: report.wasted_space,
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix().to_string(),
            },
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails (unlikely for valid data).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

/// Any result with the run's exit code attached.
#[derive(Debug, Clone, Serialize)]
pub struct JsonEnvelope<'a, T: Serialize> {
    /// `scan`, `delete`, `group` or `status`
    pub operation: &'static str,
    pub result: &'a T,
    pub exit_code: i32,
    pub exit_code_name: String,
}

impl<'a, T: Serialize> JsonEnvelope<'a, T> {
    #[must_use]
    pub fn new(operation: &'static str, result: &'a T, exit_code: ExitCode) -> Self {
        Self {
            operation,
            result,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }

    /// Write JSON to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        write_json(self, writer, pretty)
    }
}

fn write_json<T: Serialize, W: Write>(
    value: &T,
    writer: &mut W,
    pretty: bool,
) -> Result<(), JsonOutputError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
