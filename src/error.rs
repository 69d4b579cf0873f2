//! Structured error handling and exit codes.

use serde::Serialize;

/// Exit codes for the filetidy application.
///
/// - 0: Success (operation completed, nothing failed)
/// - 1: General error (catalog failure or unexpected error)
/// - 2: No duplicates found
/// - 3: Partial success (some files failed, the rest were processed)
/// - 4: Configuration error (refused before touching the filesystem)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: The operation completed without per-file failures.
    Success = 0,
    /// General error: An unexpected or catalog error occurred.
    GeneralError = 1,
    /// No duplicates: The catalog holds no duplicate groups.
    NoDuplicates = 2,
    /// Partial success: Completed, but some files could not be processed.
    PartialSuccess = 3,
    /// Configuration error: Invalid inputs were rejected up front.
    ConfigurationError = 4,
    /// Interrupted: The operation was cancelled by the user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "FT000",
            Self::GeneralError => "FT001",
            Self::NoDuplicates => "FT002",
            Self::PartialSuccess => "FT003",
            Self::ConfigurationError => "FT004",
            Self::Interrupted => "FT130",
        }
    }

    /// Pick the exit code for a finished batch.
    #[must_use]
    pub fn for_batch(interrupted: bool, failures: usize) -> Self {
        if interrupted {
            Self::Interrupted
        } else if failures > 0 {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "FT001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
