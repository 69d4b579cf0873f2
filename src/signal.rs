//! Cooperative cancellation for long-running scans and batches.
//!
//! A single `AtomicBool` flag is shared by the walker, the hasher, the scanner
//! and the action executors. Ctrl+C sets it; every component checks it
//! between files, so an interrupted run leaves the catalog consistent with
//! the last completed file or action.
//!
//! ```rust,no_run
//! use filetidy::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let flag = handler.get_flag();
//! // Pass `flag` to ScannerConfig, DeleteConfig, GroupConfig...
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared cancellation flag.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no cancellation requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Get the flag for passing to workers.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag so the handler can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install a Ctrl+C handler that sets the shutdown flag.
///
/// Calling it again returns the already installed handler with its flag
/// cleared, so `run_app` can be invoked repeatedly (e.g. from tests).
///
/// # Errors
///
/// Never fails in practice: if another hook already owns the signal, an
/// unhooked handler is returned that still supports `request_shutdown()`.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(
            std::io::stderr(),
            "\nInterrupted. Finishing the current file..."
        );
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    match installed {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(GLOBAL_HANDLER.get().cloned().unwrap_or(handler))
        }
        Err(e) => {
            log::debug!("Ctrl+C handler unavailable ({}), using unhooked handler", e);
            let fallback = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone();
            fallback.reset();
            Ok(fallback)
        }
    }
}
