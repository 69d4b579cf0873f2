//! Workflow state machine shared by the delete and group operations.
//!
//! ```text
//! Idle ──scan──▶ Scanning ──ok──▶ Ready ──delete/group──▶ Executing ──ok──▶ Idle
//!  ▲                │               │ ▲                        │
//!  └────failed──────┘               └─┘ rescan / resolve        └──failed──▶ Ready
//! ```
//!
//! The [`Workflow`] owns the [`Catalog`] and mirrors its phase into the
//! catalog's `operation_state` metadata, so `status` can report it and a
//! later process can pick it up with [`Workflow::from_existing`].

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::actions::delete::{
    execute_delete, BatchDeleteResult, DeleteBatchError, DeleteConfig, DeletePlan,
};
use crate::actions::group::{
    execute_grouping, plan_grouping, CopyPlan, GroupConfig, GroupError, GroupResult,
};
use crate::catalog::{keys, Catalog, CatalogError};
use crate::duplicates::{compute_duplicates, DuplicateReport};
use crate::scanner::{ScanStats, Scanner, ScannerError};

/// Workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing scanned since the last completed action
    Idle,
    Scanning,
    /// Catalog holds a usable scan; duplicates can be resolved and acted on
    Ready,
    Executing,
}

impl Phase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Ready => "ready",
            Self::Executing => "executing",
        }
    }

    /// Parse a stored phase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "scanning" => Some(Self::Scanning),
            "ready" => Some(Self::Ready),
            "executing" => Some(Self::Executing),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow errors.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The requested step is not allowed in the current phase.
    #[error("cannot {action} while {from}")]
    InvalidTransition { from: Phase, action: &'static str },

    /// A scan failed; the workflow is back to idle. `partial` holds what
    /// was cataloged before the failure.
    #[error("scan of {root} failed: {source}")]
    ScanFailed {
        root: PathBuf,
        partial: Box<ScanStats>,
        #[source]
        source: ScannerError,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Delete(#[from] DeleteBatchError),

    #[error(transparent)]
    Group(#[from] GroupError),
}

/// Drives scan, resolve and execute over one catalog.
#[derive(Debug)]
pub struct Workflow {
    catalog: Catalog,
    phase: Phase,
    report: Option<DuplicateReport>,
}

impl Workflow {
    /// Start a fresh workflow in [`Phase::Idle`].
    ///
    /// # Errors
    ///
    /// Returns an error if the phase cannot be recorded.
    pub fn new(catalog: Catalog) -> Result<Self, CatalogError> {
        let mut workflow = Self {
            catalog,
            phase: Phase::Idle,
            report: None,
        };
        workflow.set_phase(Phase::Idle)?;
        Ok(workflow)
    }

    /// Resume from the phase stored in the catalog.
    ///
    /// A run that died while scanning resumes as idle and one that died
    /// while executing resumes as ready. A catalog that holds live entries
    /// is ready even when stored as idle, since its contents are a complete
    /// record of the last scan minus what was since deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or written.
    pub fn from_existing(catalog: Catalog) -> Result<Self, CatalogError> {
        let stored = catalog
            .get_metadata(keys::OPERATION_STATE)?
            .as_deref()
            .and_then(Phase::parse);
        let has_entries = catalog.live_entry_count()? > 0;

        let phase = match stored {
            Some(Phase::Scanning) => {
                log::warn!("Previous scan did not finish; rescan to complete the catalog");
                if has_entries {
                    Phase::Ready
                } else {
                    Phase::Idle
                }
            }
            Some(Phase::Executing) => {
                log::warn!("Previous action did not finish; its progress is in the action log");
                Phase::Ready
            }
            _ if has_entries => Phase::Ready,
            _ => Phase::Idle,
        };

        let mut workflow = Self {
            catalog,
            phase,
            report: None,
        };
        workflow.set_phase(phase)?;
        Ok(workflow)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Most recent duplicate report, if resolved since the last scan.
    #[must_use]
    pub fn report(&self) -> Option<&DuplicateReport> {
        self.report.as_ref()
    }

    /// Give the catalog back.
    #[must_use]
    pub fn into_catalog(self) -> Catalog {
        self.catalog
    }

    fn set_phase(&mut self, phase: Phase) -> Result<(), CatalogError> {
        log::debug!("Workflow phase {} -> {}", self.phase, phase);
        self.phase = phase;
        self.catalog.set_metadata(keys::OPERATION_STATE, phase.as_str())
    }

    fn require(&self, allowed: &[Phase], action: &'static str) -> Result<(), WorkflowError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                from: self.phase,
                action,
            })
        }
    }

    /// Scan each root in turn into the catalog.
    ///
    /// Allowed from idle or ready. Entries accumulate across roots and
    /// across calls. An interrupted scan still ends ready: everything it
    /// committed is valid.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::InvalidTransition`] outside idle/ready
    /// - [`WorkflowError::ScanFailed`] if a root is unusable or the catalog
    ///   fails; the phase is idle afterwards
    pub fn scan(
        &mut self,
        scanner: &Scanner,
        roots: &[PathBuf],
    ) -> Result<ScanStats, WorkflowError> {
        self.require(&[Phase::Idle, Phase::Ready], "scan")?;
        self.set_phase(Phase::Scanning)?;
        self.report = None;

        let mut total = ScanStats::default();
        for root in roots {
            match scanner.scan(root, &mut self.catalog) {
                Ok(stats) => {
                    let interrupted = stats.interrupted;
                    total.merge(stats);
                    if interrupted {
                        break;
                    }
                }
                Err(source) => {
                    log::error!("Scan of {} failed: {}", root.display(), source);
                    if let Err(e) = self.set_phase(Phase::Idle) {
                        log::error!("Failed to record idle state: {}", e);
                    }
                    return Err(WorkflowError::ScanFailed {
                        root: root.clone(),
                        partial: Box::new(total),
                        source,
                    });
                }
            }
        }

        self.set_phase(Phase::Ready)?;
        Ok(total)
    }

    /// Resolve duplicate groups; with `mark`, persist the duplicate flags.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::InvalidTransition`] unless ready, or a catalog error.
    pub fn resolve(&mut self, mark: bool) -> Result<&DuplicateReport, WorkflowError> {
        self.require(&[Phase::Ready], "resolve duplicates")?;
        let report = compute_duplicates(&self.catalog)?;
        if mark {
            report.mark(&mut self.catalog)?;
        }
        Ok(self.report.insert(report))
    }

    /// Run a delete plan.
    ///
    /// A completed run ends idle. A dry run or an interrupted run stays
    /// ready, and so does a failed one.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::InvalidTransition`] unless ready, or the executor's
    /// batch error.
    pub fn delete(
        &mut self,
        plan: &DeletePlan,
        config: &DeleteConfig,
    ) -> Result<BatchDeleteResult, WorkflowError> {
        self.require(&[Phase::Ready], "delete")?;
        self.set_phase(Phase::Executing)?;

        match execute_delete(plan, &mut self.catalog, config) {
            Ok(result) => {
                self.report = None;
                let next = if result.dry_run || result.interrupted {
                    Phase::Ready
                } else {
                    Phase::Idle
                };
                self.set_phase(next)?;
                Ok(result)
            }
            Err(e) => {
                self.recover_to_ready();
                Err(e.into())
            }
        }
    }

    /// Build a grouping plan. Allowed when ready.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::InvalidTransition`] unless ready, or a planning error.
    pub fn plan_group(&mut self, config: &GroupConfig) -> Result<CopyPlan, WorkflowError> {
        self.require(&[Phase::Ready], "plan grouping")?;
        Ok(plan_grouping(config, &mut self.catalog)?)
    }

    /// Run a grouping plan, with the same phase rules as [`Workflow::delete`].
    ///
    /// # Errors
    ///
    /// [`WorkflowError::InvalidTransition`] unless ready, or the executor's
    /// error.
    pub fn group(
        &mut self,
        plan: &CopyPlan,
        config: &GroupConfig,
    ) -> Result<GroupResult, WorkflowError> {
        self.require(&[Phase::Ready], "group")?;
        self.set_phase(Phase::Executing)?;

        match execute_grouping(plan, &mut self.catalog, config) {
            Ok(result) => {
                let next = if result.dry_run || result.interrupted {
                    Phase::Ready
                } else {
                    Phase::Idle
                };
                self.set_phase(next)?;
                Ok(result)
            }
            Err(e) => {
                self.recover_to_ready();
                Err(e.into())
            }
        }
    }

    fn recover_to_ready(&mut self) {
        if let Err(e) = self.set_phase(Phase::Ready) {
            log::error!("Failed to record ready state: {}", e);
        }
    }
}
