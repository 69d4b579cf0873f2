//! File actions module.
//!
//! This module provides functionality for:
//! - Permanent deletion of duplicates, keeping the canonical copy
//! - Copying files into per-extension or per-name folders
//!
//! Both actions are two-phase. A plan is built first and can be shown to the
//! user; executing it touches the filesystem and records every outcome in
//! the catalog.
//!
//! # Deletion
//!
//! Deletion is permanent. There is no trash and no undo.
//!
//! ```no_run
//! use filetidy::actions::{execute_delete, DeleteConfig, DeletePlan};
//! use filetidy::catalog::Catalog;
//! use filetidy::duplicates::compute_duplicates;
//! use std::path::Path;
//!
//! let mut catalog = Catalog::open(Path::new("hashdata.sqlite")).unwrap();
//! let plan = DeletePlan::from_report(&compute_duplicates(&catalog).unwrap());
//! let config = DeleteConfig::default().with_dry_run(true);
//! let result = execute_delete(&plan, &mut catalog, &config).unwrap();
//! println!("{}", result.summary());
//! ```
//!
//! # Grouping
//!
//! ```no_run
//! use filetidy::actions::{execute_grouping, plan_grouping, GroupConfig, GroupingMode};
//! use filetidy::catalog::Catalog;
//! use std::path::Path;
//!
//! let mut catalog = Catalog::open(Path::new("hashdata.sqlite")).unwrap();
//! let config = GroupConfig::new("/data/inbox", "/data/sorted").with_mode(GroupingMode::Extension);
//! let plan = plan_grouping(&config, &mut catalog).unwrap();
//! let result = execute_grouping(&plan, &mut catalog, &config).unwrap();
//! println!("{}", result.summary());
//! ```

pub mod delete;
pub mod group;

// Re-export commonly used types
pub use delete::{
    execute_delete, permanent_delete, validate_preserves_copy, BatchDeleteResult,
    DeleteBatchError, DeleteConfig, DeleteError, DeleteItem, DeletePlan, DeleteResult,
    FileSnapshot,
};
pub use group::{
    execute_grouping, plan_grouping, CopiedFile, CopyItem, CopyPlan, DuplicatePolicy,
    GroupConfig, GroupError, GroupResult, GroupingMode,
};
