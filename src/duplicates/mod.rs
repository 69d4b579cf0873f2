//! Duplicate detection over the catalog.
//!
//! This module provides functionality for:
//! - Grouping catalog entries by content digest and size
//! - Designating the first-found member of each group as canonical
//! - Persisting the duplicate flag back into the catalog

pub mod groups;
pub mod resolver;

pub use groups::DuplicateGroup;
pub use resolver::{compute_duplicates, resolve, DuplicateReport};
