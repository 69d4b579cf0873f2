//! Turn catalog entries into duplicate groups.
//!
//! Grouping is by (digest, size). Size is carried as a second key so that a
//! digest collision between files of different lengths can never put them in
//! the same group; if that ever happens it is logged and the sizes are kept
//! apart. Within a group the entry with the lowest `seq` (found first) is
//! canonical.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::DuplicateGroup;
use crate::catalog::{Catalog, CatalogEntry, CatalogError};
use crate::scanner::Digest;

/// Group live entries by content. Pure: reads nothing, writes nothing.
///
/// Deleted entries are ignored. Singletons are dropped. Groups are ordered
/// by the `seq` of their canonical member.
#[must_use]
pub fn resolve(entries: impl IntoIterator<Item = CatalogEntry>) -> Vec<DuplicateGroup> {
    let mut by_key: HashMap<(Digest, u64), Vec<CatalogEntry>> = HashMap::new();
    let mut sizes_by_digest: HashMap<Digest, BTreeSet<u64>> = HashMap::new();

    for entry in entries.into_iter().filter(|e| !e.deleted) {
        sizes_by_digest
            .entry(entry.digest)
            .or_default()
            .insert(entry.size);
        by_key
            .entry((entry.digest, entry.size))
            .or_default()
            .push(entry);
    }

    for (digest, sizes) in &sizes_by_digest {
        if sizes.len() > 1 {
            log::warn!(
                "Digest {} is shared by files of different sizes {:?}; keeping them apart",
                digest,
                sizes
            );
        }
    }

    let mut groups: Vec<DuplicateGroup> = by_key
        .into_values()
        .filter_map(DuplicateGroup::new)
        .collect();
    groups.sort_by_key(|g| g.canonical().seq);

    log::debug!("Resolved {} duplicate groups", groups.len());
    groups
}

/// Result of resolving the whole catalog.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateReport {
    /// Groups ordered by their canonical member's `seq`
    pub groups: Vec<DuplicateGroup>,
    /// Σ (members − 1) over all groups
    pub duplicate_count: usize,
    /// Bytes reclaimable by removing every duplicate
    pub wasted_space: u64,
    /// Live entries that were considered
    pub total_entries: usize,
}

impl DuplicateReport {
    /// Build a report from resolved groups.
    #[must_use]
    pub fn new(groups: Vec<DuplicateGroup>, total_entries: usize) -> Self {
        let duplicate_count = groups.iter().map(DuplicateGroup::duplicate_count).sum();
        let wasted_space = groups
            .iter()
            .map(DuplicateGroup::wasted_space)
            .fold(0u64, u64::saturating_add);
        Self {
            groups,
            duplicate_count,
            wasted_space,
            total_entries,
        }
    }

    /// True when no duplicates were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Persist the `duplicate` flag: set on every non-canonical member,
    /// cleared everywhere else. Running it twice changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog update fails.
    pub fn mark(&self, catalog: &mut Catalog) -> Result<usize, CatalogError> {
        let seqs = self
            .groups
            .iter()
            .flat_map(|g| g.duplicates().iter().map(|m| m.seq));
        let marked = catalog.mark_duplicates(seqs)?;
        log::info!("Marked {} entries as duplicates", marked);
        Ok(marked)
    }
}

/// Resolve every live entry in the catalog.
///
/// # Errors
///
/// Returns an error if the catalog cannot be read.
pub fn compute_duplicates(catalog: &Catalog) -> Result<DuplicateReport, CatalogError> {
    let entries = catalog.live_entries()?;
    let total = entries.len();
    let report = DuplicateReport::new(resolve(entries), total);

    log::info!(
        "Found {} duplicate groups ({} duplicates, {} wasted) among {} files",
        report.groups.len(),
        report.duplicate_count,
        bytesize::ByteSize::b(report.wasted_space),
        report.total_entries
    );
    Ok(report)
}
