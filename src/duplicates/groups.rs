//! Duplicate groups derived from catalog entries.
//!
//! # Example
//!
//! ```
//! use filetidy::catalog::CatalogEntry;
//! use filetidy::duplicates::DuplicateGroup;
//! use filetidy::scanner::Digest;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let entry = |seq: i64, path: &str| CatalogEntry {
//!     seq,
//!     path: PathBuf::from(path),
//!     digest: Digest::from_bytes([1; 32]),
//!     size: 100,
//!     modified: SystemTime::UNIX_EPOCH,
//!     scanned_at: chrono::Utc::now(),
//!     duplicate: false,
//!     deleted: false,
//! };
//!
//! let group = DuplicateGroup::new(vec![entry(1, "/a.txt"), entry(2, "/b/a.txt")]).unwrap();
//! assert_eq!(group.canonical().path, PathBuf::from("/a.txt"));
//! assert_eq!(group.duplicate_count(), 1);
//! assert_eq!(group.wasted_space(), 100);
//! ```

use std::path::PathBuf;

use serde::Serialize;

use crate::catalog::CatalogEntry;
use crate::scanner::Digest;

/// Two or more live entries with identical content.
///
/// Members are ordered by `seq`; the first member is the canonical copy and
/// is never a candidate for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Shared content digest
    pub digest: Digest,
    /// Shared file size in bytes
    pub size: u64,
    /// Members in insertion order
    pub members: Vec<CatalogEntry>,
}

impl DuplicateGroup {
    /// Build a group from members sharing a digest and size.
    ///
    /// Members are sorted by `seq`. Returns `None` for fewer than two
    /// members or if digests or sizes disagree.
    #[must_use]
    pub fn new(mut members: Vec<CatalogEntry>) -> Option<Self> {
        if members.len() < 2 {
            return None;
        }
        let digest = members[0].digest;
        let size = members[0].size;
        if members.iter().any(|m| m.digest != digest || m.size != size) {
            return None;
        }
        members.sort_by_key(|m| m.seq);
        Some(Self {
            digest,
            size,
            members,
        })
    }

    /// The first-found member, kept by every action.
    #[must_use]
    pub fn canonical(&self) -> &CatalogEntry {
        &self.members[0]
    }

    /// Every member except the canonical one.
    #[must_use]
    pub fn duplicates(&self) -> &[CatalogEntry] {
        &self.members[1..]
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for a constructed group; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of duplicate copies (total - 1 canonical).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size.saturating_mul(self.members.len() as u64)
    }

    /// Space reclaimable by removing every duplicate.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size.saturating_mul(self.duplicate_count() as u64)
    }

    /// Paths of all members, canonical first.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.path.clone()).collect()
    }
}
