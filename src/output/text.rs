//! Human-readable reports.
//!
//! Every writer takes any [`Write`] so the CLI can print to stdout and tests
//! can capture into a buffer. Sizes are rendered with `bytesize`.

use std::io::{self, Write};

use bytesize::ByteSize;

use super::StatusReport;
use crate::actions::{BatchDeleteResult, CopyPlan, DeletePlan, GroupResult};
use crate::duplicates::DuplicateReport;
use crate::scanner::ScanStats;

/// Scan counters followed by every failure.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_scan_stats<W: Write>(w: &mut W, stats: &ScanStats) -> io::Result<()> {
    writeln!(
        w,
        "Scanned {} files: {} new, {} updated, {} unchanged, {} stale, {} failed ({} hashed in {:.2?})",
        stats.files_seen,
        stats.inserted,
        stats.updated,
        stats.unchanged,
        stats.stale_skipped,
        stats.failed(),
        ByteSize::b(stats.bytes_hashed),
        stats.duration
    )?;
    for failure in &stats.failures {
        writeln!(w, "  failed: {} ({})", failure.path.display(), failure.reason)?;
    }
    if stats.interrupted {
        writeln!(w, "Scan interrupted; run it again to continue")?;
    }
    Ok(())
}

/// Every group with its canonical copy marked, then totals.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_duplicate_report<W: Write>(w: &mut W, report: &DuplicateReport) -> io::Result<()> {
    for (index, group) in report.groups.iter().enumerate() {
        writeln!(
            w,
            "Group {} ({} x {}, {})",
            index + 1,
            group.len(),
            ByteSize::b(group.size),
            group.digest
        )?;
        writeln!(w, "  keep    {}", group.canonical().path.display())?;
        for member in group.duplicates() {
            writeln!(w, "  dup     {}", member.path.display())?;
        }
    }
    writeln!(
        w,
        "{} duplicate groups, {} duplicate files, {} reclaimable ({} files cataloged)",
        report.groups.len(),
        report.duplicate_count,
        ByteSize::b(report.wasted_space),
        report.total_entries
    )
}

/// What a delete run will remove.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_delete_plan<W: Write>(w: &mut W, plan: &DeletePlan) -> io::Result<()> {
    for item in &plan.items {
        writeln!(w, "  delete  {}", item.path.display())?;
    }
    writeln!(
        w,
        "{} files ({}) will be permanently deleted",
        plan.len(),
        ByteSize::b(plan.total_bytes())
    )
}

/// Delete summary followed by skipped and failed items.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_delete_result<W: Write>(w: &mut W, result: &BatchDeleteResult) -> io::Result<()> {
    for (path, reason) in &result.skipped {
        writeln!(w, "  skipped: {} ({})", path.display(), reason)?;
    }
    for (path, reason) in &result.failures {
        writeln!(w, "  failed:  {} ({})", path.display(), reason)?;
    }
    writeln!(w, "{}", result.summary())
}

/// Planned copies grouped under their folders.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_copy_plan<W: Write>(w: &mut W, plan: &CopyPlan) -> io::Result<()> {
    writeln!(
        w,
        "{} files from {} into {} ({} pending)",
        plan.len(),
        plan.origin.display(),
        plan.destination.display(),
        plan.pending_count()
    )
}

/// Group summary followed by failures.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_group_result<W: Write>(w: &mut W, result: &GroupResult) -> io::Result<()> {
    for copied in &result.copied {
        writeln!(
            w,
            "  {} -> {}",
            copied.origin.display(),
            copied.destination.display()
        )?;
    }
    for (path, reason) in &result.failures {
        writeln!(w, "  failed: {} ({})", path.display(), reason)?;
    }
    writeln!(w, "{}", result.summary())
}

/// Catalog status.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_status<W: Write>(w: &mut W, status: &StatusReport) -> io::Result<()> {
    let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    writeln!(w, "Catalog:          {}", status.database.display())?;
    writeln!(w, "State:            {}", status.phase)?;
    writeln!(
        w,
        "Entries:          {} ({} live, {} marked duplicate)",
        status.entries, status.live_entries, status.duplicate_entries
    )?;
    writeln!(w, "Actions logged:   {}", status.actions)?;
    writeln!(w, "Last operation:   {}", or_none(&status.last_operation))?;
    writeln!(w, "Last root:        {}", or_none(&status.last_root))?;
    writeln!(
        w,
        "Progress:         {} / {}",
        or_none(&status.processed_count),
        or_none(&status.total_files)
    )?;
    writeln!(w, "Last completed:   {}", or_none(&status.last_completed_at))
}
