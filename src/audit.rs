//! Gap auditor: which daily files exist in the output tree, which don't.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;

/// Result of scanning the output tree across a date range.
#[derive(Debug, Default)]
pub struct AuditReport {
    /// Paths matching some date in the range, in range order then walk order.
    pub found: Vec<PathBuf>,
    /// Dates with no matching file anywhere under the output directory.
    pub missing: Vec<NaiveDate>,
}

/// Check `[start, end)` for daily files under `output_dir`.
///
/// A date counts as found if at least one filename anywhere in the tree
/// starts with its ISO form (`YYYY-MM-DD`). Pure reporting, the tree is
/// never modified. A missing output directory simply reports every date as
/// missing.
pub fn audit(output_dir: &Path, start: NaiveDate, end: NaiveDate) -> Result<AuditReport> {
    let mut files = Vec::new();
    collect_files(output_dir, &mut files)?;
    files.sort();

    let mut report = AuditReport::default();

    let mut date = start;
    while date < end {
        let prefix = date.format("%Y-%m-%d").to_string();
        let mut exists = false;

        for path in &files {
            let matches = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix));
            if matches {
                report.found.push(path.clone());
                exists = true;
            }
        }

        if !exists {
            report.missing.push(date);
        }

        date = date
            .succ_opt()
            .ok_or_else(|| anyhow!("date range overflow after {date}"))?;
    }

    Ok(report)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }

    Ok(())
}
