//! Append-only CSV output, one file per calendar date.
//!
//! Layout: `<output_dir>/<YYYY>/<MM>/<YYYY>-<MM>-<DD>-coords.csv`.
//! Directories are created lazily on first write; the file handle is opened
//! in append mode and closed before returning, so repeated calls for the
//! same date (later batches, or a re-run after a crash) accumulate appends.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::fetch::CoordRow;

/// Target CSV path for `date` under `output_dir`.
pub fn csv_path(output_dir: &Path, date: NaiveDate) -> PathBuf {
    output_dir
        .join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
        .join(format!("{}-coords.csv", date.format("%Y-%m-%d")))
}

/// Append `rows` to the CSV file for `date`.
///
/// Rows are written in the given order, every field verbatim, standard CSV
/// quoting, no header.
pub fn write_rows(output_dir: &Path, date: NaiveDate, rows: &[CoordRow]) -> Result<()> {
    let path = csv_path(output_dir, date);

    let dir = path
        .parent()
        .context("output path has no parent directory")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open '{}' for append", path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    for row in rows {
        writer.write_record(&row.fields)?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush '{}'", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn row(id: u64, fields: &[&str]) -> CoordRow {
        CoordRow {
            id,
            timestamp: chrono::NaiveDateTime::parse_from_str(
                "2013-10-03 00:00:00",
                "%Y-%m-%d %H:%M:%S",
            )
            .unwrap(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn path_follows_year_month_layout() {
        let date = NaiveDate::from_ymd_opt(2013, 10, 3).unwrap();
        assert_eq!(
            csv_path(Path::new("out"), date),
            Path::new("out/2013/10/2013-10-03-coords.csv")
        );
    }

    #[test]
    fn writes_create_directories_and_file() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2013, 10, 3).unwrap();

        write_rows(dir.path(), date, &[row(1, &["1", "42.7", "23.3"])]).unwrap();

        let content = std::fs::read_to_string(csv_path(dir.path(), date)).unwrap();
        assert_eq!(content, "1,42.7,23.3\n");
    }

    #[test]
    fn repeated_writes_append() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2013, 10, 3).unwrap();

        write_rows(dir.path(), date, &[row(1, &["1", "a"])]).unwrap();
        write_rows(dir.path(), date, &[row(2, &["2", "b"]), row(3, &["3", "c"])]).unwrap();

        let content = std::fs::read_to_string(csv_path(dir.path(), date)).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.starts_with("1,a\n2,b\n"));
    }

    #[test]
    fn fields_with_separators_are_quoted() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2013, 10, 3).unwrap();

        write_rows(
            dir.path(),
            date,
            &[row(1, &["1", "Sofia, center", "say \"hi\""])],
        )
        .unwrap();

        let content = std::fs::read_to_string(csv_path(dir.path(), date)).unwrap();
        assert_eq!(content, "1,\"Sofia, center\",\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn unwritable_target_is_an_error() {
        let dir = TempDir::new().unwrap();
        // Occupy the year directory slot with a plain file.
        std::fs::write(dir.path().join("2013"), b"not a directory").unwrap();
        let date = NaiveDate::from_ymd_opt(2013, 10, 3).unwrap();

        assert!(write_rows(dir.path(), date, &[row(1, &["1"])]).is_err());
    }
}
