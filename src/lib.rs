//! coord-dump library
//!
//! A tool for incrementally exporting geocoordinate records from a MySQL
//! table into date-partitioned CSV files.
//!
//! # Features
//!
//! - Batched export: rows are fetched in bounded, id-ordered batches
//! - Reliable checkpointing: the last exported row id is persisted after
//!   every batch, so a re-run resumes instead of re-exporting
//! - Date partitioning: each batch is bucketed by the calendar date of its
//!   timestamp column and appended to per-date CSV files
//! - Gap auditing: a companion subcommand reports which daily files are
//!   missing from the output tree across a date range
//!
//! # CLI Usage
//!
//! ```bash
//! # Export everything, resuming from the progress file if present
//! coord-dump export --db-database geo --db-user geo --db-pass secret \
//!   --db-table coords --output-dir ./output
//!
//! # Report daily files missing between two dates (end exclusive)
//! coord-dump audit --start-date 2013-10-01 --end-date 2013-11-01 \
//!   --output-dir ./output
//! ```
//!
//! # Resumability contract
//!
//! CSV appends happen before the cursor is persisted. A crash between a
//! successful append and the checkpoint means the next run re-fetches and
//! re-appends that batch; downstream consumers must tolerate duplicate rows
//! or de-duplicate by row id.

use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::Parser;

pub mod audit;
pub mod connect;
pub mod export;
pub mod fetch;
pub mod partition;
pub mod progress;
pub mod sink;

/// Options for the `export` subcommand.
#[derive(Parser, Clone, Debug)]
pub struct ExportOpts {
    /// Database host
    #[arg(long, default_value = "127.0.0.1")]
    pub db_host: String,

    /// Database name
    #[arg(long)]
    pub db_database: String,

    /// Database user
    #[arg(long)]
    pub db_user: String,

    /// Database password
    #[arg(long, env = "COORD_DUMP_DB_PASS")]
    pub db_pass: String,

    /// Database port
    #[arg(long, default_value = "3306")]
    pub db_port: u16,

    /// Database table holding the coordinate records
    #[arg(long)]
    pub db_table: String,

    /// Directory the per-date CSV files are written to
    #[arg(long, default_value = "./output")]
    pub output_dir: PathBuf,

    /// File tracking the last exported row id
    #[arg(long, default_value = "./coord-dump.progress")]
    pub progress_file: PathBuf,

    /// Number of records to export (0 = all records)
    #[arg(long, default_value = "0")]
    pub max_records: u64,

    /// Number of records fetched from the database in one pass
    #[arg(long, default_value = "1000")]
    pub batch_size: u64,

    /// Number of processed records between progress reports
    #[arg(long, default_value = "100000")]
    pub progress_on_every: u64,
}

/// Options for the `audit` subcommand.
#[derive(Parser, Clone, Debug)]
pub struct AuditOpts {
    /// First date to check (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub start_date: chrono::NaiveDate,

    /// Last date to check (YYYY-MM-DD, exclusive)
    #[arg(long)]
    pub end_date: chrono::NaiveDate,

    /// Directory the export wrote its CSV files to
    #[arg(long, default_value = "./output")]
    pub output_dir: PathBuf,
}

/// Validated, immutable export configuration.
///
/// Produced by [`ExportOpts::validate`] before any database access; every
/// component takes this instead of the raw CLI options.
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub db_host: String,
    pub db_database: String,
    pub db_user: String,
    pub db_pass: String,
    pub db_port: u16,
    /// Table name after sanitization, safe to interpolate into SQL.
    pub db_table: String,
    pub output_dir: PathBuf,
    pub progress_file: PathBuf,
    pub max_records: u64,
    pub batch_size: u64,
    pub progress_on_every: u64,
}

impl ExportOpts {
    /// Validate the CLI options and freeze them into an [`ExportConfig`].
    ///
    /// All checks run before any database access. Failures are configuration
    /// errors: reported to the operator, never silently corrected.
    pub fn validate(&self) -> anyhow::Result<ExportConfig> {
        let db_table = sanitize_table_name(&self.db_table);
        if db_table.is_empty() {
            bail!("invalid table name provided: '{}'", self.db_table);
        }

        if !path_writable(&self.output_dir) {
            bail!(
                "output directory must be writable: '{}'",
                self.output_dir.display()
            );
        }

        if !path_writable(&self.progress_file) {
            bail!(
                "progress file must be writable or its directory must allow creating it: '{}'",
                self.progress_file.display()
            );
        }

        if self.batch_size == 0 {
            bail!("batch size must be > 0");
        }

        if self.progress_on_every == 0 {
            bail!("progress interval must be > 0");
        }

        if self.max_records != 0 && self.max_records < self.batch_size {
            bail!(
                "batch size ({}) is bigger than the number of records to export ({})",
                self.batch_size,
                self.max_records
            );
        }

        // 0 % batch_size == 0, so the unbounded case passes.
        if self.max_records % self.batch_size != 0 {
            bail!(
                "number of records to export ({}) cannot be split into batches of {}",
                self.max_records,
                self.batch_size
            );
        }

        if !(self.batch_size <= self.progress_on_every
            || self.progress_on_every % self.batch_size == 0)
        {
            bail!(
                "progress interval ({}) cannot be reached by whole batches of {}",
                self.progress_on_every,
                self.batch_size
            );
        }

        Ok(ExportConfig {
            db_host: self.db_host.clone(),
            db_database: self.db_database.clone(),
            db_user: self.db_user.clone(),
            db_pass: self.db_pass.clone(),
            db_port: self.db_port,
            db_table,
            output_dir: self.output_dir.clone(),
            progress_file: self.progress_file.clone(),
            max_records: self.max_records,
            batch_size: self.batch_size,
            progress_on_every: self.progress_on_every,
        })
    }
}

/// Strip every character outside `[A-Za-z0-9_]` from a table name.
///
/// The result is interpolated into SQL text, so anything that could carry
/// quoting or punctuation is removed rather than escaped.
pub fn sanitize_table_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Whether `path` can be written, or created inside its parent directory.
fn path_writable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => !meta.permissions().readonly(),
        Err(_) => {
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            std::fs::metadata(parent)
                .map(|m| m.is_dir() && !m.permissions().readonly())
                .unwrap_or(false)
        }
    }
}
