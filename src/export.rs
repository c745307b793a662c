//! The export driver: fetch, partition, write, checkpoint, report.

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::info;

use crate::fetch::BatchFetch;
use crate::partition::partition;
use crate::progress::ProgressStore;
use crate::{sink, ExportConfig};

/// Terminal loop states. A fatal error (failed fetch, CSV write or
/// checkpoint) leaves the loop early through `?` instead; there is no retry,
/// the operator re-runs and the export resumes from the last checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunState {
    Running,
    Done,
}

/// Outcome of a completed export run.
#[derive(Debug)]
pub struct ExportStats {
    /// Records written during this run.
    pub records: u64,
    /// Cursor after the last checkpoint.
    pub cursor: u64,
    /// Time spent fetching and writing, summed over batches.
    pub elapsed: Duration,
}

/// Run the export loop until the source is exhausted or the record budget
/// is reached.
///
/// Per iteration: fetch one batch after the cursor, bucket it by date,
/// append every bucket to its CSV file, then — strictly after all writes
/// succeeded — persist the id of the batch's last row. A crash mid-batch
/// therefore never advances the cursor past unwritten rows; the worst case
/// is re-appending an already-written batch on the next run.
pub async fn run_export<F: BatchFetch>(
    fetcher: &mut F,
    store: &ProgressStore,
    cfg: &ExportConfig,
) -> Result<ExportStats> {
    let mut cursor = store.load();
    let mut count: u64 = 0;
    let mut total_elapsed = Duration::ZERO;
    let mut state = RunState::Running;

    if cfg.max_records > 0 {
        info!("Processing {} records", cfg.max_records);
    } else {
        info!("Processing all records");
    }
    info!("Starting after row id {cursor}");

    while state == RunState::Running {
        if cfg.max_records > 0 && count >= cfg.max_records {
            state = RunState::Done;
            continue;
        }

        let started = Instant::now();

        let batch = fetcher.fetch(cursor, cfg.batch_size).await?;

        let last_id = match batch.last() {
            Some(row) => row.id,
            None => {
                state = RunState::Done;
                continue;
            }
        };
        let fetched = batch.len() as u64;

        let buckets = partition(batch);
        let latest_date = buckets.keys().next_back().copied();

        for (date, rows) in &buckets {
            sink::write_rows(&cfg.output_dir, *date, rows)?;
        }

        // All CSV appends for the batch are durable, checkpoint now.
        store.save(last_id)?;
        cursor = last_id;
        count += fetched;

        let elapsed = started.elapsed();
        total_elapsed += elapsed;

        if count % cfg.progress_on_every == 0 {
            let percent = if cfg.max_records > 0 {
                100.0 * count as f64 / cfg.max_records as f64
            } else {
                0.0
            };
            let reached = latest_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            info!(
                "[ {percent:.2}% ] {count} records in {:.2} secs; reached {reached}; max_id {cursor}",
                elapsed.as_secs_f64()
            );
        }
    }

    info!(
        "Done! Total time {:.3} secs. Total records {count}.",
        total_elapsed.as_secs_f64()
    );

    Ok(ExportStats {
        records: count,
        cursor,
        elapsed: total_elapsed,
    })
}
