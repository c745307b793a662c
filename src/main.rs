//! Command-line interface for coord-dump
//!
//! # Usage Examples
//!
//! ```bash
//! # Export coordinate records into date-partitioned CSV files,
//! # resuming from the progress file if one exists
//! coord-dump export \
//!   --db-host 127.0.0.1 --db-port 3306 \
//!   --db-database geo --db-user geo --db-pass secret \
//!   --db-table coords \
//!   --output-dir ./output --progress-file ./coord-dump.progress \
//!   --batch-size 1000 --max-records 0 --progress-on-every 100000
//!
//! # Audit the output tree for missing daily files (end date exclusive)
//! coord-dump audit \
//!   --start-date 2013-10-01 --end-date 2013-11-01 \
//!   --output-dir ./output
//! ```

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use coord_dump::fetch::MysqlFetcher;
use coord_dump::progress::ProgressStore;
use coord_dump::{audit, connect, export, AuditOpts, ExportConfig, ExportOpts};

#[derive(Parser)]
#[command(name = "coord-dump")]
#[command(about = "Export geocoordinate records from MySQL into date-partitioned CSV files")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Incrementally export the source table, checkpointing after each batch
    Export {
        #[command(flatten)]
        opts: ExportOpts,
    },

    /// Report which daily CSV files are missing within a date range
    Audit {
        #[command(flatten)]
        opts: AuditOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export { opts } => run_export(opts).await,
        Commands::Audit { opts } => run_audit(opts),
    }
}

async fn run_export(opts: ExportOpts) -> anyhow::Result<()> {
    let cfg = opts.validate()?;
    log_settings(&cfg);

    let pool = connect::mysql_pool(&cfg);
    let conn = connect::connect_and_probe(&pool, &cfg).await?;

    let mut fetcher = MysqlFetcher::new(conn, cfg.db_table.clone());
    let store = ProgressStore::new(cfg.progress_file.clone());

    let result = export::run_export(&mut fetcher, &store, &cfg).await;

    // Release the connection and pool on every exit path; a run failure
    // takes precedence over a teardown failure.
    drop(fetcher);
    if let Err(e) = pool.disconnect().await {
        warn!("Failed to close MySQL pool cleanly: {e}");
    }

    let stats = result?;
    info!(
        "Export run complete: {} records, cursor at {}",
        stats.records, stats.cursor
    );
    Ok(())
}

fn run_audit(opts: AuditOpts) -> anyhow::Result<()> {
    let report = audit::audit(&opts.output_dir, opts.start_date, opts.end_date)?;

    println!("Missing:");
    for date in &report.missing {
        println!("{date}");
    }

    println!("Found:");
    for path in &report.found {
        println!("{}", path.display());
    }

    Ok(())
}

/// Log the resolved settings the run will use. The password is omitted.
fn log_settings(cfg: &ExportConfig) {
    info!("Settings:");
    info!("\tDatabase host: {}", cfg.db_host);
    info!("\tDatabase name: {}", cfg.db_database);
    info!("\tDatabase user: {}", cfg.db_user);
    info!("\tDatabase port: {}", cfg.db_port);
    info!("\tDatabase table: {}", cfg.db_table);
    info!("\tOutput dir: {}", cfg.output_dir.display());
    info!("\tProgress file: {}", cfg.progress_file.display());
    info!("\tMax records: {}", cfg.max_records);
    info!("\tBatch size: {}", cfg.batch_size);
    info!("\tProgress on every: {}", cfg.progress_on_every);
}
