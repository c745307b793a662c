//! MySQL connection bootstrap.

use anyhow::{Context, Result};
use mysql_async::{prelude::*, Conn, OptsBuilder, Pool};
use tracing::info;

use crate::ExportConfig;

/// Build a connection pool from the validated configuration.
pub fn mysql_pool(cfg: &ExportConfig) -> Pool {
    let opts = OptsBuilder::default()
        .ip_or_hostname(cfg.db_host.clone())
        .tcp_port(cfg.db_port)
        .user(Some(cfg.db_user.clone()))
        .pass(Some(cfg.db_pass.clone()))
        .db_name(Some(cfg.db_database.clone()));

    Pool::new(opts)
}

/// Acquire one connection and verify the table is reachable.
///
/// The probe runs before the export loop so connectivity and authentication
/// problems surface at startup instead of mid-run. `table` must already be
/// sanitized.
pub async fn connect_and_probe(pool: &Pool, cfg: &ExportConfig) -> Result<Conn> {
    info!(
        "Connecting to database {}@{}:{}/{} ...",
        cfg.db_user, cfg.db_host, cfg.db_port, cfg.db_database
    );

    let mut conn = pool.get_conn().await.with_context(|| {
        format!(
            "cannot connect to database at '{}:{}'",
            cfg.db_host, cfg.db_port
        )
    })?;

    conn.query_drop(format!("SELECT 1 FROM {} LIMIT 1", cfg.db_table))
        .await
        .with_context(|| format!("probe query failed for table '{}'", cfg.db_table))?;

    info!("Database connection verified");
    Ok(conn)
}
