//! Startup sequence: connect, probe, load, execute.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use weave_core::{load_scripts, Backend, EtlError, ExecutorConfig, SqlExecutor};
use weave_db::PgBackend;

use crate::config::EtlConfig;

/// How long closing the pool may take once the run is over.
const POOL_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit status for a run that could not start (config, connection, discovery).
pub const EXIT_STARTUP_FAILURE: u8 = 1;
/// Exit status when a SQL file failed.
pub const EXIT_SCRIPT_FAILURE: u8 = 2;
/// Exit status after an interrupt (128 + SIGINT).
pub const EXIT_CANCELLED: u8 = 130;

/// Map a run error to the process exit status.
pub fn exit_code(err: &EtlError) -> u8 {
    match err {
        EtlError::Script { .. } => EXIT_SCRIPT_FAILURE,
        EtlError::Cancelled => EXIT_CANCELLED,
        EtlError::Discovery { .. } | EtlError::Connectivity(_) | EtlError::Internal(_) => {
            EXIT_STARTUP_FAILURE
        }
    }
}

/// Connect to the warehouse and run every SQL file under `sql_dir`.
pub async fn run(
    config: &EtlConfig,
    sql_dir: &Path,
    cancel: &CancellationToken,
) -> Result<(), EtlError> {
    tracing::debug!(max_connections = config.max_connections, "Opening connection pool");
    let pool = weave_db::create_pool(&config.database_url, config.max_connections)
        .await
        .map_err(|e| EtlError::Connectivity(e.into()))?;
    tracing::info!("Database connection pool created");

    let executor = SqlExecutor::new(ExecutorConfig {
        concurrency: config.parallel_degree,
        ..ExecutorConfig::new(Arc::new(PgBackend::new(pool.clone())))
    });

    let result = run_with(&executor, sql_dir, cancel).await;
    if tokio::time::timeout(POOL_CLOSE_TIMEOUT, pool.close())
        .await
        .is_err()
    {
        tracing::warn!("Timed out closing connection pool");
    }
    result
}

/// Probe the backend, load the SQL files, and execute them.
///
/// Nothing is executed if the probe or the load fails.
pub async fn run_with<B: Backend>(
    executor: &SqlExecutor<B>,
    sql_dir: &Path,
    cancel: &CancellationToken,
) -> Result<(), EtlError> {
    executor.check_connectivity().await?;
    tracing::info!("Database health check passed");

    tracing::info!(path = %sql_dir.display(), "Loading SQL files");
    let scripts = load_scripts(sql_dir)?;

    tracing::info!(
        count = scripts.len(),
        concurrency = executor.concurrency(),
        "Start to execute SQL files",
    );
    executor.execute(cancel, scripts).await?;
    tracing::info!("Finished executing SQL files");
    Ok(())
}
