//! `weave-etl` -- runs a folder of SQL files against the warehouse.
//!
//! Every `.sql` file directly inside `--path` runs in its own transaction,
//! `SQL_PARALLEL_DEGREE` files at a time. The first failure stops the run.
//!
//! # Environment variables
//!
//! | Variable              | Required | Default  | Description                        |
//! |-----------------------|----------|----------|------------------------------------|
//! | `DATABASE_URL`        | yes      | --       | Warehouse connection URL           |
//! | `SQL_PARALLEL_DEGREE` | no       | `5`      | SQL files executed concurrently    |
//! | `DB_MAX_CONNECTIONS`  | no       | degree+1 | Connection pool size               |
//! | `ETL_SQL_PATH`        | no       | `sql`    | Same as `--path`                   |
//! | `LOG_FORMAT`          | no       | `text`   | `json` for JSON log lines          |

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use weave_core::EtlError;
use weave_etl::app::{self, EXIT_STARTUP_FAILURE};
use weave_etl::cli::Args;
use weave_etl::config::EtlConfig;
use weave_etl::logging::{self, LogFormat};
use weave_etl::shutdown;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    logging::init_tracing(LogFormat::from_env());

    let config = match EtlConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };
    tracing::info!(
        path = %args.path.display(),
        parallel_degree = config.parallel_degree,
        max_connections = config.max_connections,
        "Loaded configuration",
    );

    let cancel = CancellationToken::new();
    let watcher = shutdown::cancel_on_shutdown(cancel.clone());

    let result = app::run(&config, &args.path, &cancel).await;

    // Stops the signal watcher if no signal arrived.
    cancel.cancel();
    let _ = watcher.await;

    match result {
        Ok(()) => {
            tracing::info!("Done.");
            ExitCode::SUCCESS
        }
        Err(err @ EtlError::Cancelled) => {
            tracing::warn!(error = %err, "Interrupted");
            ExitCode::from(app::exit_code(&err))
        }
        Err(err @ EtlError::Script { .. }) => {
            tracing::error!(error = %err, "Failed to execute SQL files");
            ExitCode::from(app::exit_code(&err))
        }
        Err(err) => {
            tracing::error!(error = %err, "ETL run could not start");
            ExitCode::from(app::exit_code(&err))
        }
    }
}
