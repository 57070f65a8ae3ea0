use std::path::PathBuf;

use clap::Parser;

/// Executes a folder of SQL files against the warehouse, one transaction per file.
#[derive(Parser, Debug)]
#[command(name = "weave-etl", version)]
pub struct Args {
    /// Path to the ETL SQL folder
    #[arg(short, long, env = "ETL_SQL_PATH", default_value = "sql")]
    pub path: PathBuf,
}
