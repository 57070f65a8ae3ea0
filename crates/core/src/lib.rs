//! Core of the weave SQL batch runner.
//!
//! Loads `.sql` files from a directory and executes them in parallel, one
//! transaction per file, against any [`Backend`]. No database driver lives
//! here; see `weave-db` for the Postgres backend.

pub mod backend;
pub mod error;
pub mod executor;
pub mod script;

pub use backend::{Backend, BackendError, Transaction};
pub use error::EtlError;
pub use executor::{ExecutorConfig, SqlExecutor, DEFAULT_CONCURRENCY, DEFAULT_ROLLBACK_TIMEOUT};
pub use script::{load_scripts, Script};
