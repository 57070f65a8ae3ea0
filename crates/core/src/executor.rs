//! Parallel SQL executor.
//!
//! [`SqlExecutor::execute`] fans a batch of [`Script`]s out to a fixed pool
//! of Tokio workers. Each script runs in its own transaction. The first
//! failure cancels the run: no worker claims new work afterwards, and the
//! caller gets exactly one error back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendError, Transaction};
use crate::error::EtlError;
use crate::script::Script;

/// Number of workers used when none (or zero) is configured.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Upper bound on rolling back a failed or interrupted script.
pub const DEFAULT_ROLLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Executor settings, fixed at construction.
#[derive(Debug)]
pub struct ExecutorConfig<B> {
    /// Shared, already-connected backend handle.
    pub backend: Arc<B>,
    /// Number of concurrent workers. `0` selects [`DEFAULT_CONCURRENCY`].
    pub concurrency: usize,
    /// How long a worker waits for a rollback before giving up on it.
    pub rollback_timeout: Duration,
}

impl<B> ExecutorConfig<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            concurrency: DEFAULT_CONCURRENCY,
            rollback_timeout: DEFAULT_ROLLBACK_TIMEOUT,
        }
    }
}

pub struct SqlExecutor<B> {
    backend: Arc<B>,
    concurrency: usize,
    rollback_timeout: Duration,
}

impl<B: Backend> SqlExecutor<B> {
    pub fn new(config: ExecutorConfig<B>) -> Self {
        let concurrency = match config.concurrency {
            0 => DEFAULT_CONCURRENCY,
            n => n,
        };
        Self {
            backend: config.backend,
            concurrency,
            rollback_timeout: config.rollback_timeout,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Probe the backend before any script is handed to [`Self::execute`].
    pub async fn check_connectivity(&self) -> Result<(), EtlError> {
        self.backend.ping().await.map_err(EtlError::Connectivity)
    }

    /// Execute every script, at most `concurrency` at a time.
    ///
    /// Returns once all workers have stopped. Cancelling `cancel` stops new
    /// scripts from being claimed, aborts in-flight statements, and yields
    /// [`EtlError::Cancelled`] unless a script failure was recorded first.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        scripts: Vec<Script>,
    ) -> Result<(), EtlError> {
        if scripts.is_empty() {
            tracing::info!("No SQL files to execute");
            return Ok(());
        }

        ExecutionRun::new(Arc::clone(&self.backend), cancel, scripts)
            .run(self.concurrency, self.rollback_timeout)
            .await
    }
}

/// State shared by the workers of one [`SqlExecutor::execute`] call.
struct ExecutionRun<B> {
    backend: Arc<B>,
    scripts: Vec<Script>,
    next: AtomicUsize,
    executed: AtomicUsize,
    first_error: Mutex<Option<EtlError>>,
    cancel: CancellationToken,
}

impl<B: Backend> ExecutionRun<B> {
    fn new(backend: Arc<B>, parent: &CancellationToken, scripts: Vec<Script>) -> Self {
        Self {
            backend,
            scripts,
            next: AtomicUsize::new(0),
            executed: AtomicUsize::new(0),
            first_error: Mutex::new(None),
            // A failing script cancels its siblings, never the caller.
            cancel: parent.child_token(),
        }
    }

    async fn run(self, concurrency: usize, rollback_timeout: Duration) -> Result<(), EtlError> {
        let started = Instant::now();
        let total = self.scripts.len();
        let run = Arc::new(self);

        tracing::info!(scripts = total, concurrency, "Executing SQL files");

        let mut workers = JoinSet::new();
        for worker_id in 0..concurrency {
            let run = Arc::clone(&run);
            workers.spawn(async move { run.work(worker_id, rollback_timeout).await });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                run.fail(EtlError::Internal(format!(
                    "SQL worker stopped abnormally: {e}"
                )));
            }
        }

        let executed = run.executed.load(Ordering::Acquire);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match run.take_error() {
            None => {
                tracing::info!(executed, total, elapsed_ms, "All SQL files executed");
                Ok(())
            }
            Some(err) => {
                tracing::warn!(
                    executed,
                    total,
                    elapsed_ms,
                    error = %err,
                    "SQL execution stopped",
                );
                Err(err)
            }
        }
    }

    async fn work(&self, worker_id: usize, rollback_timeout: Duration) {
        loop {
            let Some(script) = self.claim() else {
                return;
            };

            if self.cancel.is_cancelled() {
                self.fail(EtlError::Cancelled);
                return;
            }

            tracing::info!(worker_id, script = %script.name, "Executing SQL file");

            let outcome = execute_script(
                self.backend.as_ref(),
                script,
                &self.cancel,
                rollback_timeout,
            )
            .await;
            match outcome {
                Ok(()) => {
                    self.executed.fetch_add(1, Ordering::AcqRel);
                    tracing::debug!(worker_id, script = %script.name, "SQL file committed");
                }
                Err(ScriptFailure::Cancelled) => {
                    tracing::info!(
                        worker_id,
                        script = %script.name,
                        "SQL file aborted by cancellation",
                    );
                    self.fail(EtlError::Cancelled);
                    return;
                }
                Err(ScriptFailure::Backend(source)) => {
                    tracing::error!(
                        worker_id,
                        script = %script.name,
                        error = %source,
                        "SQL file failed",
                    );
                    self.fail(EtlError::Script {
                        name: script.name.clone(),
                        source,
                    });
                    return;
                }
            }
        }
    }

    fn claim(&self) -> Option<&Script> {
        let index = self.next.fetch_add(1, Ordering::AcqRel);
        self.scripts.get(index)
    }

    /// Keep the first error only, then stop the run.
    fn fail(&self, err: EtlError) {
        {
            let mut slot = self
                .first_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.cancel.cancel();
    }

    fn take_error(&self) -> Option<EtlError> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

enum ScriptFailure {
    Backend(BackendError),
    Cancelled,
}

impl From<BackendError> for ScriptFailure {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

/// Run one script in its own transaction: begin, execute, commit.
///
/// Begin and execute race `cancel`. Commit does not, so a commit that has
/// started is allowed to finish. An interrupted statement is aborted rather
/// than plainly rolled back, and either way the rollback is bounded by
/// `rollback_timeout`.
async fn execute_script<B: Backend>(
    backend: &B,
    script: &Script,
    cancel: &CancellationToken,
    rollback_timeout: Duration,
) -> Result<(), ScriptFailure> {
    let mut tx = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ScriptFailure::Cancelled),
        tx = backend.begin() => tx?,
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ScriptFailure::Cancelled),
        res = tx.execute(&script.text) => res.map_err(ScriptFailure::Backend),
    };

    if let Err(failure) = outcome {
        let rollback = match failure {
            ScriptFailure::Cancelled => tx.abort(),
            ScriptFailure::Backend(_) => tx.rollback(),
        };
        match tokio::time::timeout(rollback_timeout, rollback).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(script = %script.name, error = %e, "Rollback failed");
            }
            Err(_) => {
                tracing::warn!(
                    script = %script.name,
                    timeout_ms = rollback_timeout.as_millis() as u64,
                    "Rollback timed out, abandoning transaction",
                );
            }
        }
        return Err(failure);
    }

    tx.commit().await?;
    Ok(())
}
