//! Transactional backend seam.
//!
//! The executor only needs to open a transaction, run one statement batch
//! inside it, and commit or roll back. Concrete drivers (see `weave-db`)
//! implement [`Backend`] and are injected fully connected.

use async_trait::async_trait;

/// Error type returned by backend implementations.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// A connected, shareable handle to the warehouse (usually a pool).
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Tx: Transaction + 'static;

    /// Connectivity probe run once before any script executes.
    async fn ping(&self) -> Result<(), BackendError>;

    /// Open a transaction at the backend's default isolation level.
    async fn begin(&self) -> Result<Self::Tx, BackendError>;
}

/// One open transaction.
///
/// Dropping a transaction that was neither committed nor rolled back must
/// roll it back.
#[async_trait]
pub trait Transaction: Send {
    /// Run `sql` as-is. Multiple statements are passed through untouched.
    async fn execute(&mut self, sql: &str) -> Result<(), BackendError>;

    async fn commit(self) -> Result<(), BackendError>;

    async fn rollback(self) -> Result<(), BackendError>;

    /// Roll back after an interrupted [`Self::execute`].
    ///
    /// Backends whose server keeps running an abandoned statement should
    /// cancel it here first, otherwise the rollback waits for it to finish.
    async fn abort(self) -> Result<(), BackendError>
    where
        Self: Sized,
    {
        self.rollback().await
    }
}
