#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use weave_core::{Backend, BackendError, Script, Transaction};

/// Statement marker that makes [`MockTx::execute`] fail.
pub const EXEC_ERROR: &str = "-- exec_error";
/// Statement marker that makes [`MockTx::commit`] fail.
pub const COMMIT_ERROR: &str = "-- commit_error";
/// Statement marker that makes [`MockTx::execute`] hang for a long time.
pub const HANG: &str = "-- hang";
/// Statement marker that makes rolling back hang for a long time.
pub const SLOW_ROLLBACK: &str = "-- slow_rollback";

#[derive(Default)]
struct Inner {
    begun: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    executed: Mutex<Vec<String>>,
    committed: Mutex<Vec<String>>,
    rolled_back: Mutex<Vec<String>>,
    aborted: Mutex<Vec<String>>,
}

/// In-memory backend recording every transaction it hands out.
///
/// A transaction counts as in flight from `begin` until it is dropped, so
/// `max_in_flight` is the peak number of concurrently open transactions.
#[derive(Default)]
pub struct MockBackend {
    inner: Arc<Inner>,
    exec_delay: Duration,
    fail_begin: bool,
    fail_ping: bool,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(exec_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            exec_delay,
            ..Self::default()
        })
    }

    pub fn failing_begin() -> Arc<Self> {
        Arc::new(Self {
            fail_begin: true,
            ..Self::default()
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            fail_ping: true,
            ..Self::default()
        })
    }

    pub fn begun(&self) -> usize {
        self.inner.begun.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.inner.executed.lock().unwrap().clone()
    }

    pub fn committed(&self) -> Vec<String> {
        self.inner.committed.lock().unwrap().clone()
    }

    pub fn rolled_back(&self) -> Vec<String> {
        self.inner.rolled_back.lock().unwrap().clone()
    }

    pub fn aborted(&self) -> Vec<String> {
        self.inner.aborted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    type Tx = MockTx;

    async fn ping(&self) -> Result<(), BackendError> {
        if self.fail_ping {
            return Err("connection refused".into());
        }
        Ok(())
    }

    async fn begin(&self) -> Result<MockTx, BackendError> {
        self.inner.begun.fetch_add(1, Ordering::SeqCst);
        if self.fail_begin {
            return Err("too many connections".into());
        }

        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

        Ok(MockTx {
            inner: Arc::clone(&self.inner),
            exec_delay: self.exec_delay,
            sql: None,
            finished: false,
        })
    }
}

pub struct MockTx {
    inner: Arc<Inner>,
    exec_delay: Duration,
    sql: Option<String>,
    finished: bool,
}

#[async_trait]
impl Transaction for MockTx {
    async fn execute(&mut self, sql: &str) -> Result<(), BackendError> {
        self.sql = Some(sql.to_string());
        self.inner.executed.lock().unwrap().push(sql.to_string());

        if sql.contains(HANG) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        } else if !self.exec_delay.is_zero() {
            tokio::time::sleep(self.exec_delay).await;
        }

        if sql.contains(EXEC_ERROR) {
            return Err("simulated statement failure".into());
        }
        Ok(())
    }

    async fn commit(mut self) -> Result<(), BackendError> {
        let sql = self.sql.take().unwrap_or_default();
        self.finished = true;
        if sql.contains(COMMIT_ERROR) {
            self.inner.rolled_back.lock().unwrap().push(sql);
            return Err("simulated commit failure".into());
        }
        self.inner.committed.lock().unwrap().push(sql);
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), BackendError> {
        if self.sql.as_deref().is_some_and(|sql| sql.contains(SLOW_ROLLBACK)) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        let sql = self.sql.take().unwrap_or_default();
        self.finished = true;
        self.inner.rolled_back.lock().unwrap().push(sql);
        Ok(())
    }

    async fn abort(self) -> Result<(), BackendError> {
        let sql = self.sql.clone().unwrap_or_default();
        self.inner.aborted.lock().unwrap().push(sql);
        self.rollback().await
    }
}

impl Drop for MockTx {
    fn drop(&mut self) {
        if !self.finished {
            let sql = self.sql.take().unwrap_or_default();
            self.inner.rolled_back.lock().unwrap().push(sql);
        }
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn script_name(index: usize) -> String {
    format!("{index:03}_step.sql")
}

/// `count` independent scripts named `000_step.sql`, `001_step.sql`, ...
pub fn scripts(count: usize) -> Vec<Script> {
    (0..count)
        .map(|i| Script::new(script_name(i), format!("INSERT INTO steps VALUES ({i});")))
        .collect()
}

/// Same as [`scripts`], with `marker` appended to the scripts at `indices`.
pub fn scripts_marked(count: usize, indices: &[usize], marker: &str) -> Vec<Script> {
    let mut all = scripts(count);
    for &i in indices {
        all[i].text.push('\n');
        all[i].text.push_str(marker);
    }
    all
}
