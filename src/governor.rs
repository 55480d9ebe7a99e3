//! Bounded, fail-fast fan-out over a row stream.
//!
//! The [`Governor`] pulls rows from a [`RowStream`] and spawns one
//! independent unit of work per row without waiting for it to finish. A
//! counting semaphore caps the number of units in flight: before pulling the
//! next row the driver waits for a permit, and each unit releases its permit
//! when it completes, which wakes the driver.
//!
//! Failure is all-or-nothing. A failing unit stores its error in a shared
//! slot *before* releasing its permit, so the driver observes the failure
//! before it consumes another row. A panicking unit records a sentinel error
//! the same way while unwinding. The driver then aborts every outstanding
//! unit and returns the error. A failed read from the stream is fatal in the
//! same way. When the stream is exhausted the driver drains all in-flight
//! units before returning.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::source::RowStream;

/// Default ceiling on concurrently in-flight units. Each unit may end up
/// holding a file handle downstream.
pub const MAX_OPEN_FILES: usize = 256;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriveSummary {
    /// Rows consumed from the stream.
    pub rows: u64,
    /// Units that completed successfully.
    pub completed: u64,
    /// Highest number of units observed in flight at once.
    pub peak_in_flight: usize,
}

pub struct Governor {
    ceiling: usize,
}

impl Default for Governor {
    fn default() -> Self {
        Self::new(MAX_OPEN_FILES)
    }
}

impl Governor {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Drive `rows` to completion, running `work` once per row and handing
    /// each successful outcome to `on_outcome` as units finish.
    pub async fn drive<T, O, F, Fut>(
        &self,
        mut rows: RowStream<T>,
        work: F,
        mut on_outcome: impl FnMut(O),
    ) -> Result<DriveSummary>
    where
        T: Send + 'static,
        O: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let permits = Arc::new(Semaphore::new(self.ceiling));
        let failure: Arc<Mutex<Option<anyhow::Error>>> = Arc::new(Mutex::new(None));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut tasks: JoinSet<Option<O>> = JoinSet::new();
        let mut summary = DriveSummary::default();

        loop {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .context("governor semaphore closed")?;

            if let Some(err) = failure.lock().take() {
                return Err(halt(&mut tasks, err, summary.rows));
            }
            while let Some(joined) = tasks.try_join_next() {
                match unpack(joined, &failure) {
                    Ok(outcome) => {
                        summary.completed += 1;
                        on_outcome(outcome);
                    }
                    Err(err) => return Err(halt(&mut tasks, err, summary.rows)),
                }
            }

            let row = match rows.next().await {
                Some(Ok(row)) => row,
                Some(Err(err)) => {
                    return Err(halt(&mut tasks, err.context("row stream failed"), summary.rows))
                }
                None => break,
            };
            summary.rows += 1;

            let unit = work(row);
            let failure = failure.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tasks.spawn(async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                let _guard = UnitGuard {
                    failure: failure.clone(),
                    in_flight,
                    _permit: permit,
                };
                match unit.await {
                    Ok(outcome) => Some(outcome),
                    Err(err) => {
                        failure.lock().get_or_insert(err);
                        None
                    }
                }
            });
        }

        debug!(rows = summary.rows, pending = tasks.len(), "row stream exhausted, draining");
        while let Some(joined) = tasks.join_next().await {
            match unpack(joined, &failure) {
                Ok(outcome) => {
                    summary.completed += 1;
                    on_outcome(outcome);
                }
                Err(err) => return Err(halt(&mut tasks, err, summary.rows)),
            }
        }

        summary.peak_in_flight = peak.load(Ordering::SeqCst);
        Ok(summary)
    }
}

/// Owned by a running unit. Releases the permit on drop; a unit that is
/// unwinding records a panic in the failure slot first.
struct UnitGuard {
    failure: Arc<Mutex<Option<anyhow::Error>>>,
    in_flight: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if std::thread::panicking() {
            self.failure
                .lock()
                .get_or_insert_with(|| anyhow!("unit of work panicked"));
        }
    }
}

fn unpack<O>(
    joined: Result<Option<O>, JoinError>,
    failure: &Mutex<Option<anyhow::Error>>,
) -> Result<O> {
    match joined {
        Ok(Some(outcome)) => Ok(outcome),
        Ok(None) => Err(failure
            .lock()
            .take()
            .unwrap_or_else(|| anyhow!("unit of work failed"))),
        Err(err) if err.is_panic() => Err(anyhow!("unit of work panicked: {}", err)),
        Err(err) => Err(anyhow!("unit of work was cancelled: {}", err)),
    }
}

fn halt<O: 'static>(tasks: &mut JoinSet<Option<O>>, err: anyhow::Error, rows: u64) -> anyhow::Error {
    warn!(rows, pending = tasks.len(), "halting after fatal error");
    tasks.abort_all();
    err
}
