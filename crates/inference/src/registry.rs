//! Registry of in-flight requests.
//!
//! One [`RequestRegistry`] per process is the normal setup; it is an ordinary
//! owned value shared through `Arc`, so tests build a fresh one each.
//!
//! The lock is never held across an `.await`. Every operation that has to
//! suspend or call out (awaiting, aborting) works on a snapshot.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::{PendingRequest, RequestOutcome, RequestPhase, RequestSeq};

/// Ordered collection of pending requests that have not settled yet.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    records: Mutex<Vec<Arc<PendingRequest>>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<PendingRequest>>> {
        // Every critical section is a single Vec operation, so a poisoned
        // lock still guards a consistent Vec.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `record`. Sequence numbers are unique, so no duplicate check.
    pub fn register(&self, record: Arc<PendingRequest>) {
        let seq = record.seq();
        let in_flight = {
            let mut records = self.lock();
            records.push(record);
            records.len()
        };
        debug!(%seq, in_flight, "request registered");
    }

    /// Removes the entry for `record`. Returns `false` (and does nothing) if
    /// it was already removed.
    pub fn unregister(&self, record: &PendingRequest) -> bool {
        let seq = record.seq();
        let in_flight = {
            let mut records = self.lock();
            match records.iter().position(|r| r.seq() == seq) {
                Some(index) => {
                    records.remove(index);
                    records.len()
                }
                None => return false,
            }
        };
        debug!(%seq, in_flight, "request unregistered");
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, seq: RequestSeq) -> bool {
        self.lock().iter().any(|r| r.seq() == seq)
    }

    /// Sequence numbers of live records, in registration order.
    pub fn sequences(&self) -> Vec<RequestSeq> {
        self.lock().iter().map(|r| r.seq()).collect()
    }

    /// Live records, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<PendingRequest>> {
        self.lock().clone()
    }

    /// Awaits every record that was live when the call started, one after the
    /// other in registration order, logging each outcome.
    ///
    /// Records registered after the call started are not awaited, nor are
    /// records with no transport attached, which would never settle. This is a
    /// diagnostic drain, not a barrier.
    pub async fn await_all(&self) -> Vec<(RequestSeq, RequestOutcome)> {
        let records = self.snapshot();
        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            if record.phase() == RequestPhase::Created {
                debug!(seq = %record.seq(), "skipping request with no transport attached");
                continue;
            }
            let outcome = record.wait().await;
            match &outcome {
                Ok(value) => info!(seq = %record.seq(), %value, "request drained"),
                Err(err) => info!(seq = %record.seq(), error = %err, "request drained with error"),
            }
            outcomes.push((record.seq(), outcome));
        }
        outcomes
    }

    /// `true` iff at least one record's cancellation signal has not fired.
    ///
    /// A cancelled record that has not settled yet does not count.
    pub fn any_still_active(&self) -> bool {
        self.lock().iter().any(|r| r.is_active())
    }

    /// Fires the abort handle of every record that has one and returns how
    /// many were fired. Does not wait for settlement.
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<_> = self
            .lock()
            .iter()
            .filter_map(|r| r.abort_handle().cloned())
            .collect();
        for handle in &handles {
            handle.abort();
        }
        debug!(aborted = handles.len(), "cancel_all");
        handles.len()
    }
}
