//! Pending request records and their settlement pipeline.
//!
//! A [`PendingRequest`] moves through one state machine:
//!
//! ```text
//! Created ──attach_stream──▶ Streaming ──▶ SettledOk
//!                                      ├─▶ SettledDecodeError
//!                                      └─▶ SettledTransportError
//! ```
//!
//! `attach_stream` registers the record before it spawns the pipeline task, so
//! a registry read that happens after the call always sees the record. The
//! task owns a [`SettleGuard`]; dropping the guard is the only place a record
//! is unregistered and its outcome published, so removal happens exactly once
//! on every path, including a panicking transport or a runtime shutdown.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, error, warn, Instrument};

use crate::{
    AbortHandle, CancellationToken, RequestError, RequestRegistry, RequestSeq, Timestamp,
    TransportCall, TransportError,
};

/// Outcome of a settled record.
pub type RequestOutcome = Result<Value, RequestError>;

/// Externally visible phase of a [`PendingRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestPhase {
    Created,
    Streaming,
    SettledOk,
    SettledDecodeError,
    SettledTransportError,
}

impl RequestPhase {
    /// Returns `true` for the three terminal phases.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            Self::SettledOk | Self::SettledDecodeError | Self::SettledTransportError
        )
    }
}

#[derive(Debug, Clone)]
enum State {
    Created,
    Streaming,
    Settled(RequestOutcome),
}

impl State {
    fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }

    fn phase(&self) -> RequestPhase {
        match self {
            Self::Created => RequestPhase::Created,
            Self::Streaming => RequestPhase::Streaming,
            Self::Settled(Ok(_)) => RequestPhase::SettledOk,
            Self::Settled(Err(err)) if err.is_decode() => RequestPhase::SettledDecodeError,
            Self::Settled(Err(_)) => RequestPhase::SettledTransportError,
        }
    }
}

/// Bookkeeping for one in-flight network operation.
#[derive(Debug)]
pub struct PendingRequest {
    seq: RequestSeq,
    created_at: Timestamp,
    signal: CancellationToken,
    abort: Option<AbortHandle>,
    state: watch::Sender<State>,
}

impl PendingRequest {
    /// Creates a record bound to `signal`.
    ///
    /// Passing `Some(result)` creates a record that is already settled; such
    /// a record never enters a registry.
    pub fn new(result: Option<Value>, signal: CancellationToken) -> Self {
        let state = match result {
            Some(value) => State::Settled(Ok(value)),
            None => State::Created,
        };
        Self {
            seq: RequestSeq::next(),
            created_at: Timestamp::now(),
            signal,
            abort: None,
            state: watch::Sender::new(state),
        }
    }

    /// Attaches the handle that [`RequestRegistry::cancel_all`] will fire.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn seq(&self) -> RequestSeq {
        self.seq
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// The caller's cancellation signal.
    pub fn signal(&self) -> &CancellationToken {
        &self.signal
    }

    pub fn abort_handle(&self) -> Option<&AbortHandle> {
        self.abort.as_ref()
    }

    pub fn phase(&self) -> RequestPhase {
        self.state.borrow().phase()
    }

    pub fn is_settled(&self) -> bool {
        self.state.borrow().is_settled()
    }

    /// `true` while the caller's signal has not been cancelled, regardless of
    /// whether the record has settled.
    pub fn is_active(&self) -> bool {
        !self.signal.is_cancelled()
    }

    /// Returns the outcome if the record has settled.
    pub fn try_outcome(&self) -> Option<RequestOutcome> {
        match &*self.state.borrow() {
            State::Settled(outcome) => Some(outcome.clone()),
            State::Created | State::Streaming => None,
        }
    }

    /// Waits for the record to settle and returns a copy of its outcome.
    ///
    /// A record still in [`RequestPhase::Created`] waits until a transport
    /// call is attached and settles.
    pub async fn wait(&self) -> RequestOutcome {
        let mut rx = self.state.subscribe();
        let state = rx
            .wait_for(State::is_settled)
            .await
            .map_err(|_| RequestError::Abandoned { seq: self.seq })?;
        match &*state {
            State::Settled(outcome) => outcome.clone(),
            State::Created | State::Streaming => Err(RequestError::Abandoned { seq: self.seq }),
        }
    }

    /// Attaches a transport call and starts the decode pipeline.
    ///
    /// The record is registered in `registry` before this returns. The
    /// pipeline awaits the response, decodes its body as JSON, and on
    /// settlement removes the record from `registry` exactly once.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// [`RequestError::AlreadyAttached`] unless the record is in
    /// [`RequestPhase::Created`].
    pub fn attach_stream(
        self: &Arc<Self>,
        registry: &Arc<RequestRegistry>,
        call: TransportCall,
    ) -> Result<(), RequestError> {
        let mut attached = false;
        self.state.send_if_modified(|state| {
            if matches!(state, State::Created) {
                *state = State::Streaming;
                attached = true;
            }
            attached
        });
        if !attached {
            return Err(RequestError::AlreadyAttached { seq: self.seq });
        }

        // Registration must precede the spawn: the task may settle (and
        // unregister) before this function returns on a multi-threaded runtime.
        registry.register(Arc::clone(self));

        let mut guard = SettleGuard {
            record: Arc::clone(self),
            registry: Arc::clone(registry),
            outcome: None,
        };
        let span = tracing::debug_span!("pending_request", seq = %self.seq);
        tokio::spawn(
            async move {
                let outcome = guard.record.run_pipeline(call).await;
                guard.outcome = Some(outcome);
            }
            .instrument(span),
        );
        Ok(())
    }

    async fn run_pipeline(&self, call: TransportCall) -> RequestOutcome {
        let response = match call.await {
            Ok(response) => response,
            Err(err) => {
                self.observe_transport_failure(&err);
                return Err(err.into());
            }
        };
        debug!(status = response.status(), "response received");

        match response.json().await {
            Ok(value) => Ok(value),
            Err(err @ TransportError::Decode { .. }) => {
                warn!(seq = %self.seq, error = %err, "JSON decode failed");
                Err(err.into())
            }
            Err(err) => {
                self.observe_transport_failure(&err);
                Err(err.into())
            }
        }
    }

    /// Aborts are expected and stay silent; anything else is worth a warning.
    fn observe_transport_failure(&self, err: &TransportError) {
        if err.is_abort() {
            debug!(seq = %self.seq, "transport call aborted");
        } else {
            warn!(seq = %self.seq, error = %err, "transport call failed");
        }
    }

    fn publish(&self, outcome: RequestOutcome) {
        self.state.send_replace(State::Settled(outcome));
    }
}

/// Finalisation step of the pipeline task. Runs exactly once, on drop.
struct SettleGuard {
    record: Arc<PendingRequest>,
    registry: Arc<RequestRegistry>,
    outcome: Option<RequestOutcome>,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        let seq = self.record.seq;
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            None => {
                error!(%seq, "request pipeline ended without settling");
                Err(RequestError::Abandoned { seq })
            }
        };

        // Unregister before publishing so that anyone woken by the outcome
        // already sees the record gone.
        self.registry.unregister(&self.record);

        match &outcome {
            Ok(_) => debug!(%seq, elapsed_ms = self.record.created_at.elapsed_ms(), "request settled"),
            Err(err) if err.is_abort() => debug!(%seq, "request settled as aborted"),
            Err(err) => debug!(%seq, error = %err, "request settled with error"),
        }
        self.record.publish(outcome);
    }
}
