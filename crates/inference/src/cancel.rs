//! Cooperative cancellation.
//!
//! The caller owns a [`CancellationToken`] (the cancellation signal). Builders
//! derive an [`AbortHandle`] from it as a child token, which gives two
//! properties:
//!
//! - cancelling the signal aborts the transport call, including when the
//!   signal was already cancelled before the call was issued;
//! - aborting the handle (e.g. from [`crate::RequestRegistry::cancel_all`])
//!   stops the transport without flipping the caller's signal.

pub use tokio_util::sync::CancellationToken;

/// Capability used to forcibly terminate one transport call.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    /// Creates a standalone handle not tied to any signal.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Creates a handle that fires whenever `signal` is cancelled.
    pub fn linked_to(signal: &CancellationToken) -> Self {
        Self {
            token: signal.child_token(),
        }
    }

    /// Requests the transport call to stop. Idempotent.
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the handle (or its parent signal) has fired.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the handle fires. Completes immediately if it already has.
    pub async fn aborted(&self) {
        self.token.cancelled().await;
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}
