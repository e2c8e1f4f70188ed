//! Error types for the request manager.
//!
//! [`TransportError`] is what a [`crate::Transport`] implementation reports.
//! [`RequestError`] is what awaiters of a [`crate::PendingRequest`] and callers
//! of the builders see. It is `Clone` because one settled outcome is shared
//! with every awaiter of the record.
//!
//! The three settlement failures stay distinguishable:
//!
//! - [`RequestError::Aborted`]: the transport call was deliberately aborted.
//!   Expected; never logged above `debug`.
//! - [`RequestError::Transport`]: network or protocol failure.
//! - [`RequestError::Decode`]: the response arrived but its body was not JSON.

use thiserror::Error;

use crate::RequestSeq;

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Failure reported by a transport implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The abort handle fired before the call (or its body) completed.
    #[error("The operation was aborted")]
    Aborted,

    /// The request could not be sent or the response could not be read.
    #[error("Transport failure: {message}")]
    Failed {
        /// Human-readable description from the underlying client.
        message: String,
    },

    /// The response body was read but is not valid JSON.
    #[error("Response body is not valid JSON: {message}")]
    Decode {
        /// Parser error message.
        message: String,
    },
}

impl TransportError {
    /// Creates a [`TransportError::Failed`] from any displayable error.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed {
            message: err.to_string(),
        }
    }

    /// Creates a [`TransportError::Decode`] from any displayable error.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode {
            message: err.to_string(),
        }
    }

    /// Returns `true` for [`TransportError::Aborted`].
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

// ---------------------------------------------------------------------------
// Request errors
// ---------------------------------------------------------------------------

/// Errors surfaced by pending requests and request builders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The transport call was aborted via the request's abort handle.
    #[error("Request aborted")]
    Aborted,

    /// Network or protocol failure before a decodable response arrived.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The response body could not be decoded as JSON.
    #[error("Decode error: {message}")]
    Decode {
        /// Parser error message.
        message: String,
    },

    /// A transport future was attached to a record that already had one.
    #[error("Request {seq} already has a transport call attached")]
    AlreadyAttached {
        /// Sequence of the offending record.
        seq: RequestSeq,
    },

    /// The request body could not be serialised.
    #[error("Could not encode request body: {message}")]
    Encode {
        /// Serialiser error message.
        message: String,
    },

    /// A login was attempted without a ticket.
    #[error("No login ticket available")]
    MissingTicket,

    /// The record was dropped before it settled.
    #[error("Request {seq} was dropped before settling")]
    Abandoned {
        /// Sequence of the dropped record.
        seq: RequestSeq,
    },
}

impl RequestError {
    /// Returns `true` for [`RequestError::Aborted`].
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Returns `true` for [`RequestError::Decode`].
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns `true` for [`RequestError::Transport`] and [`RequestError::Aborted`].
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Aborted)
    }
}

impl From<TransportError> for RequestError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Aborted => Self::Aborted,
            TransportError::Failed { message } => Self::Transport { message },
            TransportError::Decode { message } => Self::Decode { message },
        }
    }
}

impl From<serde_json::Error> for RequestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode {
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Invalid client configuration. Produced at load time; a client is never
/// built from an invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An endpoint URL is empty.
    #[error("Endpoint '{name}' is empty")]
    EmptyEndpoint {
        /// Configuration key of the endpoint.
        name: &'static str,
    },

    /// An endpoint URL does not use http or https.
    #[error("Endpoint '{name}' must start with http:// or https://, got '{url}'")]
    UnsupportedScheme {
        /// Configuration key of the endpoint.
        name: &'static str,
        /// Offending value.
        url: String,
    },

    /// The default model name is empty.
    #[error("Default model name is empty")]
    EmptyDefaultModel,
}
