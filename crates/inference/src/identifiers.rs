//! Newtype identifiers.
//!
//! Every concept with an identity is a distinct newtype wrapping a primitive,
//! so a [`RequestSeq`] can never be confused with a token count and a
//! [`LoginTicket`] can never be passed where an [`ApiKey`] is expected.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Request sequence numbers
// ---------------------------------------------------------------------------

/// First sequence number handed out in a process.
const FIRST_SEQ: u64 = 100;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(FIRST_SEQ);

/// Diagnostic sequence number of a pending request.
///
/// Drawn from a process-wide counter, so values are unique and strictly
/// increasing in construction order. Used for log correlation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestSeq(u64);

impl RequestSeq {
    /// Takes the next value from the process-wide counter.
    pub fn next() -> Self {
        Self(NEXT_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Name of the inference model (e.g. `"CONTRASTcode/stable"`).
    ModelName
}

string_id! {
    /// Account identity returned by the activation endpoint.
    AccountId
}

string_id! {
    /// One-time ticket exchanged for an API key at the activation endpoint.
    LoginTicket
}

/// Secret API key sent in the `Authorization` header.
///
/// `Debug` is redacted so keys never reach the logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key. Empty keys are allowed; the server decides what they mean.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the key as a string slice.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
