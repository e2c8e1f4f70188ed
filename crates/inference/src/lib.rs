//! Client-side request manager for the Codify inference API.
//!
//! Every inference call is wrapped in a [`PendingRequest`] that lives in a
//! [`RequestRegistry`] for exactly as long as it is in flight. Callers that own
//! UI state query the registry ([`RequestRegistry::any_still_active`]), drain
//! it ([`RequestRegistry::await_all`]), or abort everything in it
//! ([`RequestRegistry::cancel_all`]).
//!
//! ## Architectural Layer
//!
//! **Core + port definitions.** This crate has no HTTP client dependency.
//! The wire is behind [`Transport`]; credentials, settings, and session state
//! are behind [`CredentialStore`], [`SettingsStore`], and [`SessionSink`].
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RequestSeq`, `ModelName`, `ApiKey`, etc.) |
//! | [`types`] | Request parameters, wire bodies, activation envelope |
//! | [`errors`] | `RequestError`, `TransportError`, `ConfigError` |
//! | [`config`] | `ClientConfig` endpoints and defaults |
//! | [`cancel`] | Cancellation signal and `AbortHandle` |
//! | [`ports`] | `Transport` and the other consumed capabilities |
//! | [`pending`] | `PendingRequest` and its settlement pipeline |
//! | [`registry`] | `RequestRegistry` |
//! | [`client`] | `InferenceClient` request builders |

pub mod cancel;
pub mod client;
pub mod config;
pub mod errors;
pub mod identifiers;
pub mod pending;
pub mod ports;
pub mod registry;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use cancel::{AbortHandle, CancellationToken};
pub use client::{ClientPorts, InferenceClient};
pub use config::ClientConfig;
pub use errors::{ConfigError, RequestError, TransportError};
pub use identifiers::{AccountId, ApiKey, LoginTicket, ModelName, RequestSeq};
pub use pending::{PendingRequest, RequestOutcome, RequestPhase};
pub use ports::{
    CredentialStore, HttpMethod, SessionSink, SettingsStore, Transport, TransportCall,
    TransportRequest, TransportResponse,
};
pub use registry::RequestRegistry;
pub use types::{
    ActivationResponse, CompletionBody, CompletionParams, LoginOutcome, ReportBody, ReportParams,
    Sources, Temperature, Timestamp,
};
