//! Port traits: capabilities the request manager consumes but does not own.
//!
//! Infrastructure crates implement these. The `transport` crate supplies the
//! reqwest-backed [`Transport`]; the binary supplies session and settings
//! implementations; tests supply in-memory fakes.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::{AbortHandle, AccountId, ApiKey, LoginTicket, ModelName, Temperature, TransportError};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// HTTP method of a [`TransportRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// One HTTP request as handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Header name/value pairs, in the order they should be sent.
    pub headers: Vec<(String, String)>,
    /// Pre-encoded JSON body.
    pub body: Option<String>,
}

impl TransportRequest {
    /// Creates a request with a JSON content type and no body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the first header value named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response whose body has not been read yet.
#[async_trait]
pub trait TransportResponse: Send {
    /// HTTP status code.
    fn status(&self) -> u16;

    /// Reads the body and decodes it as an untyped JSON document.
    ///
    /// Returns [`TransportError::Decode`] for malformed JSON and
    /// [`TransportError::Aborted`] if the abort handle fires mid-body.
    async fn json(self: Box<Self>) -> Result<serde_json::Value, TransportError>;
}

/// Performs HTTP requests.
///
/// Implementations must honour `abort`: once it fires, the pending call
/// resolves to [`TransportError::Aborted`]. A handle that has already fired
/// when `send` is called must also produce [`TransportError::Aborted`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        abort: Option<AbortHandle>,
    ) -> Result<Box<dyn TransportResponse>, TransportError>;
}

/// An in-flight transport call, ready to be attached to a pending request.
pub type TransportCall =
    Pin<Box<dyn Future<Output = Result<Box<dyn TransportResponse>, TransportError>> + Send>>;

// ---------------------------------------------------------------------------
// Credentials, settings, session
// ---------------------------------------------------------------------------

/// Stores the API key and fine-tune preference.
pub trait CredentialStore: Send + Sync {
    /// Current API key.
    fn api_key(&self) -> ApiKey;

    /// Replaces the stored API key.
    fn update_api_key(&self, key: ApiKey);

    /// Replaces the stored fine-tune preference (`None` clears it).
    fn update_fine_tune(&self, fine_tune: Option<serde_json::Value>);
}

/// User-editable inference settings.
pub trait SettingsStore: Send + Sync {
    /// Configured model, if any. Empty names count as unset.
    fn model(&self) -> Option<ModelName>;

    /// Configured sampling temperature, if any.
    fn temperature(&self) -> Option<Temperature>;
}

/// Session state owned by the UI layer.
pub trait SessionSink: Send + Sync {
    /// Ticket to exchange at the activation endpoint.
    fn login_ticket(&self) -> Option<LoginTicket>;

    /// Account currently logged in, if any.
    fn account(&self) -> Option<AccountId>;

    /// Records a successful login.
    fn mark_logged_in(&self, account: AccountId);

    /// Clears the logged-in account.
    fn mark_logged_out(&self);

    /// Toggles the "guest" indicator.
    fn set_guest_status(&self, guest: bool);

    /// Toggles the error indicator.
    fn set_error_status(&self, error: bool);

    /// Shows an error notification to the user.
    fn show_error(&self, message: &str);

    /// Called after a successful login so views can refresh.
    fn login_completed(&self) {}
}
