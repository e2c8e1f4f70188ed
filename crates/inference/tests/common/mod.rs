//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use inference::{
    AbortHandle, AccountId, ApiKey, ClientConfig, ClientPorts, CredentialStore, InferenceClient,
    LoginTicket, ModelName, RequestRegistry, SessionSink, SettingsStore, Temperature, Transport,
    TransportError, TransportRequest, TransportResponse,
};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// What the next `send` call does.
#[derive(Debug, Clone)]
pub enum Script {
    /// 200 with this JSON body.
    Json(Value),
    /// 200 with a body that fails to decode.
    Malformed(String),
    /// The request fails before a response arrives.
    Fail(String),
    /// Never answers; resolves to `Aborted` once the abort handle fires.
    Stall,
}

#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    sent: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<TransportRequest> {
        self.sent.lock().expect("sent lock").clone()
    }
}

struct ScriptedResponse {
    body: Result<Value, TransportError>,
}

#[async_trait]
impl TransportResponse for ScriptedResponse {
    fn status(&self) -> u16 {
        200
    }

    async fn json(self: Box<Self>) -> Result<Value, TransportError> {
        self.body
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: TransportRequest,
        abort: Option<AbortHandle>,
    ) -> Result<Box<dyn TransportResponse>, TransportError> {
        self.sent.lock().expect("sent lock").push(request);
        if abort.as_ref().is_some_and(AbortHandle::is_aborted) {
            return Err(TransportError::Aborted);
        }
        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .pop_front()
            .unwrap_or(Script::Stall);
        match script {
            Script::Json(value) => Ok(Box::new(ScriptedResponse { body: Ok(value) })),
            Script::Malformed(message) => Ok(Box::new(ScriptedResponse {
                body: Err(TransportError::Decode { message }),
            })),
            Script::Fail(message) => Err(TransportError::Failed { message }),
            Script::Stall => match abort {
                Some(abort) => {
                    abort.aborted().await;
                    Err(TransportError::Aborted)
                }
                None => std::future::pending().await,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials, settings, session
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCredentials {
    pub api_key: Mutex<String>,
    pub fine_tune: Mutex<Option<Value>>,
}

impl MemoryCredentials {
    pub fn with_key(key: &str) -> Arc<Self> {
        Arc::new(Self {
            api_key: Mutex::new(key.to_string()),
            fine_tune: Mutex::new(None),
        })
    }
}

impl CredentialStore for MemoryCredentials {
    fn api_key(&self) -> ApiKey {
        ApiKey::new(self.api_key.lock().expect("key lock").clone())
    }

    fn update_api_key(&self, key: ApiKey) {
        *self.api_key.lock().expect("key lock") = key.expose().to_string();
    }

    fn update_fine_tune(&self, fine_tune: Option<Value>) {
        *self.fine_tune.lock().expect("fine tune lock") = fine_tune;
    }
}

#[derive(Default)]
pub struct FixedSettings {
    pub model: Option<ModelName>,
    pub temperature: Option<Temperature>,
}

impl SettingsStore for FixedSettings {
    fn model(&self) -> Option<ModelName> {
        self.model.clone()
    }

    fn temperature(&self) -> Option<Temperature> {
        self.temperature
    }
}

#[derive(Default)]
pub struct RecordingSession {
    pub ticket: Option<LoginTicket>,
    pub account: Mutex<Option<AccountId>>,
    pub logged_out: Mutex<bool>,
    pub guest: Mutex<Option<bool>>,
    pub error_status: Mutex<Option<bool>>,
    pub errors_shown: Mutex<Vec<String>>,
    pub logins_completed: Mutex<usize>,
}

impl RecordingSession {
    pub fn with_ticket(ticket: &str) -> Arc<Self> {
        Arc::new(Self {
            ticket: LoginTicket::new(ticket),
            ..Self::default()
        })
    }
}

impl SessionSink for RecordingSession {
    fn login_ticket(&self) -> Option<LoginTicket> {
        self.ticket.clone()
    }

    fn account(&self) -> Option<AccountId> {
        self.account.lock().expect("account lock").clone()
    }

    fn mark_logged_in(&self, account: AccountId) {
        *self.account.lock().expect("account lock") = Some(account);
        *self.logged_out.lock().expect("logged out lock") = false;
    }

    fn mark_logged_out(&self) {
        *self.account.lock().expect("account lock") = None;
        *self.logged_out.lock().expect("logged out lock") = true;
    }

    fn set_guest_status(&self, guest: bool) {
        *self.guest.lock().expect("guest lock") = Some(guest);
    }

    fn set_error_status(&self, error: bool) {
        *self.error_status.lock().expect("error status lock") = Some(error);
    }

    fn show_error(&self, message: &str) {
        self.errors_shown
            .lock()
            .expect("errors lock")
            .push(message.to_string());
    }

    fn login_completed(&self) {
        *self.logins_completed.lock().expect("logins lock") += 1;
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub client: InferenceClient,
    pub transport: Arc<ScriptedTransport>,
    pub credentials: Arc<MemoryCredentials>,
    pub session: Arc<RecordingSession>,
}

pub fn harness(scripts: impl IntoIterator<Item = Script>) -> Harness {
    harness_with(scripts, FixedSettings::default(), RecordingSession::with_ticket("t1"))
}

pub fn harness_with(
    scripts: impl IntoIterator<Item = Script>,
    settings: FixedSettings,
    session: Arc<RecordingSession>,
) -> Harness {
    let transport = ScriptedTransport::new(scripts);
    let credentials = MemoryCredentials::with_key("sk-test");
    let client = InferenceClient::new(
        ClientConfig::default(),
        transport.clone(),
        Arc::new(RequestRegistry::new()),
        ClientPorts {
            credentials: credentials.clone(),
            settings: Arc::new(settings),
            session: session.clone(),
        },
    )
    .expect("default config is valid");
    Harness {
        client,
        transport,
        credentials,
        session,
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// Collects formatted log lines so tests can assert on what was reported.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log lock")).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Installs a thread-local subscriber that records WARN and above.
pub fn capture_warnings() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
