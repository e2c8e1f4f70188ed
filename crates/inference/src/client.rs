//! Request builders: inference, feedback report, and login/activation.
//!
//! [`InferenceClient`] turns typed parameters into [`TransportRequest`]s.
//! Only the inference call goes through a [`PendingRequest`] and the
//! registry; the report call is fire-and-forget and the login call is awaited
//! directly by its caller.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::{
    AbortHandle, ActivationResponse, ApiKey, CancellationToken, ClientConfig, CompletionBody,
    CompletionParams, ConfigError, CredentialStore, HttpMethod, LoginOutcome, ModelName,
    PendingRequest, ReportBody, ReportParams, RequestError, RequestRegistry, SessionSink,
    SettingsStore, Transport, TransportCall, TransportRequest,
};

/// External collaborators of an [`InferenceClient`].
#[derive(Clone)]
pub struct ClientPorts {
    pub credentials: Arc<dyn CredentialStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub session: Arc<dyn SessionSink>,
}

/// Builds and issues every request the client makes.
pub struct InferenceClient {
    config: ClientConfig,
    default_model: ModelName,
    transport: Arc<dyn Transport>,
    registry: Arc<RequestRegistry>,
    ports: ClientPorts,
}

impl InferenceClient {
    /// Creates a client. Fails if `config` does not validate.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        registry: Arc<RequestRegistry>,
        ports: ClientPorts,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let default_model = config.default_model_name()?;
        Ok(Self {
            config,
            default_model,
            transport,
            registry,
            ports,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Registry holding this client's in-flight inference calls.
    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    /// Model from settings, or the configured default when none is set.
    pub fn resolve_model(&self) -> ModelName {
        self.ports
            .settings
            .model()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Issues an inference call and returns its registered record.
    ///
    /// The transport gets an abort handle derived from `signal`. A signal that
    /// is already cancelled is still handed to the transport, which then
    /// settles the record as [`RequestError::Aborted`].
    #[instrument(skip_all, fields(cursor0 = params.cursor0, cursor1 = params.cursor1, max_tokens = params.max_tokens))]
    pub fn fetch_completion(
        &self,
        signal: &CancellationToken,
        params: &CompletionParams,
    ) -> Result<Arc<PendingRequest>, RequestError> {
        let model = self.resolve_model();
        let temperature = self.ports.settings.temperature();
        let body = serde_json::to_string(&CompletionBody::new(params, &model, temperature))?;
        let api_key = self.ports.credentials.api_key();

        let request = TransportRequest::new(HttpMethod::Post, &self.config.inference_url)
            .with_header("Authorization", format!("Bearer {}", api_key.expose()))
            .with_body(body);

        let abort = AbortHandle::linked_to(signal);
        let record = Arc::new(
            PendingRequest::new(None, signal.clone()).with_abort_handle(abort.clone()),
        );
        debug!(seq = %record.seq(), %model, "issuing inference call");
        record.attach_stream(&self.registry, self.issue(request, Some(abort)))?;
        Ok(record)
    }

    /// Sends completion feedback in the background.
    ///
    /// Failures are logged and never surfaced; nothing is retried. The handle
    /// is returned only so callers that care (tests, shutdown) can join it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn report(&self, params: ReportParams) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let url = self.config.report_url.clone();
        let api_key = self.ports.credentials.api_key();
        let positive = params.positive;
        let span = tracing::info_span!("report", positive);

        tokio::spawn(
            async move {
                let verdict = if positive { "👍" } else { "👎" };
                let body = match serde_json::to_string(&ReportBody::from(&params)) {
                    Ok(body) => body,
                    Err(err) => {
                        warn!(error = %err, "could not encode report");
                        return;
                    }
                };
                let request = TransportRequest::new(HttpMethod::Post, url)
                    .with_header("Authorization", api_key.expose())
                    .with_body(body);
                match transport.send(request, None).await {
                    Ok(response) => info!(verdict, status = response.status(), "report delivered"),
                    Err(err) => warn!(verdict, error = %err, "report failed"),
                }
            }
            .instrument(span),
        )
    }

    /// Exchanges the session's login ticket for an API key.
    ///
    /// On `OK` whichever of the key and fine-tune preference are present are
    /// stored. The session is marked logged-in and told the login completed
    /// only when the reply names an account. On any transport or decode
    /// failure the session is marked logged-out and shown an error.
    #[instrument(skip_all)]
    pub async fn login(&self) -> Result<LoginOutcome, RequestError> {
        let session = &self.ports.session;
        if let Some(account) = session.account() {
            debug!(%account, "already logged in");
            return Ok(LoginOutcome::AlreadyLoggedIn);
        }

        match self.activate().await {
            Ok(ActivationResponse::Ok {
                secret_api_key,
                fine_tune,
                account,
            }) => {
                if let Some(key) = secret_api_key {
                    self.ports.credentials.update_api_key(ApiKey::new(key));
                }
                self.ports.credentials.update_fine_tune(fine_tune);
                match &account {
                    Some(account) => {
                        info!(%account, "login succeeded");
                        session.mark_logged_in(account.clone());
                        session.set_guest_status(false);
                        session.login_completed();
                    }
                    None => warn!("login accepted without an account"),
                }
                Ok(LoginOutcome::LoggedIn { account })
            }
            Ok(ActivationResponse::Failed {
                human_readable_message,
            }) => {
                warn!(message = %human_readable_message, "login rejected");
                Ok(LoginOutcome::Rejected {
                    message: human_readable_message,
                })
            }
            Err(err) => {
                warn!(error = %err, "login failed");
                session.set_error_status(true);
                session.mark_logged_out();
                session.show_error(&err.to_string());
                Err(err)
            }
        }
    }

    async fn activate(&self) -> Result<ActivationResponse, RequestError> {
        let ticket = self
            .ports
            .session
            .login_ticket()
            .ok_or(RequestError::MissingTicket)?;
        let request = TransportRequest::new(HttpMethod::Get, &self.config.activation_url)
            .with_header("Authorization", format!("codify-{ticket}"));

        let response = self.transport.send(request, None).await?;
        let status = response.status();
        let json = response.json().await?;
        debug!(status, "activation response received");
        serde_json::from_value(json).map_err(|err| RequestError::Decode {
            message: err.to_string(),
        })
    }

    fn issue(&self, request: TransportRequest, abort: Option<AbortHandle>) -> TransportCall {
        let transport = Arc::clone(&self.transport);
        Box::pin(async move { transport.send(request, abort).await })
    }
}
