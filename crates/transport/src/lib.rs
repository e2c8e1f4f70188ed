//! Codify HTTP transport adapter.
//!
//! Implements the [`inference::Transport`] trait over [`reqwest`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Connection handling, header encoding, timeouts, and body
//! reading live here. The [`inference`] crate sees only
//! [`inference::Transport`] and [`inference::TransportResponse`].
//!
//! ## Abort semantics
//!
//! Both the request and the body read race against the [`AbortHandle`]. The
//! race is biased towards the handle, so a handle that fired before `send`
//! was called always yields [`TransportError::Aborted`] without touching the
//! network.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use inference::{
    AbortHandle, HttpMethod, Transport, TransportError, TransportRequest, TransportResponse,
};
use thiserror::Error;
use tracing::debug;

/// Failure to construct an [`HttpTransport`].
#[derive(Debug, Error)]
pub enum HttpTransportError {
    /// The underlying client could not be built (e.g. TLS backend failure).
    #[error("Could not build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client that follows redirects and applies `timeout` to every
    /// request as a whole.
    pub fn new(timeout: Duration) -> Result<Self, HttpTransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("codify/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
        abort: Option<AbortHandle>,
    ) -> Result<Box<dyn TransportResponse>, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };
        debug!(%method, url = %request.url, "sending request");

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = until_aborted(abort.as_ref(), builder.send())
            .await?
            .map_err(|err| TransportError::failed(describe(&err)))?;
        Ok(Box::new(HttpResponse { response, abort }))
    }
}

struct HttpResponse {
    response: reqwest::Response,
    abort: Option<AbortHandle>,
}

#[async_trait]
impl TransportResponse for HttpResponse {
    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    async fn json(self: Box<Self>) -> Result<serde_json::Value, TransportError> {
        let HttpResponse { response, abort } = *self;
        let bytes = until_aborted(abort.as_ref(), response.bytes())
            .await?
            .map_err(|err| TransportError::failed(describe(&err)))?;
        serde_json::from_slice(&bytes).map_err(TransportError::decode)
    }
}

/// Runs `fut` unless `abort` fires first.
async fn until_aborted<F: Future>(
    abort: Option<&AbortHandle>,
    fut: F,
) -> Result<F::Output, TransportError> {
    match abort {
        Some(abort) => tokio::select! {
            biased;
            _ = abort.aborted() => Err(TransportError::Aborted),
            output = fut => Ok(output),
        },
        None => Ok(fut.await),
    }
}

/// Flattens a reqwest error and its source chain into one line.
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5)).expect("client builds")
    }

    #[tokio::test]
    async fn posts_json_and_decodes_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/contrast")
                    .header("authorization", "Bearer sk-test")
                    .header("content-type", "application/json")
                    .json_body(json!({"max_tokens": 50}));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"status": "completed"}));
            })
            .await;

        let request = TransportRequest::new(HttpMethod::Post, server.url("/v1/contrast"))
            .with_header("Authorization", "Bearer sk-test")
            .with_body(json!({"max_tokens": 50}).to_string());
        let response = transport().send(request, None).await.expect("sent");

        assert_eq!(response.status(), 200);
        assert_eq!(response.json().await, Ok(json!({"status": "completed"})));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/api-activate");
                then.status(200).body("<html>oops</html>");
            })
            .await;

        let request = TransportRequest::new(HttpMethod::Get, server.url("/v1/api-activate"));
        let response = transport().send(request, None).await.expect("sent");
        let err = response.json().await.expect_err("not json");
        assert!(matches!(err, TransportError::Decode { .. }));
    }

    #[tokio::test]
    async fn already_fired_handle_aborts_before_sending() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/contrast");
                then.status(200).json_body(json!({}));
            })
            .await;

        let abort = AbortHandle::new();
        abort.abort();
        let request = TransportRequest::new(HttpMethod::Post, server.url("/v1/contrast"));
        let err = transport()
            .send(request, Some(abort))
            .await
            .err()
            .expect("aborted");
        assert_eq!(err, TransportError::Aborted);
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn abort_interrupts_slow_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/contrast");
                then.status(200)
                    .delay(Duration::from_secs(30))
                    .json_body(json!({}));
            })
            .await;

        let abort = AbortHandle::new();
        let trigger = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.abort();
        });

        let request = TransportRequest::new(HttpMethod::Post, server.url("/v1/contrast"));
        let err = transport()
            .send(request, Some(abort))
            .await
            .err()
            .expect("aborted");
        assert!(err.is_abort());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_failure() {
        let request = TransportRequest::new(HttpMethod::Get, "http://127.0.0.1:1/unreachable");
        let err = transport()
            .send(request, None)
            .await
            .err()
            .expect("connection refused");
        assert!(matches!(err, TransportError::Failed { .. }));
    }
}
