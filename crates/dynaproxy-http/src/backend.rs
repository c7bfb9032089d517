//! The store backend seam.
//!
//! The proxy never executes an operation itself. It hands the operation name
//! and a JSON body to a [`StoreBackend`] and relays whatever comes back.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use tracing::debug;

use dynaproxy_model::CURRENT_API_VERSION;

use crate::response::AMZ_JSON_CONTENT_TYPE;

/// Boxed future returned by [`StoreBackend::endpoint_request`].
pub type BackendFuture = Pin<Box<dyn Future<Output = Result<BackendResponse, BackendError>> + Send>>;

/// Raw outcome of a backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    /// Status reported by the backend.
    pub status: StatusCode,
    /// Response body, relayed without inspection.
    pub body: Bytes,
}

impl BackendResponse {
    /// Build a backend response.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A 200 response with the given body.
    #[must_use]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Whether the backend reported a client or server error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

/// A backend call that produced no response at all.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP client could not be constructed.
    #[error("cannot build backend client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request could not be sent or the response could not be read.
    #[error("backend transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// The target cannot be sent as an `X-Amz-Target` header value.
    #[error("invalid backend target: {0:?}")]
    InvalidTarget(String),
}

/// Executes one table-store operation.
///
/// `target` is the bare operation name (`GetItem`), or an arbitrary name for
/// `/RawPost/` passthrough. `body` is the JSON request document.
pub trait StoreBackend: Send + Sync + 'static {
    /// Send one request to the store.
    fn endpoint_request(&self, target: &str, body: Bytes) -> BackendFuture;
}

/// [`StoreBackend`] speaking the DynamoDB JSON protocol over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBackend {
    /// Create a backend posting to `endpoint`, with a per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Build`] if the HTTP client cannot be created.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::Build)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// The endpoint every call is posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl StoreBackend for HttpBackend {
    fn endpoint_request(&self, target: &str, body: Bytes) -> BackendFuture {
        let amz_target = format!("{CURRENT_API_VERSION}.{target}");
        let Ok(amz_target) = http::HeaderValue::from_str(&amz_target) else {
            return Box::pin(std::future::ready(Err(BackendError::InvalidTarget(
                target.to_owned(),
            ))));
        };
        debug!(target = ?amz_target, endpoint = %self.endpoint, "calling backend");
        let request = self
            .client
            .post(&self.endpoint)
            .header("x-amz-target", amz_target)
            .header(http::header::CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .body(body);

        Box::pin(async move {
            let response = request.send().await.map_err(BackendError::Transport)?;
            let status = response.status();
            let body = response.bytes().await.map_err(BackendError::Transport)?;
            Ok(BackendResponse { status, body })
        })
    }
}
