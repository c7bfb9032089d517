//! Proxy HTTP service implementing the hyper `Service` trait.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::request::Parts;
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use tracing::{debug, error, warn};

use dynaproxy_core::{ProxyConfig, READ_TIMEOUT, RuntimeInfo, WRITE_TIMEOUT};

use crate::backend::{BackendResponse, StoreBackend};
use crate::compat::{AMZ_TARGET_HEADER, CompatTable};
use crate::error::{HandlerError, ProxyError, ProxyErrorKind, TransportError};
use crate::response::{
    ProxyResponseBody, RequestClock, ResponseOptions, add_common_headers, backend_error_response,
    error_to_response, route_response,
};
use crate::routes::{Route, RouteTable};
use crate::{relay, status};

/// Configuration for the proxy HTTP service.
#[derive(Debug, Clone)]
pub struct ProxyHttpConfig {
    /// Deadline for receiving the full request body.
    pub read_timeout: Duration,
    /// Deadline for producing the response once the request has arrived.
    pub write_timeout: Duration,
    /// Whether `DeleteTable` endpoints are installed.
    pub enable_delete_table: bool,
    /// Default number of `DescribeTable` polls for `/StatusTable/`.
    pub status_poll_tries: u32,
    /// Pause between `/StatusTable/` polls.
    pub status_poll_interval: Duration,
}

impl Default for ProxyHttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            enable_delete_table: false,
            status_poll_tries: 20,
            status_poll_interval: Duration::from_secs(1),
        }
    }
}

impl From<&ProxyConfig> for ProxyHttpConfig {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            read_timeout: READ_TIMEOUT,
            write_timeout: WRITE_TIMEOUT,
            enable_delete_table: config.enable_delete_table,
            status_poll_tries: config.status_poll_tries,
            status_poll_interval: config.status_poll_interval,
        }
    }
}

/// State shared by every request.
pub(crate) struct ProxyShared {
    pub backend: Arc<dyn StoreBackend>,
    pub runtime: Arc<RuntimeInfo>,
    pub routes: RouteTable,
    pub compat: CompatTable,
    pub config: ProxyHttpConfig,
}

impl ProxyShared {
    /// Call the backend, turning a missing response into an internal error.
    pub(crate) async fn call_backend(
        &self,
        target: &str,
        body: Bytes,
    ) -> Result<BackendResponse, HandlerError> {
        let response = self
            .backend
            .endpoint_request(target, body)
            .await
            .map_err(|e| ProxyError::internal(format!("{target} backend call failed: {e}")))?;
        debug!(target, status = %response.status, "backend responded");
        Ok(response)
    }
}

/// Request body that has not been read yet.
///
/// Reading is deferred to the handler; a rejected request never waits on
/// its body.
pub(crate) type PendingBody = Pin<Box<dyn Future<Output = Result<Bytes, HandlerError>> + Send>>;

/// Everything a handler needs to serve one request.
pub(crate) struct RequestContext {
    pub parts: Parts,
    pub body: PendingBody,
    pub reply: Reply,
}

/// Response shaping inputs for one request.
pub(crate) struct Reply {
    pub clock: RequestClock,
    pub options: ResponseOptions,
    pub request_id: String,
}

impl Reply {
    /// Wrap a successful body.
    pub(crate) fn envelope(
        &self,
        name: &str,
        status: StatusCode,
        body: &[u8],
    ) -> Result<Response<ProxyResponseBody>, HandlerError> {
        Ok(route_response(
            name,
            status,
            body,
            &self.clock,
            self.options,
            &self.request_id,
        )?)
    }

    /// Wrap a backend response, forwarding backend errors unchanged.
    pub(crate) fn relay(
        &self,
        name: &str,
        backend: BackendResponse,
    ) -> Result<Response<ProxyResponseBody>, HandlerError> {
        if backend.is_error() {
            debug!(name, status = %backend.status, "forwarding backend error");
            return Ok(backend_error_response(backend));
        }
        self.envelope(name, backend.status, &backend.body)
    }
}

type HandlerResult = Result<Response<ProxyResponseBody>, HandlerError>;

/// Hyper `Service` implementation for the proxy.
///
/// Every request passes the serving gate, is routed on its path, and is
/// handed to exactly one handler. Rejections become JSON error responses;
/// deadline overruns fail the service call, which drops the connection.
#[derive(Clone)]
pub struct ProxyHttpService {
    shared: Arc<ProxyShared>,
}

impl std::fmt::Debug for ProxyHttpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHttpService")
            .field("routes", &self.shared.routes.len())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl ProxyHttpService {
    /// Create the service and install its routes.
    pub fn new(
        backend: Arc<dyn StoreBackend>,
        runtime: Arc<RuntimeInfo>,
        config: ProxyHttpConfig,
    ) -> Self {
        let routes = RouteTable::new(config.enable_delete_table);
        let compat = CompatTable::from_routes(&routes);
        Self {
            shared: Arc::new(ProxyShared {
                backend,
                runtime,
                routes,
                compat,
                config,
            }),
        }
    }

    /// The installed direct routes.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.shared.routes
    }

    /// Process-wide serving state and listen port.
    #[must_use]
    pub fn runtime(&self) -> &Arc<RuntimeInfo> {
        &self.shared.runtime
    }
}

impl<B> hyper::service::Service<Request<B>> for ProxyHttpService
where
    B: http_body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    type Response = Response<ProxyResponseBody>;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let shared = Arc::clone(&self.shared);
        let request_id = uuid::Uuid::new_v4().to_string();

        Box::pin(async move {
            let mut response = process_request(&shared, req, &request_id).await?;
            add_common_headers(&mut response, &request_id);
            Ok(response)
        })
    }
}

/// Run one request through gate, router, and handler.
async fn process_request<B>(
    shared: &ProxyShared,
    req: Request<B>,
    request_id: &str,
) -> Result<Response<ProxyResponseBody>, TransportError>
where
    B: http_body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    debug!(method = %parts.method, path = %parts.uri.path(), request_id, "request");

    if !shared.runtime.gate.is_accepting() {
        let err = ProxyError::bad_request("server is not accepting requests");
        return Ok(reject(&parts, &err));
    }

    let Some(route) = shared.routes.resolve(parts.uri.path()) else {
        let err = ProxyError::not_found(format!("no endpoint at {}", parts.uri.path()));
        return Ok(reject(&parts, &err));
    };

    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();
    let ctx = RequestContext {
        reply: Reply {
            clock: RequestClock::start(),
            options: ResponseOptions::from_query(parts.uri.query()),
            request_id: request_id.to_owned(),
        },
        body: read_body(body, shared.config.read_timeout),
        parts,
    };

    let deadline = shared.config.write_timeout;
    let outcome = match tokio::time::timeout(deadline, dispatch(shared, route, ctx)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(%method, %path, request_id, "response deadline exceeded, dropping connection");
            return Err(TransportError::WriteTimeout(deadline));
        }
    };

    match outcome {
        Ok(response) => Ok(response),
        Err(HandlerError::Reject(err)) => {
            log_rejection(&method, &path, &err);
            Ok(error_to_response(&err))
        }
        Err(HandlerError::Transport(err)) => {
            warn!(%method, %path, request_id, error = %err, "dropping connection");
            Err(err)
        }
    }
}

fn reject(parts: &Parts, err: &ProxyError) -> Response<ProxyResponseBody> {
    log_rejection(&parts.method, parts.uri.path(), err);
    error_to_response(err)
}

fn log_rejection(method: &http::Method, path: &str, err: &ProxyError) {
    match err.kind {
        ProxyErrorKind::Internal => error!(%method, path, error = %err.message, "request failed"),
        ProxyErrorKind::BadRequest | ProxyErrorKind::NotFound => {
            warn!(%method, path, error = %err.message, "request rejected");
        }
    }
}

/// Defer reading the body until a handler asks for it, bounded by `deadline`.
fn read_body<B>(body: B, deadline: Duration) -> PendingBody
where
    B: http_body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    Box::pin(async move {
        match tokio::time::timeout(deadline, body.collect()).await {
            Ok(Ok(collected)) => Ok(collected.to_bytes()),
            Ok(Err(e)) => {
                Err(ProxyError::internal(format!("cannot read request body: {e}")).into())
            }
            Err(_) => Err(TransportError::ReadTimeout(deadline).into()),
        }
    })
}

/// Resolve the compat endpoint to a concrete route, then serve it.
async fn dispatch(shared: &ProxyShared, route: Route, ctx: RequestContext) -> HandlerResult {
    let route = match route {
        Route::Compat => resolve_compat(shared, &ctx.parts)?,
        other => other,
    };
    match route {
        Route::Status => status::status(shared, &ctx),
        Route::Raw(op) => relay::raw(shared, op, ctx).await,
        Route::Validated(op) => relay::validated(shared, op, ctx).await,
        Route::StatusTable => status::status_table(shared, ctx).await,
        Route::RawPost => relay::raw_post(shared, ctx).await,
        Route::Compat => Err(ProxyError::bad_request("compat endpoint cannot target itself").into()),
    }
}

fn resolve_compat(shared: &ProxyShared, parts: &Parts) -> Result<Route, ProxyError> {
    relay::require_method(&parts.method, &[http::Method::POST])?;
    let target = parts
        .headers
        .get(AMZ_TARGET_HEADER)
        .ok_or_else(|| ProxyError::bad_request("missing X-Amz-Target header"))?
        .to_str()
        .map_err(|_| ProxyError::bad_request("X-Amz-Target header is not valid text"))?;
    let route = shared.compat.resolve(target)?;
    debug!(target, route = route.name(), "compat dispatch");
    Ok(route)
}
