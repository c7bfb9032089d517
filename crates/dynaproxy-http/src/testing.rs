//! In-memory backend and request helpers for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::Full;

use dynaproxy_core::RuntimeInfo;

use crate::backend::{BackendError, BackendFuture, BackendResponse, StoreBackend};
use crate::response::ProxyResponseBody;
use crate::service::{ProxyHttpConfig, ProxyHttpService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Answer,
    Fail,
    Stall,
}

/// Backend that records every call and answers from a script.
///
/// Scripted responses are returned in order; once exhausted, every call gets
/// `200 {}`.
#[derive(Debug)]
pub(crate) struct RecordingBackend {
    calls: Mutex<Vec<(String, Bytes)>>,
    script: Mutex<VecDeque<BackendResponse>>,
    mode: Mode,
}

impl RecordingBackend {
    fn with_mode(responses: Vec<BackendResponse>, mode: Mode) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(responses.into()),
            mode,
        })
    }

    pub(crate) fn new() -> Arc<Self> {
        Self::with_mode(Vec::new(), Mode::Answer)
    }

    pub(crate) fn with_responses(responses: Vec<BackendResponse>) -> Arc<Self> {
        Self::with_mode(responses, Mode::Answer)
    }

    /// Every call fails without a response.
    pub(crate) fn failing() -> Arc<Self> {
        Self::with_mode(Vec::new(), Mode::Fail)
    }

    /// Every call hangs forever.
    pub(crate) fn stalled() -> Arc<Self> {
        Self::with_mode(Vec::new(), Mode::Stall)
    }

    pub(crate) fn calls(&self) -> Vec<(String, Bytes)> {
        self.calls.lock().unwrap().clone()
    }
}

impl StoreBackend for RecordingBackend {
    fn endpoint_request(&self, target: &str, body: Bytes) -> BackendFuture {
        self.calls.lock().unwrap().push((target.to_owned(), body));
        let target = target.to_owned();
        let next = self.script.lock().unwrap().pop_front();
        let mode = self.mode;
        Box::pin(async move {
            match mode {
                Mode::Answer => Ok(next.unwrap_or_else(|| BackendResponse::ok("{}"))),
                Mode::Fail => Err(BackendError::InvalidTarget(target)),
                Mode::Stall => std::future::pending().await,
            }
        })
    }
}

/// A service over `backend` with its serving gate open.
pub(crate) fn service(backend: Arc<RecordingBackend>, config: ProxyHttpConfig) -> ProxyHttpService {
    let svc = ProxyHttpService::new(backend, Arc::new(RuntimeInfo::new()), config);
    svc.runtime().gate.open();
    svc
}

pub(crate) fn request(method: Method, uri: &str, body: &str) -> Request<Full<Bytes>> {
    let mut req = Request::new(Full::new(Bytes::from(body.to_owned())));
    *req.method_mut() = method;
    *req.uri_mut() = uri.parse().unwrap();
    req
}

/// Call the service, failing the test on a transport error.
pub(crate) async fn call(
    svc: &ProxyHttpService,
    req: Request<Full<Bytes>>,
) -> Response<ProxyResponseBody> {
    hyper::service::Service::call(svc, req).await.unwrap()
}
