//! End-to-end tests for the dynaproxy server.
//!
//! Each test starts a fake table store and a proxy in-process, both on
//! ephemeral localhost ports, and talks to the proxy over real HTTP.
//!
//! ```text
//! cargo test -p dynaproxy-integration
//! ```

use std::convert::Infallible;
use std::sync::{Arc, Mutex, Once};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use dynaproxy_core::RuntimeInfo;
use dynaproxy_http::{BoundServer, HttpBackend, ProxyHttpConfig, ProxyHttpService};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// One request received by the fake store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// `X-Amz-Target` header value.
    pub target: String,
    /// Request body.
    pub body: Bytes,
}

/// A table store stand-in that records calls and answers canned documents.
#[derive(Debug, Clone, Default)]
pub struct FakeStore {
    calls: Arc<Mutex<Vec<StoreCall>>>,
}

impl FakeStore {
    /// Start the store on an ephemeral port and return it with its URL.
    pub async fn spawn() -> (Self, String) {
        let store = Self::default();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let calls = Arc::clone(&store.calls);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    continue;
                };
                let calls = Arc::clone(&calls);
                let svc = service_fn(move |req: http::Request<hyper::body::Incoming>| {
                    let calls = Arc::clone(&calls);
                    async move {
                        let target = req
                            .headers()
                            .get("x-amz-target")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_owned();
                        let body = req.into_body().collect().await.unwrap().to_bytes();
                        let (status, reply) = answer(&target, &body);
                        calls.lock().unwrap().push(StoreCall { target, body });

                        let mut resp = http::Response::new(Full::new(Bytes::from(reply)));
                        *resp.status_mut() = status;
                        resp.headers_mut().insert(
                            http::header::CONTENT_TYPE,
                            http::HeaderValue::from_static("application/x-amz-json-1.0"),
                        );
                        Ok::<_, Infallible>(resp)
                    }
                });
                tokio::spawn(async move {
                    let _ = HttpConnBuilder::new(TokioExecutor::new())
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });

        (store, url)
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }
}

fn answer(target: &str, body: &[u8]) -> (http::StatusCode, String) {
    let request: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
    let table = request["TableName"].as_str().unwrap_or_default();
    match target.rsplit('.').next().unwrap_or_default() {
        "DescribeTable" | "DeleteTable" if table == "missing" => (
            http::StatusCode::BAD_REQUEST,
            r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","message":"Requested resource not found"}"#
                .to_owned(),
        ),
        "DescribeTable" => (
            http::StatusCode::OK,
            format!(r#"{{"Table":{{"TableName":"{table}","TableStatus":"ACTIVE"}}}}"#),
        ),
        "ListTables" => (http::StatusCode::OK, r#"{"TableNames":["users"]}"#.to_owned()),
        "GetItem" => (
            http::StatusCode::OK,
            r#"{"Item":{"id":{"S":"1"},"name":{"S":"ada"}}}"#.to_owned(),
        ),
        _ => (http::StatusCode::OK, "{}".to_owned()),
    }
}

/// A running proxy.
#[derive(Debug)]
pub struct Proxy {
    /// Base URL, e.g. `http://127.0.0.1:40123`.
    pub base_url: String,
    /// Serving gate and listen port of the proxy.
    pub runtime: Arc<RuntimeInfo>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Proxy {
    /// Start a proxy relaying to `store_url`.
    pub async fn start(store_url: &str, enable_delete_table: bool) -> Self {
        init_tracing();

        let port = {
            let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
            reserved.local_addr().unwrap().port()
        };
        let backend = HttpBackend::new(store_url, std::time::Duration::from_secs(5)).unwrap();
        let runtime = Arc::new(RuntimeInfo::new());
        let config = ProxyHttpConfig {
            enable_delete_table,
            status_poll_tries: 3,
            status_poll_interval: std::time::Duration::from_millis(10),
            ..ProxyHttpConfig::default()
        };
        let service = ProxyHttpService::new(Arc::new(backend), Arc::clone(&runtime), config);
        let server = BoundServer::bind("127.0.0.1", &[port], service)
            .await
            .unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async {
            rx.await.ok();
        }));
        while !runtime.gate.is_accepting() {
            tokio::task::yield_now().await;
        }

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            runtime,
            shutdown: Some(tx),
            handle,
        }
    }

    /// Full URL of `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Signal shutdown and wait for connections to drain.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        (&mut self.handle).await.unwrap();
    }
}

/// HTTP client for talking to the proxy.
#[must_use]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

#[cfg(test)]
mod test_proxy;
