//! Listen port selection and the accept loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use dynaproxy_core::{CoreError, CoreResult, READ_TIMEOUT, RuntimeInfo};

use crate::service::ProxyHttpService;

/// Host dialed when checking whether a port is taken.
pub const LOCALHOST: &str = "localhost";

/// Whether something already accepts connections on `port`.
///
/// A successful connect means the port is taken; any failure means it is
/// assumed free.
pub async fn port_in_use(port: u16) -> bool {
    TcpStream::connect((LOCALHOST, port)).await.is_ok()
}

/// Pick the first candidate port that `in_use` reports free.
///
/// The check and the later bind are separate steps, so another process can
/// still take the port in between.
///
/// # Errors
///
/// Returns [`CoreError::NoListenPort`] when every candidate is taken.
pub async fn choose_listen_port<F, Fut>(candidates: &[u16], mut in_use: F) -> CoreResult<u16>
where
    F: FnMut(u16) -> Fut,
    Fut: Future<Output = bool>,
{
    for &port in candidates {
        info!(port, "trying listen port");
        if in_use(port).await {
            warn!(port, "port already in use");
            continue;
        }
        return Ok(port);
    }
    Err(CoreError::NoListenPort(candidates.to_vec()))
}

/// A listener bound to the chosen port, not yet accepting.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    service: ProxyHttpService,
    addr: SocketAddr,
}

impl BoundServer {
    /// Choose a port from `candidates`, record it, and bind on `host`.
    ///
    /// # Errors
    ///
    /// Fails when no candidate is free, the listen port was already
    /// recorded, or the bind itself fails.
    pub async fn bind(
        host: &str,
        candidates: &[u16],
        service: ProxyHttpService,
    ) -> CoreResult<Self> {
        let port = choose_listen_port(candidates, port_in_use).await?;
        service.runtime().listen_port.set(port)?;

        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("failed to bind {host}:{port}"))?;
        let addr = listener
            .local_addr()
            .context("failed to read bound address")?;
        Ok(Self {
            listener,
            service,
            addr,
        })
    }

    /// The bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Open the serving gate and accept connections until `shutdown`
    /// resolves, then close the gate and drain in-flight connections.
    pub async fn run<S>(self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let Self {
            listener,
            service,
            addr,
        } = self;
        let runtime: Arc<RuntimeInfo> = Arc::clone(service.runtime());

        let graceful = hyper_util::server::graceful::GracefulShutdown::new();
        let mut http = HttpConnBuilder::new(TokioExecutor::new());
        http.http1()
            .timer(TokioTimer::new())
            .header_read_timeout(READ_TIMEOUT);

        tokio::pin!(shutdown);
        runtime.gate.open();
        info!(%addr, "accepting requests");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                            continue;
                        }
                    };

                    let svc = service.clone();
                    let conn = http.serve_connection(TokioIo::new(stream), svc);
                    let conn = graceful.watch(conn.into_owned());

                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            error!(peer_addr = %peer_addr, error = %e, "connection error");
                        }
                    });
                }

                () = &mut shutdown => {
                    runtime.gate.close();
                    info!("serving gate closed, draining connections");
                    break;
                }
            }
        }

        drop(listener);
        graceful.shutdown().await;
        info!("all connections drained");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use crate::service::ProxyHttpConfig;
    use crate::testing::RecordingBackend;

    #[tokio::test]
    async fn test_should_skip_ports_in_use() {
        let taken: HashSet<u16> = [9999].into_iter().collect();
        let tried = Mutex::new(Vec::new());
        let port = choose_listen_port(&[9999, 8888], |p| {
            tried.lock().unwrap().push(p);
            let busy = taken.contains(&p);
            async move { busy }
        })
        .await
        .unwrap();
        assert_eq!(port, 8888);
        assert_eq!(*tried.lock().unwrap(), vec![9999, 8888]);
    }

    #[tokio::test]
    async fn test_should_fail_when_every_port_is_taken() {
        let err = choose_listen_port(&[1, 2], |_| async { true })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoListenPort(ports) if ports == vec![1, 2]));
    }

    #[tokio::test]
    async fn test_should_detect_occupied_port() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = holder.local_addr().unwrap().port();
        assert!(port_in_use(port).await);
    }

    #[tokio::test]
    async fn test_should_bind_free_port_and_record_it() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let busy = occupied.local_addr().unwrap().port();
        let free = {
            let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
            reserved.local_addr().unwrap().port()
        };

        let svc = ProxyHttpService::new(
            RecordingBackend::new(),
            Arc::new(RuntimeInfo::new()),
            ProxyHttpConfig::default(),
        );
        let runtime = Arc::clone(svc.runtime());
        let server = BoundServer::bind("127.0.0.1", &[busy, free], svc)
            .await
            .unwrap();
        assert_eq!(server.local_addr().port(), free);
        assert_eq!(runtime.listen_port.get(), Some(free));
        assert!(!runtime.gate.is_accepting());
    }

    #[tokio::test]
    async fn test_should_close_gate_on_shutdown() {
        let svc = ProxyHttpService::new(
            RecordingBackend::new(),
            Arc::new(RuntimeInfo::new()),
            ProxyHttpConfig::default(),
        );
        let runtime = Arc::clone(svc.runtime());
        let free = {
            let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
            reserved.local_addr().unwrap().port()
        };
        let server = BoundServer::bind("127.0.0.1", &[free], svc).await.unwrap();
        server.run(async {}).await;
        assert_eq!(runtime.gate.state(), dynaproxy_core::ServingState::Closed);
    }
}
