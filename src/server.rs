/// TLS listener lifecycle: accept, serve, drain
use crate::config::EffectiveConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::metrics::Metrics;
use crate::proxy::RequestHandler;
use crate::tls_utils;
use crate::utils::{BackoffCounter, wildcard_port};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, watch};
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

/// Maximum time a client gets to complete the TLS handshake
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a connection accepted before shutdown may take to send its
/// first request once draining has started
pub const NEW_CONNECTION_GRACE: Duration = Duration::from_secs(5);

/// Accept retry delay bounds, in milliseconds
const ACCEPT_BACKOFF_BASE_MS: u64 = 5;
const ACCEPT_BACKOFF_MAX_MS: u64 = 1000;

/// Pending connections queued by the kernel for a dual-stack listener
const LISTEN_BACKLOG: i32 = 1024;

/// How the accept loop reacts to a failed `accept()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptErrorKind {
    /// Only the connection being accepted is affected; skip it
    Connection,
    /// Out of descriptors, buffers or memory; retried with backoff until it clears
    ResourceExhausted,
    /// The listener itself is unusable
    Fatal,
}

/// Classify an accept error
pub fn classify_accept_error(e: &io::Error) -> AcceptErrorKind {
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => AcceptErrorKind::Connection,
        io::ErrorKind::OutOfMemory => AcceptErrorKind::ResourceExhausted,
        _ if is_resource_exhaustion(e) => AcceptErrorKind::ResourceExhausted,
        _ => AcceptErrorKind::Fatal,
    }
}

#[cfg(unix)]
fn is_resource_exhaustion(e: &io::Error) -> bool {
    use nix::errno::Errno;

    matches!(
        e.raw_os_error().map(Errno::from_raw),
        Some(Errno::EMFILE | Errno::ENFILE | Errno::ENOBUFS | Errno::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_: &io::Error) -> bool {
    false
}

/// Where a [`ProxyServer`] is in its single-shot life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Serving,
    ShuttingDown,
    Stopped,
}

/// Requests a graceful shutdown of a running [`ProxyServer`].
///
/// Cheap to clone and safe to use from any task. Only the first request has
/// an effect.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Stop accepting connections and let in-flight requests finish
    pub fn shutdown(&self) {
        if !self.tx.send_replace(true) {
            info!("Graceful shutdown requested");
        }
    }

    /// Whether shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

/// A bound TLS listener wired to a request handler
pub struct ProxyServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    handler: Arc<dyn RequestHandler>,
    metrics: Metrics,
    shutdown: ShutdownHandle,
    state: watch::Sender<LifecycleState>,
}

impl ProxyServer {
    /// Load the certificate/key pair and bind the listen address
    pub async fn bind(
        config: &EffectiveConfig,
        handler: Arc<dyn RequestHandler>,
        metrics: Metrics,
    ) -> ProxyResult<Self> {
        let tls_config =
            tls_utils::create_server_config(config.cert_file.as_deref(), config.key_file.as_deref())?;
        let acceptor = TlsAcceptor::from(Arc::new(tls_config));

        let listener = bind_listener(&config.listen_addr)
            .await
            .map_err(|source| ProxyError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;

        Ok(Self::from_parts(listener, acceptor, handler, metrics))
    }

    /// Wrap an already bound listener
    pub fn from_parts(
        listener: TcpListener,
        acceptor: TlsAcceptor,
        handler: Arc<dyn RequestHandler>,
        metrics: Metrics,
    ) -> Self {
        let (tx, _) = watch::channel(false);
        let (state, _) = watch::channel(LifecycleState::Idle);

        Self {
            listener,
            acceptor,
            handler,
            metrics,
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
            state,
        }
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle used to request a graceful shutdown
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Observe lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Serve until shutdown is requested and every connection has drained.
    ///
    /// Returns `Ok(())` after a requested shutdown; any other listener
    /// failure is returned immediately.
    pub async fn serve(self) -> ProxyResult<()> {
        let Self {
            listener,
            acceptor,
            handler,
            metrics,
            shutdown,
            state,
        } = self;

        let local_addr = listener.local_addr().map_err(ProxyError::Accept)?;
        let mut shutdown_rx = shutdown.tx.subscribe();
        let mut connections = JoinSet::new();
        let backoff = BackoffCounter::new();

        state.send_replace(LifecycleState::Serving);
        info!("Listening on {}", local_addr);

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown_rx) => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        backoff.reset();
                        metrics.record_connection_opened();
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            acceptor.clone(),
                            Arc::clone(&handler),
                            metrics.clone(),
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(e) => match classify_accept_error(&e) {
                        AcceptErrorKind::Connection => {
                            debug!("Dropped connection during accept on {}: {}", local_addr, e);
                        }
                        AcceptErrorKind::ResourceExhausted => {
                            let delay = backoff.next_delay(ACCEPT_BACKOFF_BASE_MS, ACCEPT_BACKOFF_MAX_MS);
                            warn!(
                                "Accept error on {}: {}; retrying in {:?} (attempt {})",
                                local_addr,
                                e,
                                delay,
                                backoff.attempts()
                            );
                            tokio::select! {
                                _ = shutdown_requested(&mut shutdown_rx) => break,
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        AcceptErrorKind::Fatal => {
                            error!("Listener on {} failed: {}", local_addr, e);
                            state.send_replace(LifecycleState::Stopped);
                            return Err(ProxyError::Accept(e));
                        }
                    },
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!("Connection task failed: {}", e);
                    }
                }
            }
        }

        state.send_replace(LifecycleState::ShuttingDown);
        drop(listener);
        info!(
            "Stopped accepting on {}; draining {} connection(s)",
            local_addr,
            connections.len()
        );

        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!("Connection task failed: {}", e);
            }
        }

        state.send_replace(LifecycleState::Stopped);
        info!("All connections drained");
        Ok(())
    }
}

/// Resolves once shutdown has been requested
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // The sender outlives every receiver.
    let _ = rx.wait_for(|requested| *requested).await;
}

/// Bind a listen address. A bare `:port` listens on every interface,
/// IPv6 and IPv4 alike where the host supports it.
async fn bind_listener(addr: &str) -> io::Result<TcpListener> {
    let Some(port) = wildcard_port(addr) else {
        return TcpListener::bind(addr).await;
    };
    let port: u16 = port.parse().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid port in listen address {:?}", addr),
        )
    })?;

    match bind_dual_stack(port) {
        Ok(listener) => Ok(listener),
        Err(e) => {
            debug!("Dual-stack bind on port {} unavailable ({}); using IPv4", port, e);
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await
        }
    }
}

fn bind_dual_stack(port: u16) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_only_v6(false)?;
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)).into())?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    handler: Arc<dyn RequestHandler>,
    metrics: Metrics,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!("New connection from {}", peer);

    let tls_stream = match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(tls_stream)) => tls_stream,
        Ok(Err(e)) => {
            warn!("TLS handshake with {} failed: {}", peer, e);
            metrics.record_handshake_failure();
            metrics.record_connection_closed();
            return;
        }
        Err(_) => {
            warn!("TLS handshake with {} timed out after {:?}", peer, HANDSHAKE_TIMEOUT);
            metrics.record_handshake_failure();
            metrics.record_connection_closed();
            return;
        }
    };

    // Holds a permit once the first request has been read.
    let first_request = Arc::new(Notify::new());
    let request_seen = Arc::clone(&first_request);
    let service = service_fn(move |req| {
        let handler = Arc::clone(&handler);
        request_seen.notify_one();
        async move { Ok::<_, Infallible>(handler.handle(req, peer).await) }
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .serve_connection(TokioIo::new(tls_stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = shutdown_requested(&mut shutdown_rx) => {
            // A connection that has not sent anything yet may still be
            // writing its first request.
            let finished = tokio::select! {
                res = conn.as_mut() => Some(res),
                _ = first_request.notified() => None,
                _ = tokio::time::sleep(NEW_CONNECTION_GRACE) => None,
            };
            match finished {
                Some(res) => res,
                None => {
                    debug!("Closing connection from {} once in-flight requests finish", peer);
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            }
        }
    };

    if let Err(e) = result {
        debug!("Connection from {} ended with error: {}", peer, e);
    }
    metrics.record_connection_closed();
}
