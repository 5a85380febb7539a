use crate::config::EffectiveConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::metrics::Metrics;
use crate::proxy::{RequestHandler, SingleHostProxy};
use crate::server::{LifecycleState, ProxyServer, ShutdownHandle};
use crate::upstream::create_http_client;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Wires the effective configuration to a listener, a forwarding handler and
/// a signal watcher
pub struct App {
    config: Arc<EffectiveConfig>,
    metrics: Metrics,
}

impl App {
    pub fn new(config: EffectiveConfig) -> Self {
        Self {
            config: Arc::new(config),
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Bind the listener and serve until SIGINT/SIGTERM, then drain.
    ///
    /// Startup failures and listener failures are returned; a signal-driven
    /// shutdown returns `Ok(())` once every in-flight request has finished.
    pub async fn run(self) -> ProxyResult<()> {
        self.start().await?.wait().await
    }

    /// Bind the listener, register the termination signals and start serving
    pub async fn start(self) -> ProxyResult<RunningApp> {
        let client = create_http_client()?;
        let handler: Arc<dyn RequestHandler> = Arc::new(
            SingleHostProxy::new(&self.config.upstream, client, self.metrics.clone())
                .map_err(ProxyError::Handler)?,
        );

        let server = ProxyServer::bind(&self.config, handler, self.metrics.clone()).await?;
        let local_addr = server.local_addr().map_err(ProxyError::Accept)?;

        info!(
            "addr={} cert={} key={} upstream={}",
            self.config.listen_addr,
            display_path(self.config.cert_file.as_deref()),
            display_path(self.config.key_file.as_deref()),
            self.config.upstream
        );

        let signals = ShutdownSignals::install()?;
        let shutdown = server.shutdown_handle();
        let state = server.subscribe();
        let watcher = spawn_signal_watcher(signals, shutdown.clone());
        let serving = tokio::spawn(server.serve());

        Ok(RunningApp {
            local_addr,
            shutdown,
            state,
            watcher,
            serving,
            metrics: self.metrics,
        })
    }
}

/// A started [`App`]; the listener is accepting and signals are armed
pub struct RunningApp {
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
    state: watch::Receiver<LifecycleState>,
    watcher: JoinHandle<()>,
    serving: JoinHandle<ProxyResult<()>>,
    metrics: Metrics,
}

impl RunningApp {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Observe lifecycle transitions of the listener
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.clone()
    }

    /// Wait until the listener has stopped and every connection has drained
    pub async fn wait(self) -> ProxyResult<()> {
        let result = self.serving.await.unwrap_or_else(|e| Err(ProxyError::Task(e)));

        // Still pending on the error path.
        self.watcher.abort();

        let snapshot = self.metrics.snapshot();
        info!(
            "Proxy stopped - connections: {}, requests: {} ({} failed), upstream errors: {}",
            snapshot.total_connections,
            snapshot.total_requests,
            snapshot.failed_requests,
            snapshot.upstream_errors
        );

        result
    }
}

fn display_path(path: Option<&std::path::Path>) -> String {
    path.map(|p| p.display().to_string()).unwrap_or_default()
}

/// Wait for one termination signal and request a graceful shutdown
fn spawn_signal_watcher(signals: ShutdownSignals, shutdown: ShutdownHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signal = signals.recv().await;
        info!("Received {}, shutting down gracefully...", signal);
        shutdown.shutdown();
    })
}

/// Termination signals, registered before the listener starts serving
struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl ShutdownSignals {
    #[cfg(unix)]
    fn install() -> ProxyResult<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).map_err(ProxyError::Signal)?,
            terminate: signal(SignalKind::terminate()).map_err(ProxyError::Signal)?,
        })
    }

    #[cfg(windows)]
    fn install() -> ProxyResult<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c().map_err(ProxyError::Signal)?,
        })
    }

    #[cfg(unix)]
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "interrupt",
            _ = self.terminate.recv() => "terminated",
        }
    }

    #[cfg(windows)]
    async fn recv(mut self) -> &'static str {
        self.ctrl_c.recv().await;
        "interrupt"
    }
}
