//! Axum-based verification server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use clickgate_registry::WaiterRegistry;
use clickgate_types::VerifyPolicy;
use clickgate_utils::format_duration;

use crate::config::{RenderKind, ServerConfig};
use crate::handlers::{self, AppState};
use crate::metrics::VerifyMetrics;
use crate::render::{HtmlRender, JsonRender, Render};
use crate::shutdown::ShutdownController;
use crate::{ConfigError, ServerError};

/// Grace period for in-flight TLS connections once shutdown is triggered.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// The verification server: routes, shared registry and lifecycle.
///
/// In-process callers wait through [`VerifyServer::registry`]; visits
/// arrive over HTTP and resolve them.
pub struct VerifyServer {
    config: ServerConfig,
    registry: Arc<WaiterRegistry>,
    policy: Arc<VerifyPolicy>,
    renderer: Arc<dyn Render>,
    metrics: Arc<VerifyMetrics>,
    shutdown: Arc<ShutdownController>,
}

impl VerifyServer {
    /// Create a server from validated configuration with a fresh registry.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let renderer: Arc<dyn Render> = match config.render {
            RenderKind::Json => Arc::new(JsonRender),
            RenderKind::Html => Arc::new(HtmlRender),
        };
        Ok(Self {
            policy: Arc::new(config.policy()),
            registry: Arc::new(WaiterRegistry::new()),
            renderer,
            metrics: Arc::new(VerifyMetrics::new()),
            shutdown: Arc::new(ShutdownController::new()),
            config,
        })
    }

    /// Use an existing registry, e.g. one built on a test clock.
    pub fn with_registry(mut self, registry: Arc<WaiterRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the configured renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn Render>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<WaiterRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &Arc<VerifyPolicy> {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<VerifyMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// The verification routes, ready to serve or to merge into a host router.
    ///
    /// Embedding the router binds nothing and starts no sweep; the host owns
    /// the listener. Serve it with
    /// `into_make_service_with_connect_info::<SocketAddr>()` so blocklist
    /// checks can see the peer address.
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            registry: Arc::clone(&self.registry),
            policy: Arc::clone(&self.policy),
            renderer: Arc::clone(&self.renderer),
            metrics: Arc::clone(&self.metrics),
            trust_forwarded_for: self.config.trust_forwarded_for,
        });

        let mut router = Router::new().route("/verify/:identifier", get(handlers::verify));
        if self.config.enable_metrics {
            router = router.route("/metrics", get(handlers::metrics));
        }
        router.layer(TraceLayer::new_for_http()).with_state(state)
    }

    /// Bind the configured address (plain or TLS) and serve until shutdown.
    ///
    /// A server serves once: when the listener stops, the shutdown
    /// controller is left triggered so that every background task exits.
    pub async fn serve(&self) -> Result<(), ServerError> {
        let addr = self.config.listen_addr;
        if self.config.use_tls {
            return self.serve_tls(addr).await;
        }
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve_with_listener(listener).await
    }

    /// Serve plain HTTP on an already bound listener until shutdown.
    pub async fn serve_with_listener(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener.local_addr()?;
        self.log_startup(local, "http");

        let sweeper = self.spawn_expiry_sweep();
        let mut stop = self.shutdown.subscribe();
        let result = axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { stop.recv().await })
        .await
        .map_err(ServerError::Io);

        self.finish(sweeper).await;
        result
    }

    async fn serve_tls(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let (Some(cert), Some(key)) = (&self.config.tls_cert, &self.config.tls_key) else {
            return Err(ConfigError::MissingTlsFile("tls_cert").into());
        };
        let tls = RustlsConfig::from_pem_file(cert, key)
            .await
            .map_err(ServerError::Tls)?;
        self.log_startup(addr, "https");

        let handle = axum_server::Handle::new();
        let watcher = {
            let handle = handle.clone();
            let mut stop = self.shutdown.subscribe();
            tokio::spawn(async move {
                stop.recv().await;
                handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
            })
        };

        let sweeper = self.spawn_expiry_sweep();
        let result = axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(
                self.router()
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .map_err(|source| ServerError::Bind { addr, source });

        self.finish(sweeper).await;
        watcher.abort();
        result
    }

    fn log_startup(&self, addr: SocketAddr, scheme: &str) {
        info!(
            "verification server listening on {scheme}://{addr} (timeout {}, {} blocked addresses)",
            format_duration(self.policy.timeout),
            self.policy.blocklist.len(),
        );
    }

    /// Periodically time out records nobody visited, until shutdown.
    ///
    /// Started by the `serve*` methods; embedders that only mount
    /// [`router`](Self::router) call it themselves. `None` when disabled.
    pub fn spawn_expiry_sweep(&self) -> Option<JoinHandle<()>> {
        let Some(interval) = self.config.sweep_interval() else {
            debug!("expiry sweep disabled; records expire only when visited");
            return None;
        };
        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.metrics);
        let timeout = self.policy.timeout;
        let mut stop = self.shutdown.subscribe();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    biased;
                    _ = stop.recv() => {
                        debug!("expiry sweep shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = registry.sweep_expired(timeout);
                        metrics.swept_expired.inc_by(report.expired as u64);
                    }
                }
            }
        }))
    }

    /// Stop background tasks after the listener returns, for whatever reason.
    async fn finish(&self, sweeper: Option<JoinHandle<()>>) {
        self.shutdown.shutdown();
        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                warn!("expiry sweep task failed: {e}");
            }
        }
        info!("verification server stopped");
    }
}
