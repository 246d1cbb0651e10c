//! ---
//! rstn_section: "03-observability"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Metrics collection and export utilities."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across the station crates.
pub type SharedRegistry = Arc<Registry>;

pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
///
/// Binding happens synchronously so a port clash fails daemon startup.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {addr}"))?;
    std_listener
        .set_nonblocking(true)
        .context("failed to configure metrics listener as non-blocking")?;
    let bound = std_listener
        .local_addr()
        .context("failed to read metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .context("failed to convert std listener into tokio listener")?;

    info!(address = %bound, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let task: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static(prometheus::TEXT_FORMAT),
            )],
            body,
        ),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
                String::from("metrics encoding error"),
            )
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Bound address; differs from the configured one when port 0 was requested.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    registry: SharedRegistry,
    starts_total: IntCounter,
    config_load_seconds: Histogram,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "rstnd_starts_total",
            "Total number of times the station daemon has initialised",
        ))?;
        registry.register(Box::new(starts_total.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 16)
            .context("failed to construct histogram buckets")?;
        let config_load_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "rstnd_config_load_seconds",
                "Time spent loading and validating configuration",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(config_load_seconds.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new(
                "rstnd_build_info",
                "Build metadata for the running daemon binary",
            ),
            &["version", "git_sha", "profile"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            registry,
            starts_total,
            config_load_seconds,
            build_info,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn observe_config_load(&self, seconds: f64) {
        self.config_load_seconds.observe(seconds);
    }

    pub fn set_build_info(&self, version: &str, git_sha: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, git_sha, profile])
            .set(1.0);
    }
}

/// Counters for the arbiter and the hardware links.
#[derive(Clone, Debug)]
pub struct StationMetrics {
    registry: SharedRegistry,
    intents: IntCounterVec,
    relay_commands: IntCounterVec,
    cat_frames: IntCounter,
    session_timeouts: IntCounter,
    session_active: IntGauge,
    transport_errors: IntCounterVec,
}

impl StationMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let intents = IntCounterVec::new(
            Opts::new(
                "rstn_intents_total",
                "Operator intents handled by the arbiter, by intent and result code",
            ),
            &["intent", "result"],
        )?;
        registry.register(Box::new(intents.clone()))?;

        let relay_commands = IntCounterVec::new(
            Opts::new(
                "rstn_relay_commands_total",
                "Relay commands submitted to the relay controller",
            ),
            &["action"],
        )?;
        registry.register(Box::new(relay_commands.clone()))?;

        let cat_frames = IntCounter::with_opts(Opts::new(
            "rstn_cat_frames_total",
            "CAT frequency frames submitted to the transceiver",
        ))?;
        registry.register(Box::new(cat_frames.clone()))?;

        let session_timeouts = IntCounter::with_opts(Opts::new(
            "rstn_session_timeouts_total",
            "Sessions evicted by the idle timeout",
        ))?;
        registry.register(Box::new(session_timeouts.clone()))?;

        let session_active = IntGauge::with_opts(Opts::new(
            "rstn_session_active",
            "Whether an operator currently holds the station (0/1)",
        ))?;
        registry.register(Box::new(session_active.clone()))?;

        let transport_errors = IntCounterVec::new(
            Opts::new(
                "rstn_transport_errors_total",
                "Serial write failures by link",
            ),
            &["link"],
        )?;
        registry.register(Box::new(transport_errors.clone()))?;

        Ok(Self {
            registry,
            intents,
            relay_commands,
            cat_frames,
            session_timeouts,
            session_active,
            transport_errors,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn record_intent(&self, intent: &str, result: &str) {
        self.intents.with_label_values(&[intent, result]).inc();
    }

    pub fn record_relay_commands(&self, action: &str, count: usize) {
        self.relay_commands
            .with_label_values(&[action])
            .inc_by(count as u64);
    }

    pub fn record_cat_frame(&self) {
        self.cat_frames.inc();
    }

    pub fn record_session_timeout(&self) {
        self.session_timeouts.inc();
    }

    pub fn set_session_active(&self, active: bool) {
        self.session_active.set(i64::from(active));
    }

    pub fn record_transport_error(&self, link: &str) {
        self.transport_errors.with_label_values(&[link]).inc();
    }

    pub fn intent_count(&self, intent: &str, result: &str) -> u64 {
        self.intents.with_label_values(&[intent, result]).get()
    }

    pub fn session_timeout_count(&self) -> u64 {
        self.session_timeouts.get()
    }
}

pub use prometheus;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn station_metrics_register_once_per_registry() {
        let registry = new_registry();
        let metrics = StationMetrics::new(registry.clone()).expect("register");
        metrics.record_intent("start", "ok");
        metrics.record_relay_commands("on", 2);
        metrics.set_session_active(true);
        assert_eq!(metrics.intent_count("start", "ok"), 1);
        assert!(StationMetrics::new(registry).is_err());
    }

    #[tokio::test]
    async fn exporter_serves_registered_families() {
        let registry = new_registry();
        let daemon = DaemonMetrics::new(registry.clone()).expect("register");
        daemon.inc_start();
        let server = spawn_http_server(registry, "127.0.0.1:0".parse().unwrap()).expect("bind");

        let response = reqwest::get(format!("http://{}/metrics", server.addr()))
            .await
            .expect("scrape");
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        assert_eq!(content_type.as_deref(), Some(prometheus::TEXT_FORMAT));
        let body = response.text().await.expect("body");
        assert!(body.contains("rstnd_starts_total 1"));
        server.shutdown().await.expect("shutdown");
    }
}
