//! ---
//! rstn_section: "05-networking-external-interfaces"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "HTTP surface for operator intents and station status."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
//! HTTP routes in front of the [`Arbiter`].
//!
//! Responses stay deliberately small so that a browser bookmark or `curl`
//! is a usable client: successes answer `OK`, rejections answer HTTP 500
//! with the bare error code (`EAUTH`, `ESERV`, `EVAL`) as body.

pub mod temps;

use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rstn_common::time::{epoch_seconds, utc_now};
use rstn_common::version::VersionInfo;
use rstn_core::{Arbiter, ArbiterError};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::temps::{read_temperatures, SensorReading};

const BANNER: &str = "Hello World";
const OK: &str = "OK";
const VERSION_HEADER: HeaderName = HeaderName::from_static("x-rstn-version");

/// Shared API state exposed to handlers.
pub struct ApiState {
    arbiter: Arc<Arbiter>,
    sensors_dir: PathBuf,
    version: VersionInfo,
}

impl ApiState {
    pub fn new(arbiter: Arc<Arbiter>, sensors_dir: PathBuf, version: VersionInfo) -> Self {
        Self {
            arbiter,
            sensors_dir,
            version,
        }
    }

    fn status(&self) -> StatusResponse {
        let snapshot = self.arbiter.current_status();
        StatusResponse {
            who: snapshot.operator.map(|operator| operator.to_string()),
            service: snapshot.active_service.map(|service| service.to_string()),
            auth_time: snapshot.session_started_at.map(epoch_seconds),
        }
    }
}

impl fmt::Debug for ApiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiState")
            .field("version", &self.version.semver)
            .field("sensors_dir", &self.sensors_dir)
            .finish_non_exhaustive()
    }
}

/// Handle to the running API server.
#[derive(Debug)]
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ApiServer {
    /// Bound address; differs from the configured one when port 0 was requested.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(err.into()),
        }
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(get_banner))
        .route("/status", get(get_status))
        .route("/temps", get(get_temps))
        .route("/tcvr/freq/:freq", get(get_frequency))
        .route("/:token/:service/start", get(get_start))
        .route("/:token/:service/stop", get(get_stop))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve the station routes until shut down.
pub fn spawn_api_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<ApiServer> {
    let router = router(state);

    let listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind API listener {addr}"))?;
    listener
        .set_nonblocking(true)
        .context("failed to configure API listener as non-blocking")?;
    let bound = listener
        .local_addr()
        .context("failed to read API listener address")?;
    let tcp_listener =
        TcpListener::from_std(listener).context("failed to create tokio listener")?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        info!(address = %bound, "api server listening");
        if let Err(err) = axum::serve(tcp_listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
        {
            error!(address = %bound, error = %err, "api server exited with error");
            return Err(err.into());
        }
        Ok(())
    });

    Ok(ApiServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    who: Option<String>,
    service: Option<String>,
    #[serde(rename = "authTime")]
    auth_time: Option<f64>,
}

/// Plain-text rejection carrying an arbiter code.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    code: &'static str,
}

impl From<ArbiterError> for ApiError {
    fn from(err: ArbiterError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: err.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, self.code).into_response()
    }
}

async fn get_banner(State(state): State<Arc<ApiState>>) -> Response {
    match HeaderValue::from_str(&state.version.cli_string()) {
        Ok(version) => ([(VERSION_HEADER, version)], BANNER).into_response(),
        Err(_) => BANNER.into_response(),
    }
}

async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(state.status())
}

async fn get_start(
    State(state): State<Arc<ApiState>>,
    Path((token, service)): Path<(String, String)>,
) -> Result<&'static str, ApiError> {
    service_intent(&state, &token, &service, true)
}

async fn get_stop(
    State(state): State<Arc<ApiState>>,
    Path((token, service)): Path<(String, String)>,
) -> Result<&'static str, ApiError> {
    service_intent(&state, &token, &service, false)
}

fn service_intent(
    state: &ApiState,
    token: &str,
    service: &str,
    turn_on: bool,
) -> Result<&'static str, ApiError> {
    let token = token.to_uppercase();
    let service = service.to_uppercase();
    state
        .arbiter
        .handle_service_intent(&token, &service, turn_on, utc_now())
        .map_err(|err| {
            warn!(service = %service, turn_on, code = err.code(), error = %err, "service intent rejected");
            ApiError::from(err)
        })?;
    Ok(OK)
}

async fn get_frequency(
    State(state): State<Arc<ApiState>>,
    Path(freq): Path<String>,
) -> Result<&'static str, ApiError> {
    let hz = parse_frequency(&freq);
    state.arbiter.set_frequency(hz).map_err(|err| {
        warn!(requested = %freq, code = err.code(), error = %err, "frequency intent rejected");
        ApiError::from(err)
    })?;
    Ok(OK)
}

/// Parse a decimal frequency and round it to whole hertz.
///
/// Anything that is not a finite, non-negative number maps to 0 so that the
/// range check rejects it.
fn parse_frequency(raw: &str) -> u64 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value.round() as u64,
        _ => 0,
    }
}

async fn get_temps(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<SensorReading>>, (StatusCode, String)> {
    let dir = state.sensors_dir.clone();
    let readings = tokio::task::spawn_blocking(move || read_temperatures(&dir))
        .await
        .map_err(|err| internal(anyhow::Error::new(err)))?
        .map_err(internal)?;
    Ok(Json(readings))
}

fn internal(err: anyhow::Error) -> (StatusCode, String) {
    error!(error = %err, "temperature readout failed");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}
