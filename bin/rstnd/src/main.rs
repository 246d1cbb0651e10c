//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "binary"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Binary entrypoint for the station daemon."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use rstn_api::{spawn_api_server, ApiServer, ApiState};
use rstn_common::config::{AppConfig, SerialDeviceConfig};
use rstn_common::logging::init_tracing;
use rstn_common::version::VersionInfo;
use rstn_core::{Arbiter, HeartbeatScheduler};
use rstn_metrics::{new_registry, spawn_http_server, DaemonMetrics, StationMetrics};
use rstn_protocol::{encode_frequency_command, CivAddresses};
use rstn_serial::{
    InboundLogger, LinkWriter, NullTransport, SerialCommandSink, SerialLink, SerialPortTransport,
    TransportError,
};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

const TRANSPORT_ERROR_CAPACITY: usize = 64;
const WRITER_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    version = concat!("rstnd ", env!("CARGO_PKG_VERSION"), " (", env!("VERGEN_CARGO_TARGET_TRIPLE"), ")"),
    about = "Remote radio station daemon",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the station daemon")]
    Run,
    #[command(about = "Print the CAT frame that tunes the transceiver to HZ")]
    EncodeFreq {
        hz: u64,
        #[arg(long, default_value = "0x44", value_parser = parse_address)]
        civ_address: u8,
        #[arg(long, default_value = "0xE0", value_parser = parse_address)]
        controller_address: u8,
    },
}

fn parse_address(raw: &str) -> Result<u8, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => raw.parse::<u8>(),
    };
    parsed.map_err(|err| format!("invalid bus address '{raw}': {err}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let version = VersionInfo::current();
    if cli.version {
        println!("{}", version.extended());
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::EncodeFreq {
            hz,
            civ_address,
            controller_address,
        } => {
            let frame = encode_frequency_command(
                hz,
                CivAddresses {
                    transceiver: civ_address,
                    controller: controller_address,
                },
            )?;
            println!("{}", hex::encode_upper(frame.as_bytes()));
            Ok(())
        }
        Commands::Run => {
            let mut candidates = Vec::new();
            if let Some(path) = &cli.config {
                candidates.push(path.clone());
            }
            candidates.push(PathBuf::from("configs/station.toml"));
            candidates.push(PathBuf::from("/etc/rstn/station.toml"));
            run_daemon(&candidates, version).await
        }
    }
}

/// One opened serial device with its writer and optional inbound reader.
struct OpenedLink {
    link: SerialLink,
    writer: LinkWriter,
    inbound: Option<InboundLogger>,
}

fn open_link(
    name: &str,
    settings: &SerialDeviceConfig,
    errors: &broadcast::Sender<TransportError>,
) -> Result<OpenedLink> {
    if settings.dry_run {
        warn!(link = name, device = %settings.device, "serial link in dry-run mode");
        let (link, writer) =
            SerialLink::spawn(name, NullTransport::new(&settings.device), errors.clone());
        return Ok(OpenedLink {
            link,
            writer,
            inbound: None,
        });
    }

    let transport = SerialPortTransport::open(&settings.device, settings.baud_rate)
        .with_context(|| format!("failed to open {name} serial device {}", settings.device))?;
    let reader = transport
        .try_clone_port()
        .with_context(|| format!("failed to clone {name} serial device {}", settings.device))?;
    let inbound = InboundLogger::spawn(name, reader)
        .with_context(|| format!("failed to start {name} inbound reader"))?;
    info!(link = name, device = %settings.device, baud_rate = settings.baud_rate, "serial link opened");
    let (link, writer) = SerialLink::spawn(name, transport, errors.clone());
    Ok(OpenedLink {
        link,
        writer,
        inbound: Some(inbound),
    })
}

async fn run_daemon(candidates: &[PathBuf], version: VersionInfo) -> Result<()> {
    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(candidates)?;
    let config = loaded.config;
    let load_duration = load_started.elapsed();

    init_tracing("rstnd", &config.logging)?;
    info!(
        config_path = %loaded.source.display(),
        version = %version.cli_string(),
        services = config.services.len(),
        "configuration loaded"
    );

    let registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.inc_start();
    daemon_metrics.set_build_info(&version.semver, &version.git_sha, &version.profile);

    let (metrics_server, station_metrics) = if config.metrics.enabled {
        let station_metrics = StationMetrics::new(daemon_metrics.registry())?;
        let server = spawn_http_server(registry, config.metrics.listen)?;
        info!(address = %server.addr(), "metrics exporter enabled");
        (Some(server), Some(station_metrics))
    } else {
        info!("metrics exporter disabled by configuration");
        (None, None)
    };

    let (errors, _) = broadcast::channel(TRANSPORT_ERROR_CAPACITY);
    let relay = open_link("relay", &config.serial.relay, &errors)?;
    let transceiver = open_link("transceiver", &config.serial.transceiver, &errors)?;
    let error_monitor = spawn_error_monitor(errors.subscribe(), station_metrics.clone());
    drop(errors);

    let sink = Arc::new(SerialCommandSink::new(
        relay.link,
        transceiver.link,
        config.station.relay_step_delay,
    ));
    let mut arbiter = Arbiter::from_config(&config, sink.clone())?;
    if let Some(metrics) = station_metrics {
        arbiter = arbiter.with_metrics(metrics);
    }
    let arbiter = Arc::new(arbiter);
    info!(
        services = ?arbiter.catalog().names().map(|name| name.as_str()).collect::<Vec<_>>(),
        auth_timeout_s = arbiter.auth_timeout().as_secs(),
        "arbiter ready"
    );

    let heartbeat = HeartbeatScheduler::spawn(arbiter.clone(), config.station.heartbeat_interval);

    let mut api_server: Option<ApiServer> = None;
    if config.api.enabled {
        let state = Arc::new(ApiState::new(
            arbiter.clone(),
            config.sensors.w1_devices_dir.clone(),
            version.clone(),
        ));
        match spawn_api_server(state, config.api.listen) {
            Ok(server) => api_server = Some(server),
            Err(err) => warn!(error = %err, "failed to start api server"),
        }
    } else {
        info!("api server disabled by configuration");
    }

    info!("daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    heartbeat.shutdown().await?;
    if let Some(server) = api_server {
        server.shutdown().await?;
    }

    let drain_budget = drain_budget(&config);
    if tokio::time::timeout(drain_budget, sink.drain()).await.is_err() {
        warn!(budget_s = drain_budget.as_secs(), "relay sequences still pending at shutdown");
    }
    drop(arbiter);
    drop(sink);
    for writer in [relay.writer, transceiver.writer] {
        if tokio::time::timeout(WRITER_GRACE, writer.join()).await.is_err() {
            warn!("serial writer did not drain in time");
        }
    }
    error_monitor.abort();

    for inbound in [relay.inbound, transceiver.inbound].into_iter().flatten() {
        tokio::task::spawn_blocking(move || inbound.stop())
            .await
            .map_err(|err| anyhow!("inbound reader join failure: {err}"))?;
    }

    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    info!("shutdown complete");
    Ok(())
}

/// Longest relay sequence plus one step of slack.
fn drain_budget(config: &AppConfig) -> Duration {
    let longest = config
        .services
        .values()
        .map(|service| service.relays.len())
        .max()
        .unwrap_or(1) as u32;
    config.station.relay_step_delay * longest
}

fn spawn_error_monitor(
    mut errors: broadcast::Receiver<TransportError>,
    metrics: Option<StationMetrics>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match errors.recv().await {
                Ok(err) => {
                    if let Some(metrics) = &metrics {
                        metrics.record_transport_error(&err.link);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "transport error monitor lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_encode_freq() {
        let cli = Cli::parse_from(["rstnd", "encode-freq", "14195000", "--civ-address", "0x5e"]);
        match cli.command {
            Some(Commands::EncodeFreq {
                hz,
                civ_address,
                controller_address,
            }) => {
                assert_eq!(hz, 14_195_000);
                assert_eq!(civ_address, 0x5E);
                assert_eq!(controller_address, 0xE0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn run_is_the_default_command() {
        let cli = Cli::parse_from(["rstnd", "--config", "station.toml"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("station.toml")));
    }

    #[test]
    fn addresses_accept_hex_and_decimal() {
        assert_eq!(parse_address("0xE0"), Ok(0xE0));
        assert_eq!(parse_address("224"), Ok(224));
        assert!(parse_address("0x1FF").is_err());
    }

    #[test]
    fn drain_budget_covers_longest_sequence() {
        let config = AppConfig::default();
        assert_eq!(drain_budget(&config), Duration::from_secs(10));
    }
}
