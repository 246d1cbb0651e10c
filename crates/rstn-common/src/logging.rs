//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Shared primitives and utilities for the station runtime."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::{EnvFilter, Targets};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "RSTN_LOG";

/// Station events at info, serial links and arbitration decisions at debug.
pub const DEFAULT_DIRECTIVE: &str = "info,rstn_serial=debug,rstn_core=debug";

/// Target prefix of every event that describes bytes on a serial link.
pub const SERIAL_TARGET: &str = "rstn_serial";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static SERIAL_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static STDOUT_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Available log formats for the daemon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// File names written below [`LoggingConfig::directory`], before the daily suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFiles {
    pub station: String,
    pub serial: String,
}

impl LogFiles {
    pub fn for_prefix(prefix: &str) -> Self {
        Self {
            station: format!("{prefix}.log"),
            serial: format!("{prefix}-serial.log"),
        }
    }
}

/// Pick the filter directive: `RSTN_LOG`, then `RUST_LOG`, then
/// [`DEFAULT_DIRECTIVE`]. An unparsable directive falls back to the default.
pub fn resolve_directive(rstn_log: Option<String>, rust_log: Option<String>) -> String {
    let Some(raw) = rstn_log.or(rust_log) else {
        return DEFAULT_DIRECTIVE.to_owned();
    };
    match EnvFilter::try_new(&raw) {
        Ok(_) => raw,
        Err(err) => {
            eprintln!(
                "invalid log directive '{}' ({}); using '{}'",
                raw, err, DEFAULT_DIRECTIVE
            );
            DEFAULT_DIRECTIVE.to_owned()
        }
    }
}

/// Relay and CAT traffic at debug, regardless of the operator-facing filter.
pub fn serial_traffic_filter() -> Targets {
    Targets::new().with_target(SERIAL_TARGET, Level::DEBUG)
}

/// Initialize the tracing subscriber based on configuration and environment variables.
///
/// * `RSTN_LOG` overrides the log filter (e.g. `info`, `debug,rstn_serial=trace`)
///   for stdout and the station file.
/// * Stdout receives JSON or pretty output depending on [`LoggingConfig::format`].
/// * `{prefix}.log` rolls daily with the same events as stdout, in JSON.
/// * `{prefix}-serial.log` rolls daily with only the serial link events, so a
///   relay or transceiver fault can be replayed without the HTTP noise.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let prefix = config
        .file_prefix
        .clone()
        .unwrap_or_else(|| service_name.to_owned());
    let files = LogFiles::for_prefix(&prefix);

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, &files.station));
    let (serial_writer, serial_guard) =
        tracing_appender::non_blocking(daily(&config.directory, &files.serial));
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let _ = FILE_GUARD.set(file_guard);
    let _ = SERIAL_GUARD.set(serial_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);

    let directive = resolve_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );

    let stdout_layer = match config.format {
        LogFormat::StructuredJson => fmt::layer()
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .json()
            .with_writer(stdout_writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(stdout_writer)
            .boxed(),
    }
    .with_filter(EnvFilter::new(&directive));

    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .with_filter(EnvFilter::new(&directive));

    let serial_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(serial_writer)
        .with_filter(serial_traffic_filter());

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .with(serial_layer)
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        serial_log = %files.serial,
        format = ?config.format,
        filter = %directive,
        "tracing initialised"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rstn_log_wins_over_rust_log() {
        assert_eq!(
            resolve_directive(Some("warn".into()), Some("trace".into())),
            "warn"
        );
        assert_eq!(resolve_directive(None, Some("trace".into())), "trace");
        assert_eq!(resolve_directive(None, None), DEFAULT_DIRECTIVE);
    }

    #[test]
    fn broken_directive_falls_back_to_station_default() {
        assert_eq!(
            resolve_directive(Some("rstn_serial=loud".into()), None),
            DEFAULT_DIRECTIVE
        );
    }

    #[test]
    fn serial_file_keeps_only_link_traffic() {
        let filter = serial_traffic_filter();
        assert!(filter.would_enable("rstn_serial::link", &Level::DEBUG));
        assert!(filter.would_enable("rstn_serial::sink", &Level::INFO));
        assert!(!filter.would_enable("rstn_serial::inbound", &Level::TRACE));
        assert!(!filter.would_enable("rstn_core::arbiter", &Level::INFO));
        assert!(!filter.would_enable("tower_http::trace", &Level::ERROR));
    }

    #[test]
    fn log_files_share_the_prefix() {
        assert_eq!(
            LogFiles::for_prefix("rstnd"),
            LogFiles {
                station: "rstnd.log".into(),
                serial: "rstnd-serial.log".into(),
            }
        );
    }
}
