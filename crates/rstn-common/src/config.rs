//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Shared primitives and utilities for the station runtime."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_auth_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_relay_step_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_services() -> IndexMap<String, ServiceConfig> {
    let mut services = IndexMap::new();
    services.insert("SDR".to_owned(), ServiceConfig::with_relays(&["0"]));
    services.insert("TCVR".to_owned(), ServiceConfig::with_relays(&["0", "1"]));
    services
}

fn default_relay_device() -> SerialDeviceConfig {
    SerialDeviceConfig {
        device: "/dev/ttyAMA0".to_owned(),
        baud_rate: 115_200,
        dry_run: false,
    }
}

fn default_transceiver_device() -> SerialDeviceConfig {
    SerialDeviceConfig {
        device: "/dev/ttyUSB0".to_owned(),
        baud_rate: 9_600,
        dry_run: false,
    }
}

fn default_civ_address() -> u8 {
    0x44
}

fn default_controller_address() -> u8 {
    0xE0
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_listen() -> SocketAddr {
    "0.0.0.0:8088".parse().expect("valid default api address")
}

fn default_w1_devices_dir() -> PathBuf {
    PathBuf::from("/sys/bus/w1/devices")
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    "0.0.0.0:9899"
        .parse()
        .expect("valid default metrics address")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the station daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default = "default_services")]
    pub services: IndexMap<String, ServiceConfig>,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub transceiver: TransceiverConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "RSTN_CONFIG";

    /// Load configuration from disk, respecting the `RSTN_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Authorized tokens, uppercased so that comparisons are case-insensitive.
    pub fn normalized_tokens(&self) -> Vec<String> {
        self.station
            .tokens
            .iter()
            .map(|token| token.trim().to_uppercase())
            .collect()
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.station.validate()?;
        if self.services.is_empty() {
            return Err(anyhow!("configuration must declare at least one service"));
        }
        for (name, service) in &self.services {
            service.validate(name)?;
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            station: StationConfig::default(),
            services: default_services(),
            serial: SerialConfig::default(),
            transceiver: TransceiverConfig::default(),
            api: ApiConfig::default(),
            sensors: SensorsConfig::default(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Session arbitration settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    /// Idle window after which an unrefreshed session is torn down.
    #[serde(default = "default_auth_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub auth_timeout: Duration,
    #[serde(default = "default_heartbeat_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub heartbeat_interval: Duration,
    /// Spacing between successive relay commands of one service change.
    #[serde(default = "default_relay_step_delay")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub relay_step_delay: Duration,
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            auth_timeout: default_auth_timeout(),
            heartbeat_interval: default_heartbeat_interval(),
            relay_step_delay: default_relay_step_delay(),
            tokens: Vec::new(),
        }
    }
}

impl StationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tokens.is_empty() {
            return Err(anyhow!("station must authorize at least one token"));
        }
        if self.auth_timeout.is_zero() {
            return Err(anyhow!("station.auth_timeout must be greater than zero"));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(anyhow!(
                "station.heartbeat_interval must be greater than zero"
            ));
        }
        if self.heartbeat_interval > self.auth_timeout {
            return Err(anyhow!(
                "station.heartbeat_interval ({}s) exceeds station.auth_timeout ({}s)",
                self.heartbeat_interval.as_secs(),
                self.auth_timeout.as_secs()
            ));
        }
        Ok(())
    }
}

/// Relay wiring for a single controllable service.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Relay channels toggled for this service, in actuation order.
    #[serde(default)]
    pub relays: Vec<String>,
}

impl ServiceConfig {
    pub fn with_relays(relays: &[&str]) -> Self {
        Self {
            relays: relays.iter().map(|relay| (*relay).to_owned()).collect(),
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(anyhow!("service names must not be empty"));
        }
        if self.relays.is_empty() {
            return Err(anyhow!(
                "service '{}' must declare at least one relay",
                name
            ));
        }
        if self.relays.iter().any(|relay| relay.trim().is_empty()) {
            return Err(anyhow!("service '{}' declares an empty relay index", name));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_relay_device")]
    pub relay: SerialDeviceConfig,
    #[serde(default = "default_transceiver_device")]
    pub transceiver: SerialDeviceConfig,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            relay: default_relay_device(),
            transceiver: default_transceiver_device(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SerialDeviceConfig {
    pub device: String,
    pub baud_rate: u32,
    /// Log writes instead of opening the device.
    #[serde(default)]
    pub dry_run: bool,
}

/// CI-V addressing for the transceiver CAT port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransceiverConfig {
    #[serde(default = "default_civ_address")]
    pub civ_address: u8,
    #[serde(default = "default_controller_address")]
    pub controller_address: u8,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            civ_address: default_civ_address(),
            controller_address: default_controller_address(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_api_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Sysfs directory holding 1-Wire slave devices.
    #[serde(default = "default_w1_devices_dir")]
    pub w1_devices_dir: PathBuf,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            w1_devices_dir: default_w1_devices_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}
