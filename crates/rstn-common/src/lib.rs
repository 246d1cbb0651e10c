//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Shared primitives and utilities for the station runtime."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
//! Shared primitives for the remote station workspace.
//! This crate exposes configuration loading, logging and version metadata
//! consumed by the arbiter, the API surface and the daemon.

pub mod config;
pub mod logging;
pub mod time;
pub mod version;

pub use config::{
    ApiConfig, AppConfig, LoggingConfig, MetricsConfig, SensorsConfig, SerialConfig,
    SerialDeviceConfig, ServiceConfig, StationConfig, TransceiverConfig,
};
pub use logging::{init_tracing, LogFormat};
