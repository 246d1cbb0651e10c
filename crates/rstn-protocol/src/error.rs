//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Relay and CAT command encoders."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use thiserror::Error;

/// Errors raised while building hardware commands.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The service is not part of the configured catalogue.
    #[error("unknown service '{0}'")]
    UnknownService(String),
    /// Requested frequency lies outside the tunable range.
    #[error("frequency {hz} Hz outside {min}..={max} Hz")]
    FrequencyOutOfRange { hz: u64, min: u64, max: u64 },
}
