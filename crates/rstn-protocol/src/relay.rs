//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Relay and CAT command encoders."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ProtocolError;

/// Name of a relay-gated service (`SDR`, `TCVR`, ...). Always uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical relay channel identifier as understood by the relay controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RelayIndex(String);

impl RelayIndex {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelayIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayAction {
    On,
    Off,
}

impl RelayAction {
    pub fn from_state(turn_on: bool) -> Self {
        if turn_on {
            RelayAction::On
        } else {
            RelayAction::Off
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelayAction::On => "on",
            RelayAction::Off => "off",
        }
    }
}

/// A single relay toggle, rendered on the wire as action followed by index (`on0`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayCommand {
    pub action: RelayAction,
    pub relay: RelayIndex,
}

impl RelayCommand {
    pub fn new(action: RelayAction, relay: RelayIndex) -> Self {
        Self { action, relay }
    }

    /// Exact bytes written to the relay UART. No terminator is appended.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.action.as_str(), self.relay)
    }
}

/// Ordered mapping of services to the relays that power them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: IndexMap<ServiceName, Vec<RelayIndex>>,
}

impl ServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service`, keeping the relay order as given.
    pub fn with_service<I, S>(mut self, service: &str, relays: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.insert(
            ServiceName::new(service),
            relays.into_iter().map(RelayIndex::new).collect(),
        );
        self
    }

    pub fn contains(&self, service: &ServiceName) -> bool {
        self.services.contains_key(service)
    }

    pub fn relays(&self, service: &ServiceName) -> Option<&[RelayIndex]> {
        self.services.get(service).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &ServiceName> {
        self.services.keys()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Build the relay command sequence that switches `service` on or off.
///
/// One command per configured relay, in the service's configured order.
pub fn encode_service_command(
    catalog: &ServiceCatalog,
    service: &ServiceName,
    turn_on: bool,
) -> Result<Vec<RelayCommand>, ProtocolError> {
    let relays = catalog
        .relays(service)
        .ok_or_else(|| ProtocolError::UnknownService(service.to_string()))?;
    let action = RelayAction::from_state(turn_on);
    Ok(relays
        .iter()
        .cloned()
        .map(|relay| RelayCommand::new(action, relay))
        .collect())
}
