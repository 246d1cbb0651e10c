//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Serial transports and command sequencing."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Failure writing to a serial device. Reported asynchronously; never rolls back
/// arbiter state.
#[derive(Debug, Clone, Error)]
#[error("{link}: {message}: {source}")]
pub struct TransportError {
    pub link: String,
    pub message: String,
    #[source]
    pub source: Arc<io::Error>,
}

impl TransportError {
    pub fn new(link: &str, message: impl Into<String>, source: io::Error) -> Self {
        Self {
            link: link.to_owned(),
            message: message.into(),
            source: Arc::new(source),
        }
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}
