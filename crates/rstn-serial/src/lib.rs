//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Serial transports and command sequencing."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
//! Serial command sink for the station hardware.
//!
//! ```text
//!  CommandSink::submit ──▶ relay sequence task ──▶ SerialLink (FIFO) ──▶ UART
//!  CommandSink::submit_frame ───────────────────▶ SerialLink (FIFO) ──▶ CAT port
//!                                                        │
//!                                            TransportError broadcast
//! ```

mod error;
mod inbound;
mod link;
mod sink;
mod transport;

pub use error::TransportError;
pub use inbound::InboundLogger;
pub use link::{LinkWriter, SerialLink};
pub use sink::{CommandSink, SerialCommandSink};
pub use transport::{
    NullTransport, RecordedWrite, RecordingTransport, SerialPortTransport, SerialTransport,
};
