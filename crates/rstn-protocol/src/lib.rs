//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Relay and CAT command encoders."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
//! Command encoders for the station hardware.
//!
//! Two command shapes exist: short ASCII relay toggles (`on0`, `off1`) sent to
//! the relay controller UART, and fixed 11-byte CI-V frames that tune the
//! transceiver. Everything here is pure; writing bytes is the job of
//! `rstn-serial`.

pub mod cat;
pub mod error;
pub mod relay;

pub use cat::{
    encode_frequency_command, CatFrame, CivAddresses, CAT_FRAME_LEN, MAX_FREQUENCY_HZ,
    MIN_FREQUENCY_HZ,
};
pub use error::ProtocolError;
pub use relay::{
    encode_service_command, RelayAction, RelayCommand, RelayIndex, ServiceCatalog, ServiceName,
};
