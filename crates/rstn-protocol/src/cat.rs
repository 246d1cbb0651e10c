//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Relay and CAT command encoders."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
//! CI-V "set operating frequency" frame.
//!
//! ```text
//!  FE FE <trx> <ctl> 00 <10Hz> <1k/100Hz> <100k/10kHz> <10M/1MHz> 00 FD
//! ```
//!
//! Each frequency byte holds two decimal digits, high digit in the upper
//! nibble. The ones-of-Hz digit is not representable and is dropped.

use std::fmt;

use crate::error::ProtocolError;

pub const MIN_FREQUENCY_HZ: u64 = 1_500_000;
pub const MAX_FREQUENCY_HZ: u64 = 30_000_000;
pub const CAT_FRAME_LEN: usize = 11;

const PREAMBLE: u8 = 0xFE;
const END_OF_MESSAGE: u8 = 0xFD;
/// Transfer operating frequency, no reply expected.
const CMD_TRANSFER_FREQUENCY: u8 = 0x00;

/// Bus addresses of the transceiver and of this controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivAddresses {
    pub transceiver: u8,
    pub controller: u8,
}

/// A fully framed CAT command, ready for the transceiver port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatFrame([u8; CAT_FRAME_LEN]);

impl CatFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn addresses(&self) -> CivAddresses {
        CivAddresses {
            transceiver: self.0[2],
            controller: self.0[3],
        }
    }

    /// Frequency carried by the frame, in Hz (always a multiple of 10).
    pub fn frequency_hz(&self) -> u64 {
        self.0[5..10]
            .iter()
            .rev()
            .fold(0u64, |acc, byte| acc * 100 + u64::from(unpack(*byte)))
    }
}

impl fmt::Display for CatFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spaced = self
            .0
            .iter()
            .map(|byte| hex::encode_upper([*byte]))
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&spaced)
    }
}

/// Encode a "set frequency" frame for `hz`.
///
/// Only `MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ` is accepted; the trailing
/// hundreds-of-MHz byte is therefore always zero.
pub fn encode_frequency_command(
    hz: u64,
    addresses: CivAddresses,
) -> Result<CatFrame, ProtocolError> {
    if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&hz) {
        return Err(ProtocolError::FrequencyOutOfRange {
            hz,
            min: MIN_FREQUENCY_HZ,
            max: MAX_FREQUENCY_HZ,
        });
    }

    let mhz10_1 = hz / 1_000_000;
    let khz100_10 = (hz % 1_000_000) / 10_000;
    let hz1000_100 = (hz % 10_000) / 100;
    let hz10 = ((hz % 100) / 10) * 10;

    Ok(CatFrame([
        PREAMBLE,
        PREAMBLE,
        addresses.transceiver,
        addresses.controller,
        CMD_TRANSFER_FREQUENCY,
        pack(hz10),
        pack(hz1000_100),
        pack(khz100_10),
        pack(mhz10_1),
        0x00,
        END_OF_MESSAGE,
    ]))
}

/// Pack a two-digit decimal group: tens digit times 16 plus units digit.
fn pack(group: u64) -> u8 {
    debug_assert!(group < 100);
    ((group / 10) * 16 + group % 10) as u8
}

fn unpack(byte: u8) -> u8 {
    (byte >> 4) * 10 + (byte & 0x0F)
}
