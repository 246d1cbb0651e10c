//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Serial transports and command sequencing."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serialport::{DataBits, Parity, SerialPort, StopBits};
use tracing::info;

const PORT_TIMEOUT: Duration = Duration::from_millis(500);

/// Blocking byte sink for one serial device.
///
/// Implementations are driven from a blocking worker, one write at a time.
pub trait SerialTransport: Send + 'static {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Real device opened through `serialport`, configured 8N1.
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
}

impl SerialPortTransport {
    pub fn open(device: &str, baud_rate: u32) -> serialport::Result<Self> {
        let port = serialport::new(device, baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .timeout(PORT_TIMEOUT)
            .open()?;
        Ok(Self { port })
    }

    /// Second handle on the same device, used for reading inbound traffic.
    pub fn try_clone_port(&self) -> serialport::Result<Box<dyn SerialPort>> {
        self.port.try_clone()
    }
}

impl SerialTransport for SerialPortTransport {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }
}

/// Dry-run transport that only logs what would have been written.
#[derive(Debug, Clone)]
pub struct NullTransport {
    device: String,
}

impl NullTransport {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl SerialTransport for NullTransport {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        info!(device = %self.device, bytes = ?bytes, "dry-run serial write");
        Ok(())
    }
}

/// A write captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub bytes: Vec<u8>,
    pub at: Instant,
}

/// In-memory transport that records every write with its wall-clock instant.
///
/// Cloned handles share the same record, so one clone can be handed to a
/// link while another inspects the traffic.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
    fail_with: Arc<Mutex<Option<io::ErrorKind>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `kind`.
    pub fn fail_writes(&self, kind: io::ErrorKind) {
        *self.fail_with.lock() = Some(kind);
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }

    /// Recorded payloads rendered as lossy UTF-8, convenient for relay traffic.
    pub fn written_text(&self) -> Vec<String> {
        self.writes
            .lock()
            .iter()
            .map(|write| String::from_utf8_lossy(&write.bytes).into_owned())
            .collect()
    }

    /// Poll until at least `count` writes were recorded or `timeout` elapses.
    pub async fn wait_for_writes(&self, count: usize, timeout: Duration) -> Vec<RecordedWrite> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let writes = self.writes();
            if writes.len() >= count || tokio::time::Instant::now() >= deadline {
                return writes;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl SerialTransport for RecordingTransport {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        if let Some(kind) = *self.fail_with.lock() {
            return Err(io::Error::new(kind, "recording transport configured to fail"));
        }
        self.writes.lock().push(RecordedWrite {
            bytes: bytes.to_vec(),
            at: Instant::now(),
        });
        Ok(())
    }
}
