//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Serial transports and command sequencing."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use rstn_protocol::{CatFrame, RelayCommand};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::link::SerialLink;

/// Destination for encoded hardware commands.
///
/// Both calls return immediately. Transport failures are reported on the
/// links' error channel, never to the caller.
pub trait CommandSink: Send + Sync + fmt::Debug {
    /// Write `commands` to the relay controller, spaced by the step delay.
    fn submit(&self, commands: Vec<RelayCommand>);

    /// Write a CAT frame to the transceiver in a single attempt.
    fn submit_frame(&self, frame: CatFrame);
}

/// [`CommandSink`] backed by a relay link and a transceiver link.
///
/// Each `submit` call becomes its own sequence task: command `i` is queued
/// `i × step_delay` after submission so that relays never switch together.
/// Sequences are not cancelled; a later call simply runs alongside.
#[derive(Debug)]
pub struct SerialCommandSink {
    relay: SerialLink,
    transceiver: SerialLink,
    step_delay: Duration,
    sequences: Mutex<Vec<JoinHandle<()>>>,
}

impl SerialCommandSink {
    pub fn new(relay: SerialLink, transceiver: SerialLink, step_delay: Duration) -> Self {
        Self {
            relay,
            transceiver,
            step_delay,
            sequences: Mutex::new(Vec::new()),
        }
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    /// Number of relay sequences still running.
    pub fn pending_sequences(&self) -> usize {
        let mut sequences = self.sequences.lock();
        sequences.retain(|handle| !handle.is_finished());
        sequences.len()
    }

    /// Wait for every relay sequence submitted so far to queue its last command.
    pub async fn drain(&self) {
        let handles = std::mem::take(&mut *self.sequences.lock());
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "relay sequence join error");
            }
        }
    }
}

impl CommandSink for SerialCommandSink {
    fn submit(&self, commands: Vec<RelayCommand>) {
        if commands.is_empty() {
            return;
        }
        let link = self.relay.clone();
        let step_delay = self.step_delay;
        let submitted_at = Instant::now();
        let handle = tokio::spawn(async move {
            for (step, command) in commands.into_iter().enumerate() {
                if step > 0 {
                    tokio::time::sleep_until(submitted_at + step_delay * step as u32).await;
                }
                info!(link = %link.name(), command = %command, step, "relay command");
                link.enqueue(command.to_bytes());
            }
        });

        let mut sequences = self.sequences.lock();
        sequences.retain(|handle| !handle.is_finished());
        sequences.push(handle);
    }

    fn submit_frame(&self, frame: CatFrame) {
        debug!(link = %self.transceiver.name(), frame = %frame, hz = frame.frequency_hz(), "cat frame");
        self.transceiver.enqueue(frame.to_vec());
    }
}
