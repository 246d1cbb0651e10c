//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Serial transports and command sequencing."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

const READ_BUFFER: usize = 256;
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Background reader that logs whatever a device sends back.
///
/// The hardware has no acknowledgement protocol, so inbound bytes are
/// diagnostic only.
#[derive(Debug)]
pub struct InboundLogger {
    link: String,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl InboundLogger {
    /// Start reading from `reader` on a dedicated thread. The reader must have a
    /// finite read timeout so that [`InboundLogger::stop`] is observed.
    pub fn spawn<R>(link: &str, mut reader: R) -> io::Result<Self>
    where
        R: Read + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let link_name = link.to_owned();
        let thread = std::thread::Builder::new()
            .name(format!("rstn-{link}-rx"))
            .spawn(move || {
                let mut buffer = [0u8; READ_BUFFER];
                while !stop_flag.load(Ordering::Relaxed) {
                    match reader.read(&mut buffer) {
                        Ok(0) => std::thread::sleep(IDLE_BACKOFF),
                        Ok(read) => debug!(
                            link = %link_name,
                            data = %String::from_utf8_lossy(&buffer[..read]),
                            "serial data received"
                        ),
                        Err(err) if err.kind() == io::ErrorKind::TimedOut => {}
                        Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                        Err(err) => {
                            warn!(link = %link_name, error = %err, "serial read failed; inbound logging stopped");
                            break;
                        }
                    }
                }
            })?;
        Ok(Self {
            link: link.to_owned(),
            stop,
            thread: Some(thread),
        })
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(link = %self.link, "inbound reader thread panicked");
            }
        }
    }
}
