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

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::TransportError;
use crate::transport::SerialTransport;

type SharedTransport = Arc<Mutex<Box<dyn SerialTransport>>>;

/// Handle to one serial device. Writes are queued and drained strictly in
/// submission order by a single writer task.
#[derive(Debug, Clone)]
pub struct SerialLink {
    name: Arc<str>,
    queue: mpsc::UnboundedSender<Vec<u8>>,
    errors: broadcast::Sender<TransportError>,
}

/// Writer task of a [`SerialLink`]. It exits once every link clone is dropped
/// and the queue is empty.
#[derive(Debug)]
pub struct LinkWriter {
    name: Arc<str>,
    task: JoinHandle<()>,
}

impl LinkWriter {
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            error!(link = %self.name, error = %err, "serial writer join error");
        }
    }
}

impl SerialLink {
    pub fn spawn<T: SerialTransport>(
        name: &str,
        transport: T,
        errors: broadcast::Sender<TransportError>,
    ) -> (Self, LinkWriter) {
        let name: Arc<str> = Arc::from(name);
        let (queue, rx) = mpsc::unbounded_channel();
        let boxed: Box<dyn SerialTransport> = Box::new(transport);
        let transport: SharedTransport = Arc::new(Mutex::new(boxed));
        let task = tokio::spawn(drain_queue(
            name.clone(),
            transport,
            rx,
            errors.clone(),
        ));
        (
            Self {
                name: name.clone(),
                queue,
                errors,
            },
            LinkWriter { name, task },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue `bytes` for writing. Never blocks; failures surface on the error channel.
    pub fn enqueue(&self, bytes: Vec<u8>) {
        if self.queue.send(bytes).is_err() {
            report(
                &self.errors,
                TransportError::new(
                    &self.name,
                    "write dropped",
                    io::Error::new(io::ErrorKind::BrokenPipe, "serial writer stopped"),
                ),
            );
        }
    }
}

async fn drain_queue(
    name: Arc<str>,
    transport: SharedTransport,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    errors: broadcast::Sender<TransportError>,
) {
    while let Some(bytes) = rx.recv().await {
        let port = transport.clone();
        let len = bytes.len();
        let outcome = tokio::task::spawn_blocking(move || port.lock().write_bytes(&bytes)).await;
        match outcome {
            Ok(Ok(())) => debug!(link = %name, bytes = len, "serial write complete"),
            Ok(Err(err)) => report(&errors, TransportError::new(&name, "write failed", err)),
            Err(join_err) => report(
                &errors,
                TransportError::new(
                    &name,
                    "write aborted",
                    io::Error::new(io::ErrorKind::Other, join_err.to_string()),
                ),
            ),
        }
    }
    debug!(link = %name, "serial writer stopped");
}

fn report(errors: &broadcast::Sender<TransportError>, err: TransportError) {
    error!(link = %err.link, error = %err, "serial transport error");
    // No subscribers is fine; the log line above is the report of record.
    let _ = errors.send(err);
}
