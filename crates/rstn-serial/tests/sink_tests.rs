//! ---
//! rstn_section: "02-hardware-protocol"
//! rstn_subsection: "integration-tests"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Relay sequencing and transport error reporting."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::io;
use std::time::{Duration, Instant};

use rstn_protocol::{
    encode_frequency_command, CivAddresses, RelayAction, RelayCommand, RelayIndex,
};
use rstn_serial::{
    CommandSink, InboundLogger, RecordingTransport, SerialCommandSink, SerialLink, TransportError,
};
use tokio::sync::broadcast;

const STEP: Duration = Duration::from_millis(80);
const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    sink: SerialCommandSink,
    relay: RecordingTransport,
    transceiver: RecordingTransport,
    errors: broadcast::Receiver<TransportError>,
}

fn harness(step: Duration) -> Harness {
    let (errors_tx, errors) = broadcast::channel(16);
    let relay = RecordingTransport::new();
    let transceiver = RecordingTransport::new();
    let (relay_link, _relay_writer) = SerialLink::spawn("relay", relay.clone(), errors_tx.clone());
    let (trx_link, _trx_writer) = SerialLink::spawn("transceiver", transceiver.clone(), errors_tx);
    Harness {
        sink: SerialCommandSink::new(relay_link, trx_link, step),
        relay,
        transceiver,
        errors,
    }
}

fn commands(action: RelayAction, relays: &[&str]) -> Vec<RelayCommand> {
    relays
        .iter()
        .map(|relay| RelayCommand::new(action, RelayIndex::new(*relay)))
        .collect()
}

#[tokio::test]
async fn relay_commands_are_spaced_by_step_delay() {
    let h = harness(STEP);
    let submitted = Instant::now();
    h.sink.submit(commands(RelayAction::On, &["0", "1"]));
    assert!(
        submitted.elapsed() < STEP,
        "submit must not wait for the sequence"
    );

    let writes = h.relay.wait_for_writes(2, WAIT).await;
    assert_eq!(h.relay.written_text(), vec!["on0", "on1"]);
    assert!(writes[0].at >= submitted);
    assert!(
        writes[1].at.duration_since(submitted) >= STEP,
        "second relay switched after {:?}",
        writes[1].at.duration_since(submitted)
    );
}

#[tokio::test]
async fn single_relay_is_written_immediately() {
    let h = harness(Duration::from_secs(30));
    h.sink.submit(commands(RelayAction::Off, &["0"]));
    let writes = h.relay.wait_for_writes(1, WAIT).await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].bytes, b"off0".to_vec());
}

#[tokio::test]
async fn overlapping_sequences_are_not_cancelled() {
    let h = harness(STEP);
    h.sink.submit(commands(RelayAction::On, &["0", "1"]));
    h.sink.submit(commands(RelayAction::Off, &["0", "1"]));
    assert_eq!(h.sink.pending_sequences(), 2);

    h.sink.drain().await;
    let writes = h.relay.wait_for_writes(4, WAIT).await;
    assert_eq!(writes.len(), 4);
    let mut text = h.relay.written_text();
    let (first, second) = text.split_at_mut(2);
    first.sort();
    second.sort();
    assert_eq!(first, ["off0", "on0"]);
    assert_eq!(second, ["off1", "on1"]);
    assert_eq!(h.sink.pending_sequences(), 0);
}

#[tokio::test]
async fn cat_frames_go_to_transceiver_link() {
    let h = harness(STEP);
    let frame = encode_frequency_command(
        14_195_000,
        CivAddresses {
            transceiver: 0x44,
            controller: 0xE0,
        },
    )
    .unwrap();
    h.sink.submit_frame(frame);

    let writes = h.transceiver.wait_for_writes(1, WAIT).await;
    assert_eq!(writes[0].bytes, frame.to_vec());
    assert!(h.relay.writes().is_empty());
}

#[tokio::test]
async fn writes_on_one_link_keep_fifo_order() {
    let h = harness(STEP);
    let addresses = CivAddresses {
        transceiver: 0x44,
        controller: 0xE0,
    };
    let frames: Vec<_> = [3_573_000u64, 7_074_000, 10_136_000, 14_074_000, 28_074_000]
        .into_iter()
        .map(|hz| encode_frequency_command(hz, addresses).unwrap())
        .collect();
    for frame in &frames {
        h.sink.submit_frame(*frame);
    }
    let writes = h.transceiver.wait_for_writes(frames.len(), WAIT).await;
    let written: Vec<Vec<u8>> = writes.into_iter().map(|write| write.bytes).collect();
    let expected: Vec<Vec<u8>> = frames.iter().map(|frame| frame.to_vec()).collect();
    assert_eq!(written, expected);
}

#[tokio::test]
async fn transport_failures_are_broadcast_not_returned() {
    let mut h = harness(STEP);
    h.relay.fail_writes(io::ErrorKind::BrokenPipe);
    h.sink.submit(commands(RelayAction::On, &["0"]));

    let err = tokio::time::timeout(WAIT, h.errors.recv())
        .await
        .expect("error reported in time")
        .expect("error channel open");
    assert_eq!(err.link, "relay");
    assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    assert!(err.to_string().contains("write failed"));
    assert!(h.relay.writes().is_empty());
}

#[test]
fn inbound_logger_stops_on_request() {
    let reader = io::Cursor::new(b"OK\r\n".to_vec());
    let logger = InboundLogger::spawn("relay", reader).expect("spawn reader thread");
    std::thread::sleep(Duration::from_millis(30));
    logger.stop();
}
