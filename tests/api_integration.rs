//! ---
//! rstn_section: "15-testing-qa-runbook"
//! rstn_subsection: "integration-tests"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "End-to-end HTTP tests against recorded serial links."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use rstn_api::{spawn_api_server, ApiServer, ApiState};
use rstn_common::version::VersionInfo;
use rstn_common::AppConfig;
use rstn_core::Arbiter;
use rstn_metrics::{new_registry, StationMetrics};
use rstn_serial::{RecordingTransport, SerialCommandSink, SerialLink};
use serde_json::Value;
use tokio::sync::broadcast;

const CONFIG: &str = r#"
[station]
auth_timeout = 60
relay_step_delay = 1
tokens = ["OM4AA-1999", "OM3RRC-1969"]

[services.SDR]
relays = ["0"]
[services.TCVR]
relays = ["0", "1"]
"#;

const STEP: Duration = Duration::from_millis(50);
const WAIT: Duration = Duration::from_secs(2);

struct Station {
    server: ApiServer,
    base: String,
    relay: RecordingTransport,
    transceiver: RecordingTransport,
    metrics: StationMetrics,
    _sensors: tempfile::TempDir,
}

impl Station {
    async fn start() -> Self {
        let config: AppConfig = CONFIG.parse().expect("valid config");
        let (errors, _) = broadcast::channel(8);
        let relay = RecordingTransport::new();
        let transceiver = RecordingTransport::new();
        let (relay_link, _) = SerialLink::spawn("relay", relay.clone(), errors.clone());
        let (trx_link, _) = SerialLink::spawn("transceiver", transceiver.clone(), errors);
        let sink = Arc::new(SerialCommandSink::new(relay_link, trx_link, STEP));
        let metrics = StationMetrics::new(new_registry()).expect("metrics");
        let arbiter = Arbiter::from_config(&config, sink)
            .expect("arbiter")
            .with_metrics(metrics.clone());

        let sensors = tempfile::tempdir().expect("sensor dir");
        let sensor_dir = sensors.path().join("28-0000075a1b2c");
        fs::create_dir_all(&sensor_dir).unwrap();
        fs::write(
            sensor_dir.join("w1_slave"),
            "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n",
        )
        .unwrap();

        let state = Arc::new(ApiState::new(
            Arc::new(arbiter),
            sensors.path().to_path_buf(),
            VersionInfo::current(),
        ));
        let server =
            spawn_api_server(state, "127.0.0.1:0".parse().unwrap()).expect("api server binds");
        let base = format!("http://{}", server.addr());
        Self {
            server,
            base,
            relay,
            transceiver,
            metrics,
            _sensors: sensors,
        }
    }

    async fn get(&self, path: &str) -> (u16, String) {
        let response = reqwest::get(format!("{}{}", self.base, path))
            .await
            .expect("request");
        let status = response.status().as_u16();
        (status, response.text().await.expect("body"))
    }

    async fn status(&self) -> Value {
        let (code, body) = self.get("/status").await;
        assert_eq!(code, 200);
        serde_json::from_str(&body).expect("status json")
    }
}

#[tokio::test]
async fn banner_is_served() {
    let station = Station::start().await;
    let response = reqwest::get(format!("{}/", station.base))
        .await
        .expect("request");
    assert_eq!(response.status().as_u16(), 200);
    let version = response
        .headers()
        .get("x-rstn-version")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    assert_eq!(version, Some(VersionInfo::current().cli_string()));
    assert_eq!(response.text().await.unwrap(), "Hello World");
    station.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn start_status_stop_cycle() {
    let station = Station::start().await;

    assert_eq!(
        station.get("/om4aa-1999/tcvr/start").await,
        (200, "OK".to_owned())
    );
    let writes = station.relay.wait_for_writes(2, WAIT).await;
    assert_eq!(writes.len(), 2);
    assert_eq!(station.relay.written_text(), vec!["on0", "on1"]);

    let status = station.status().await;
    assert_eq!(status["who"], "OM4AA");
    assert_eq!(status["service"], "TCVR");
    assert!(status["authTime"].as_f64().unwrap() > 1_600_000_000.0);

    assert_eq!(
        station.get("/OM4AA-1999/TCVR/stop").await,
        (200, "OK".to_owned())
    );
    station.relay.wait_for_writes(4, WAIT).await;
    assert_eq!(
        station.relay.written_text()[2..],
        ["off0".to_owned(), "off1".to_owned()]
    );

    let status = station.status().await;
    assert_eq!(status["who"], Value::Null);
    assert_eq!(status["service"], Value::Null);
    assert_eq!(status["authTime"], Value::Null);
    assert_eq!(station.metrics.intent_count("start", "ok"), 1);
    assert_eq!(station.metrics.intent_count("stop", "ok"), 1);

    station.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn rejections_answer_500_with_code() {
    let station = Station::start().await;

    assert_eq!(
        station.get("/nobody-0000/SDR/start").await,
        (500, "EAUTH".to_owned())
    );
    assert_eq!(
        station.get("/OM4AA-1999/SDR/start").await,
        (200, "OK".to_owned())
    );
    assert_eq!(
        station.get("/OM3RRC-1969/SDR/start").await,
        (500, "EAUTH".to_owned())
    );
    assert_eq!(
        station.get("/OM4AA-1999/TCVR/start").await,
        (500, "ESERV".to_owned())
    );
    assert_eq!(
        station.get("/OM4AA-1999/HF/start").await,
        (500, "ESERV".to_owned())
    );

    let status = station.status().await;
    assert_eq!(status["who"], "OM4AA");
    assert_eq!(status["service"], "SDR");
    assert_eq!(station.metrics.intent_count("start", "EAUTH"), 2);
    assert_eq!(station.metrics.intent_count("start", "ESERV"), 2);

    station.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn frequency_route_tunes_without_a_session() {
    let station = Station::start().await;

    assert_eq!(
        station.get("/tcvr/freq/14195000.4").await,
        (200, "OK".to_owned())
    );
    let writes = station.transceiver.wait_for_writes(1, WAIT).await;
    assert_eq!(
        writes[0].bytes,
        vec![0xFE, 0xFE, 0x44, 0xE0, 0x00, 0x00, 0x50, 0x19, 0x14, 0x00, 0xFD]
    );

    for bad in ["1499999", "30000001", "abc", "-7074000"] {
        assert_eq!(
            station.get(&format!("/tcvr/freq/{bad}")).await,
            (500, "EVAL".to_owned()),
            "frequency {bad}"
        );
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(station.transceiver.writes().len(), 1);
    assert!(station.relay.writes().is_empty());
    assert_eq!(station.status().await["who"], Value::Null);

    station.server.shutdown().await.unwrap();
}

#[tokio::test]
async fn temperatures_are_listed() {
    let station = Station::start().await;
    let (code, body) = station.get("/temps").await;
    assert_eq!(code, 200);
    let readings: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        readings,
        serde_json::json!([{ "id": "28-0000075a1b2c", "t": 23.1 }])
    );
    station.server.shutdown().await.unwrap();
}
