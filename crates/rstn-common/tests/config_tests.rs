//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "integration-tests"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Configuration loading and validation tests."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::fs;
use std::time::Duration;

use rstn_common::config::AppConfig;
use rstn_common::LogFormat;

const STATION_TOML: &str = r#"
[station]
auth_timeout = 90
heartbeat_interval = 2
relay_step_delay = 3
tokens = ["om4aa-1999", "OM3RRC-1969"]

[services.SDR]
relays = ["0"]

[services.TCVR]
relays = ["0", "1"]

[serial.relay]
device = "/dev/ttyAMA0"
baud_rate = 115200

[serial.transceiver]
device = "/dev/ttyUSB0"
baud_rate = 9600
dry_run = true

[transceiver]
civ_address = 0x44
controller_address = 224

[logging]
format = "pretty"
"#;

#[test]
fn parses_full_station_config() {
    let config: AppConfig = STATION_TOML.parse().expect("valid config");
    assert_eq!(config.station.auth_timeout, Duration::from_secs(90));
    assert_eq!(config.station.heartbeat_interval, Duration::from_secs(2));
    assert_eq!(config.station.relay_step_delay, Duration::from_secs(3));
    assert_eq!(
        config.services.keys().collect::<Vec<_>>(),
        vec!["SDR", "TCVR"]
    );
    assert_eq!(config.services["TCVR"].relays, vec!["0", "1"]);
    assert!(config.serial.transceiver.dry_run);
    assert!(!config.serial.relay.dry_run);
    assert_eq!(config.transceiver.civ_address, 0x44);
    assert_eq!(config.transceiver.controller_address, 0xE0);
    assert_eq!(config.logging.format, LogFormat::Pretty);
}

#[test]
fn tokens_are_normalised_to_uppercase() {
    let config: AppConfig = STATION_TOML.parse().expect("valid config");
    assert_eq!(
        config.normalized_tokens(),
        vec!["OM4AA-1999".to_owned(), "OM3RRC-1969".to_owned()]
    );
}

#[test]
fn defaults_mirror_station_wiring() {
    let config: AppConfig = r#"
[station]
tokens = ["OM4AA-1999"]
"#
    .parse()
    .expect("minimal config");
    assert_eq!(config.station.auth_timeout, Duration::from_secs(60));
    assert_eq!(config.station.heartbeat_interval, Duration::from_secs(1));
    assert_eq!(config.station.relay_step_delay, Duration::from_secs(5));
    assert_eq!(config.services["SDR"].relays, vec!["0"]);
    assert_eq!(config.serial.relay.baud_rate, 115_200);
    assert_eq!(config.serial.transceiver.baud_rate, 9_600);
    assert_eq!(config.api.listen.port(), 8088);
}

#[test]
fn rejects_missing_tokens() {
    let err = "[station]\nauth_timeout = 60\n"
        .parse::<AppConfig>()
        .expect_err("tokens are mandatory");
    assert!(err.to_string().contains("token"), "{err}");
}

#[test]
fn rejects_service_without_relays() {
    let err = r#"
[station]
tokens = ["OM4AA-1999"]

[services.SDR]
relays = []
"#
    .parse::<AppConfig>()
    .expect_err("empty relay list");
    assert!(format!("{err:#}").contains("SDR"), "{err:#}");
}

#[test]
fn rejects_heartbeat_longer_than_timeout() {
    let err = r#"
[station]
tokens = ["OM4AA-1999"]
auth_timeout = 5
heartbeat_interval = 10
"#
    .parse::<AppConfig>()
    .expect_err("heartbeat too slow");
    assert!(format!("{err:#}").contains("heartbeat_interval"), "{err:#}");
}

#[test]
fn loads_first_existing_candidate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.toml");
    let present = dir.path().join("station.toml");
    fs::write(&present, STATION_TOML).expect("write config");

    let loaded =
        AppConfig::load_with_source(&[missing.clone(), present.clone()]).expect("load config");
    assert_eq!(loaded.source, present);
    assert_eq!(loaded.config.station.tokens.len(), 2);

    let err = AppConfig::load(&[missing]).expect_err("nothing to load");
    assert!(err.to_string().contains("no configuration files found"));
}
