//! ---
//! rstn_section: "15-testing-qa-runbook"
//! rstn_subsection: "integration-tests"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Checks on the configuration shipped with the repository."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rstn_common::AppConfig;
use rstn_core::Arbiter;
use rstn_protocol::{CatFrame, RelayCommand};
use rstn_serial::CommandSink;

fn read(path: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let full = Path::new(manifest_dir).join("..").join(path);
    fs::read_to_string(&full)
        .unwrap_or_else(|err| panic!("failed to read {}: {}", full.display(), err))
}

#[derive(Debug)]
struct DiscardSink;

impl CommandSink for DiscardSink {
    fn submit(&self, _commands: Vec<RelayCommand>) {}
    fn submit_frame(&self, _frame: CatFrame) {}
}

#[test]
fn example_config_matches_station_wiring() {
    let config: AppConfig = read("configs/station.example.toml")
        .parse()
        .expect("example config is valid");
    assert_eq!(config.station.auth_timeout, Duration::from_secs(60));
    assert_eq!(config.station.relay_step_delay, Duration::from_secs(5));
    assert_eq!(config.serial.relay.device, "/dev/ttyAMA0");
    assert_eq!(config.serial.relay.baud_rate, 115_200);
    assert_eq!(config.serial.transceiver.baud_rate, 9_600);
    assert_eq!(config.transceiver.civ_address, 0x44);
    assert_eq!(config.transceiver.controller_address, 224);
    assert_eq!(config.api.listen.port(), 8088);
    assert_eq!(
        config.services.keys().collect::<Vec<_>>(),
        vec!["SDR", "TCVR"]
    );
}

#[test]
fn example_config_builds_an_arbiter() {
    let config: AppConfig = read("configs/station.example.toml").parse().unwrap();
    let arbiter = Arbiter::from_config(&config, Arc::new(DiscardSink)).expect("arbiter");
    assert_eq!(arbiter.catalog().len(), 2);
}

fn dependency_section<'a>(manifest: &'a str, section: &str) -> Vec<&'a str> {
    let header = format!("[{section}]");
    manifest
        .lines()
        .skip_while(|line| line.trim() != header)
        .skip(1)
        .take_while(|line| !line.trim_start().starts_with('['))
        .filter_map(|line| line.split(['.', ' ', '=']).next())
        .filter(|name| !name.is_empty() && !name.starts_with('#'))
        .collect()
}

#[test]
fn json_support_stays_out_of_library_dependencies() {
    let common = read("crates/rstn-common/Cargo.toml");
    assert!(!dependency_section(&common, "dependencies").contains(&"serde_json"));
    assert!(!dependency_section(&common, "dev-dependencies").contains(&"serde_json"));

    let api = read("crates/rstn-api/Cargo.toml");
    assert!(!dependency_section(&api, "dependencies").contains(&"serde_json"));
    assert!(dependency_section(&api, "dev-dependencies").contains(&"serde_json"));
}
