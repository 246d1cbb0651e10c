//! ---
//! rstn_section: "05-networking-external-interfaces"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "1-Wire temperature sensor readout."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
//! DS18B20 sensors exposed by the Linux `w1-therm` driver.
//!
//! Each sensor is a `28-*` directory holding a `w1_slave` file such as:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

const DS18B20_FAMILY: &str = "28-";
const SLAVE_FILE: &str = "w1_slave";

/// One sensor reading in degrees Celsius, rounded to a tenth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub id: String,
    pub t: f64,
}

/// Read every DS18B20 below `devices_dir`. Sensors with a failed CRC are skipped.
pub fn read_temperatures(devices_dir: &Path) -> Result<Vec<SensorReading>> {
    if !devices_dir.exists() {
        debug!(dir = %devices_dir.display(), "1-wire bus not present");
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(devices_dir)
        .with_context(|| format!("unable to list {}", devices_dir.display()))?;

    let mut readings = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("unable to list {}", devices_dir.display()))?;
        let id = entry.file_name().to_string_lossy().into_owned();
        if !id.starts_with(DS18B20_FAMILY) {
            continue;
        }
        let path = entry.path().join(SLAVE_FILE);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        match parse_w1_slave(&raw) {
            Some(t) => readings.push(SensorReading { id, t }),
            None => warn!(sensor = %id, "discarding sensor reading with bad crc or format"),
        }
    }
    readings.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(readings)
}

fn parse_w1_slave(raw: &str) -> Option<f64> {
    let mut lines = raw.lines();
    if !lines.next()?.trim_end().ends_with("YES") {
        return None;
    }
    let (_, milli) = lines.next()?.split_once("t=")?;
    let milli: i64 = milli.trim().parse().ok()?;
    Some((milli as f64 / 100.0).round() / 10.0)
}
