//! ---
//! rstn_section: "01-core-functionality"
//! rstn_subsection: "module"
//! rstn_type: "source"
//! rstn_scope: "code"
//! rstn_description: "Shared primitives and utilities for the station runtime."
//! rstn_version: "v0.1.0"
//! rstn_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Wall-clock timestamp used for session bookkeeping.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Seconds since the Unix epoch with sub-second precision, as reported to clients.
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1_000_000.0
}

/// Convert a std duration into a chrono duration, saturating on overflow.
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn epoch_seconds_keeps_fraction() {
        let at = Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap();
        assert!((epoch_seconds(at) - 1_700_000_000.25).abs() < 1e-6);
    }

    #[test]
    fn to_chrono_matches_seconds() {
        assert_eq!(to_chrono(Duration::from_secs(60)).num_seconds(), 60);
    }
}
