//! Persisted Position Sightings
//!
//! One sighting is one accepted, throttled position report. Sightings are
//! immutable once written to the log; the batch path treats them as a
//! read-only stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single persisted position report, enriched from the static-data cache.
///
/// `mmsi` is always a 9-digit numeric string; `imo`, when present, is a
/// 7-digit numeric string. Both are validated before a sighting is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSighting {
    pub ts_utc: DateTime<Utc>,
    pub mmsi: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shiptype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draught: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sog: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cog: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav_status: Option<i64>,
}

/// Strip everything but ASCII digits.
pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A well-formed MMSI: exactly 9 ASCII digits.
pub fn is_mmsi(s: &str) -> bool {
    s.len() == 9 && s.bytes().all(|b| b.is_ascii_digit())
}

/// A well-formed IMO number: exactly 7 ASCII digits.
pub fn is_imo(s: &str) -> bool {
    s.len() == 7 && s.bytes().all(|b| b.is_ascii_digit())
}

/// Coordinate sanity check. Reports outside this range are dropped.
pub fn valid_position(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Normalize an optional free-text field: trim, empty becomes `None`.
pub fn non_empty(s: Option<&str>) -> Option<String> {
    match s {
        Some(v) => {
            let v = v.trim();
            if v.is_empty() {
                None
            } else {
                Some(v.to_string())
            }
        }
        None => None,
    }
}

/// Validate a raw IMO field: strip non-digits, keep only a 7-digit result.
pub fn clean_imo(s: Option<&str>) -> Option<String> {
    let digits = digits_only(s.unwrap_or(""));
    if is_imo(&digits) {
        Some(digits)
    } else {
        None
    }
}
