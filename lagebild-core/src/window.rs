//! Origin-Presence Window
//!
//! Tracks, per vessel, the most recent sighting inside an origin geofence.
//! The window is rebuilt for every batch run by scanning the persisted log
//! over `[target_day_start - lookback_days, target_day_end)`; updates are
//! monotonic so scan order does not matter.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest origin-region presence of one vessel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginSighting {
    pub ts: DateTime<Utc>,
    pub region: String,
}

/// Per-vessel map of the most recent origin-region sighting.
#[derive(Debug, Clone, Default)]
pub struct SightingWindow {
    last_seen: HashMap<String, OriginSighting>,
}

impl SightingWindow {
    pub fn new() -> Self {
        SightingWindow::default()
    }

    /// Record an origin-region sighting. Only a strictly later timestamp
    /// overwrites the stored entry for that vessel.
    pub fn update(&mut self, mmsi: &str, ts: DateTime<Utc>, region: &str) {
        match self.last_seen.get_mut(mmsi) {
            Some(existing) => {
                if ts > existing.ts {
                    existing.ts = ts;
                    existing.region = region.to_string();
                }
            }
            None => {
                self.last_seen.insert(
                    mmsi.to_string(),
                    OriginSighting {
                        ts,
                        region: region.to_string(),
                    },
                );
            }
        }
    }

    /// The stored `(ts, region)` for a vessel, if any.
    pub fn last_origin_sighting(&self, mmsi: &str) -> Option<&OriginSighting> {
        self.last_seen.get(mmsi)
    }

    /// Whether the vessel was seen in an origin region at or after `since`.
    pub fn is_origin_seen(&self, mmsi: &str, since: DateTime<Utc>) -> bool {
        self.last_seen
            .get(mmsi)
            .map(|s| s.ts >= since)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_update_is_monotonic() {
        let mut w = SightingWindow::new();
        w.update("273123456", ts("2025-06-01T10:00:00Z"), "Primorsk");
        w.update("273123456", ts("2025-06-01T08:00:00Z"), "Ust-Luga");

        let last = w.last_origin_sighting("273123456").unwrap();
        assert_eq!(last.region, "Primorsk");
        assert_eq!(last.ts, ts("2025-06-01T10:00:00Z"));

        w.update("273123456", ts("2025-06-01T12:00:00Z"), "Ust-Luga");
        assert_eq!(w.last_origin_sighting("273123456").unwrap().region, "Ust-Luga");
    }

    #[test]
    fn test_equal_timestamp_keeps_first() {
        let mut w = SightingWindow::new();
        w.update("273123456", ts("2025-06-01T10:00:00Z"), "Primorsk");
        w.update("273123456", ts("2025-06-01T10:00:00Z"), "Ust-Luga");
        assert_eq!(w.last_origin_sighting("273123456").unwrap().region, "Primorsk");
    }

    #[test]
    fn test_is_origin_seen_boundary() {
        let mut w = SightingWindow::new();
        let lookback_start = ts("2025-05-18T00:00:00Z");
        w.update("111111111", lookback_start, "Murmansk");
        w.update("222222222", lookback_start - chrono::Duration::seconds(1), "Murmansk");

        // Inclusive at the lower bound, not one second before it.
        assert!(w.is_origin_seen("111111111", lookback_start));
        assert!(!w.is_origin_seen("222222222", lookback_start));
        assert!(!w.is_origin_seen("333333333", lookback_start));
    }
}
