use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::geofence::{GeofenceIndex, RegionRole};
use crate::sighting::{is_imo, PositionSighting};

/// Half-open UTC reporting interval `[start, end)` plus how it was derived.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Zone actually used for the day boundaries ("UTC", "local", "+02:00").
    pub zone_label: String,
    /// Set when the requested zone could not be resolved and UTC was used.
    pub degraded: bool,
}

impl ReportingWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

fn parse_fixed_offset(spec: &str) -> Option<FixedOffset> {
    let (sign, rest) = if let Some(rest) = spec.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = spec.strip_prefix('-') {
        (-1, rest)
    } else {
        return None;
    };
    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (h, m)
    } else if rest.len() == 4 {
        rest.split_at(2)
    } else {
        (rest, "0")
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn day_bounds_in<Tz: TimeZone>(date: NaiveDate, zone: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_naive = date.and_time(NaiveTime::MIN);
    let end_naive = date
        .succ_opt()
        .unwrap_or(date)
        .and_time(NaiveTime::MIN);
    let start = zone
        .from_local_datetime(&start_naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| start_naive.and_utc());
    let mut end = zone
        .from_local_datetime(&end_naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| end_naive.and_utc());
    if end <= start {
        end = start + chrono::Duration::days(1);
    }
    (start, end)
}

/// Resolve a calendar date plus a timezone spec into a half-open UTC
/// interval.
///
/// Accepted specs: `UTC` (any case), `local` (system zone), or a fixed
/// offset such as `+02:00`. Anything else degrades to UTC; the caller is
/// expected to warn when `degraded` is set.
pub fn resolve_day_window(date: NaiveDate, tz_spec: &str) -> ReportingWindow {
    let spec = tz_spec.trim();
    if spec.is_empty() || spec.eq_ignore_ascii_case("utc") {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        return ReportingWindow {
            start,
            end: start + chrono::Duration::days(1),
            zone_label: "UTC".to_string(),
            degraded: false,
        };
    }
    if spec.eq_ignore_ascii_case("local") {
        let (start, end) = day_bounds_in(date, &Local);
        return ReportingWindow {
            start,
            end,
            zone_label: "local".to_string(),
            degraded: false,
        };
    }
    if let Some(offset) = parse_fixed_offset(spec) {
        let (start, end) = day_bounds_in(date, &offset);
        return ReportingWindow {
            start,
            end,
            zone_label: offset.to_string(),
            degraded: false,
        };
    }
    let start = date.and_time(NaiveTime::MIN).and_utc();
    ReportingWindow {
        start,
        end: start + chrono::Duration::days(1),
        zone_label: "UTC".to_string(),
        degraded: true,
    }
}

/// Ordered monitoring-area sightings of one vessel in the reporting window,
/// with resolved identity fields.
#[derive(Debug, Clone, PartialEq)]
pub struct VesselDayRecord {
    pub mmsi: String,
    /// Ascending by timestamp; at least the builder's minimum point count.
    pub points: Vec<PositionSighting>,
    pub imo: Option<String>,
    pub name: Option<String>,
    pub shiptype: Option<String>,
    pub destination: Option<String>,
    pub eta: Option<String>,
    /// Display label: vessel name if known, else "MMSI {id}".
    pub label: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl VesselDayRecord {
    /// Track coordinates as `[lon, lat]` pairs, ascending by time.
    pub fn coordinates(&self) -> Vec<[f64; 2]> {
        self.points.iter().map(|p| [p.lon, p.lat]).collect()
    }

    /// The chronologically last sighting.
    pub fn last_point(&self) -> &PositionSighting {
        &self.points[self.points.len() - 1]
    }
}

fn first_non_empty(a: Option<&String>, b: Option<&String>) -> Option<String> {
    for candidate in [a, b].into_iter().flatten() {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

/// Collects qualifying sightings per vessel and assembles day records.
#[derive(Debug)]
pub struct TrackBuilder {
    window: ReportingWindow,
    min_points: usize,
    points: HashMap<String, Vec<PositionSighting>>,
}

impl TrackBuilder {
    pub fn new(window: ReportingWindow, min_points: usize) -> Self {
        TrackBuilder {
            window,
            min_points: min_points.max(1),
            points: HashMap::new(),
        }
    }

    pub fn window(&self) -> &ReportingWindow {
        &self.window
    }

    /// Keep the sighting if it falls in the window and inside a monitoring
    /// area. Everything else is ignored here; range and id-shape checks
    /// happen where the log is read.
    pub fn observe(&mut self, sighting: &PositionSighting, fences: &GeofenceIndex) {
        if !self.window.contains(sighting.ts_utc) {
            return;
        }
        if !fences.contains_any(sighting.lat, sighting.lon, RegionRole::Monitoring) {
            return;
        }
        self.points
            .entry(sighting.mmsi.clone())
            .or_default()
            .push(sighting.clone());
    }

    /// Assemble records for vessels meeting the minimum point count,
    /// sorted by MMSI for stable output.
    pub fn build(self) -> Vec<VesselDayRecord> {
        let min_points = self.min_points;
        let mut records: Vec<VesselDayRecord> = self
            .points
            .into_iter()
            .filter_map(|(mmsi, mut points)| {
                if points.len() < min_points {
                    return None;
                }
                points.sort_by_key(|p| p.ts_utc);
                let first = &points[0];
                let last = &points[points.len() - 1];

                let imo = first_non_empty(first.imo.as_ref(), last.imo.as_ref())
                    .filter(|v| is_imo(v));
                let name = first_non_empty(first.name.as_ref(), last.name.as_ref());
                let shiptype = first_non_empty(first.shiptype.as_ref(), last.shiptype.as_ref());
                let destination =
                    first_non_empty(last.destination.as_ref(), first.destination.as_ref());
                let eta = first_non_empty(last.eta.as_ref(), first.eta.as_ref());
                let label = name
                    .clone()
                    .unwrap_or_else(|| format!("MMSI {}", mmsi));
                let first_seen = first.ts_utc;
                let last_seen = last.ts_utc;

                Some(VesselDayRecord {
                    mmsi,
                    points,
                    imo,
                    name,
                    shiptype,
                    destination,
                    eta,
                    label,
                    first_seen,
                    last_seen,
                })
            })
            .collect();
        records.sort_by(|a, b| a.mmsi.cmp(&b.mmsi));
        records
    }
}
