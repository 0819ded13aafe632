//! Daily Batch Pipeline
//!
//! Single-pass job over a stable snapshot of the persisted log: one scan
//! feeds both the origin-presence window (lookback horizon) and the track
//! builder (target day), then every assembled vessel is classified and the
//! per-layer GeoJSON files are written. No locking is needed; ingestion
//! only appends while this path only reads files present at start.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;

use lagebild_core::classify::{Classification, ClassificationEngine, Layer};
use lagebild_core::export::{layer_collections, write_all};
use lagebild_core::geofence::{GeofenceIndex, RegionRole};
use lagebild_core::tracks::{resolve_day_window, TrackBuilder, VesselDayRecord};
use lagebild_core::watchlist::WatchlistMatcher;
use lagebild_core::window::SightingWindow;

use crate::store::scan_logs;

#[derive(Debug, Clone)]
pub struct DailyRunConfig {
    /// Glob over the persisted log files, e.g. `logs/bbox_*.jsonl`.
    pub input_glob: String,
    pub date: NaiveDate,
    /// Zone for the day boundaries: `UTC`, `local` or a fixed offset.
    pub tz: String,
    pub lookback_days: u32,
    pub watchlist: PathBuf,
    pub presanction: Option<PathBuf>,
    pub outdir: PathBuf,
    pub min_track_points: usize,
    /// MID prefix for the flag-proxy heuristic.
    pub flag_prefix: String,
}

#[derive(Debug, Clone, Default)]
pub struct DailySummary {
    /// Vessels with a qualifying track on the target day.
    pub vessels: usize,
    /// Classified vessels per layer.
    pub counts: BTreeMap<Layer, usize>,
    pub lines_parsed: u64,
    pub lines_skipped: u64,
    pub written: Vec<PathBuf>,
}

/// Run one batch pass. Replaying the same inputs with the same parameters
/// yields byte-identical output files.
pub fn run(config: &DailyRunConfig) -> Result<DailySummary> {
    let window = resolve_day_window(config.date, &config.tz);
    if window.degraded {
        log::warn!(
            "timezone {:?} not resolvable; using UTC day bounds",
            config.tz
        );
    }
    let lookback_start = window.start - chrono::Duration::days(i64::from(config.lookback_days));
    log::info!(
        "day window [{}, {}) zone={} lookback from {}",
        window.start,
        window.end,
        window.zone_label,
        lookback_start
    );

    let fences = GeofenceIndex::with_builtin();
    let watchlist = WatchlistMatcher::load(&config.watchlist)?;
    log::info!(
        "watchlist: {} entries from {}",
        watchlist.len(),
        config.watchlist.display()
    );
    let presanction = match &config.presanction {
        Some(path) => {
            let list = WatchlistMatcher::load(path)?;
            log::info!("pre-sanction list: {} entries from {}", list.len(), path.display());
            Some(list)
        }
        None => None,
    };

    let mut origin_window = SightingWindow::new();
    let mut tracks = TrackBuilder::new(window.clone(), config.min_track_points);
    let window_end = window.end;
    let stats = scan_logs(&config.input_glob, |sighting| {
        if lookback_start <= sighting.ts_utc && sighting.ts_utc < window_end {
            if let Some(region) = fences.find(sighting.lat, sighting.lon, RegionRole::Origin) {
                origin_window.update(&sighting.mmsi, sighting.ts_utc, region);
            }
        }
        tracks.observe(&sighting, &fences);
    })?;
    log::info!(
        "scanned {} files: {} sightings, {} lines skipped",
        stats.files,
        stats.parsed,
        stats.skipped
    );

    let records = tracks.build();
    let engine = ClassificationEngine::new(
        &watchlist,
        presanction.as_ref(),
        &origin_window,
        lookback_start,
        &config.flag_prefix,
    );

    let classified: Vec<(&VesselDayRecord, Classification)> = records
        .iter()
        .filter_map(|record| engine.classify(record).map(|c| (record, c)))
        .collect();

    let mut counts: BTreeMap<Layer, usize> = BTreeMap::new();
    for (_, classification) in &classified {
        *counts.entry(classification.layer).or_insert(0) += 1;
    }

    let collections = layer_collections(&classified);
    let date_tag = config.date.format("%Y-%m-%d").to_string();
    let written = write_all(&config.outdir, &date_tag, &collections)?;

    for layer in Layer::ALL {
        log::info!(
            "layer {}: {} vessels",
            layer,
            counts.get(&layer).copied().unwrap_or(0)
        );
    }
    log::info!(
        "wrote {} layer files to {}",
        written.len(),
        config.outdir.display()
    );

    Ok(DailySummary {
        vessels: records.len(),
        counts,
        lines_parsed: stats.parsed,
        lines_skipped: stats.skipped,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    const WATCHLIST: &str = "category,name,imo,mmsi,sanctioned,sanctions,note\n\
        shadow_fleet,OCEAN FAITH,1234567,,1,OFAC,\n";

    fn jsonl_line(ts: &str, mmsi: &str, lat: f64, lon: f64, extra: &str) -> String {
        format!(
            r#"{{"ts_utc":"{}","mmsi":"{}","lat":{},"lon":{}{}}}"#,
            ts, mmsi, lat, lon, extra
        )
    }

    fn write_fixture(dir: &Path) -> DailyRunConfig {
        let logs = dir.join("logs");
        fs::create_dir_all(&logs).unwrap();

        // Scenario A: MID 273, three monitoring-area sightings on the day,
        // no origin presence in the lookback.
        let mut day_lines = vec![
            jsonl_line("2025-06-01T08:00:00Z", "273123456", 55.0, 3.0, ""),
            jsonl_line("2025-06-01T10:00:00Z", "273123456", 55.1, 3.2, ""),
            jsonl_line("2025-06-01T12:00:00Z", "273123456", 55.2, 3.4, ""),
        ];
        // Scenario B: watchlist IMO hit, same movement pattern.
        day_lines.extend([
            jsonl_line("2025-06-01T08:00:00Z", "123456789", 55.0, 3.0, r#","imo":"1234567""#),
            jsonl_line("2025-06-01T10:00:00Z", "123456789", 55.1, 3.2, r#","imo":"1234567""#),
            jsonl_line("2025-06-01T12:00:00Z", "123456789", 55.2, 3.4, r#","imo":"1234567""#),
        ]);
        // Origin-seen vessel: Primorsk in the lookback, then on the day in
        // the monitoring area.
        day_lines.extend([
            jsonl_line("2025-06-01T09:00:00Z", "211111111", 54.0, 10.0, ""),
            jsonl_line("2025-06-01T11:00:00Z", "211111111", 54.1, 10.2, ""),
        ]);
        // Single-sighting vessel: must not yield a track.
        day_lines.push(jsonl_line("2025-06-01T09:30:00Z", "355000000", 55.5, 4.0, ""));
        // Garbage line: skipped, not fatal.
        day_lines.push("garbage".to_string());
        fs::write(
            logs.join("bbox_2025-06-01.jsonl"),
            day_lines.join("\n") + "\n",
        )
        .unwrap();

        fs::write(
            logs.join("bbox_2025-05-25.jsonl"),
            jsonl_line("2025-05-25T06:00:00Z", "211111111", 60.3, 28.5, "") + "\n",
        )
        .unwrap();

        let watchlist = dir.join("watchlist.csv");
        fs::write(&watchlist, WATCHLIST).unwrap();

        DailyRunConfig {
            input_glob: logs.join("bbox_*.jsonl").to_string_lossy().into_owned(),
            date: "2025-06-01".parse().unwrap(),
            tz: "UTC".to_string(),
            lookback_days: 14,
            watchlist,
            presanction: None,
            outdir: dir.join("exports"),
            min_track_points: 2,
            flag_prefix: "273".to_string(),
        }
    }

    fn read_features(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_daily_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path());
        let summary = run(&config).unwrap();

        assert_eq!(summary.vessels, 3);
        assert_eq!(summary.counts.get(&Layer::ShadowFleet), Some(&1));
        assert_eq!(summary.counts.get(&Layer::RussiaRoutes), Some(&1));
        assert_eq!(summary.counts.get(&Layer::RuFlagHeuristic), Some(&1));
        assert_eq!(summary.lines_skipped, 1);

        // Scenario A: MID prefix layer, 3 ordered coordinates.
        let mid = read_features(&config.outdir.join("lagebild_2025-06-01_ru_flag_heuristic.geojson"));
        let features = mid["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["mmsi"], "273123456");
        assert_eq!(
            features[0]["geometry"]["coordinates"].as_array().unwrap().len(),
            3
        );
    }

    #[test]
    fn test_scenario_b_shadow_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path());
        run(&config).unwrap();

        let shadow = read_features(&config.outdir.join("lagebild_2025-06-01_shadow_fleet.geojson"));
        let features = shadow["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["mmsi"], "123456789");
        assert_eq!(features[0]["properties"]["watchlist_match_via"], "imo");
        assert_eq!(features[0]["properties"]["watchlist_sanctions"], "OFAC");

        // and it appears nowhere else
        let mid = read_features(&config.outdir.join("lagebild_2025-06-01_ru_flag_heuristic.geojson"));
        for f in mid["features"].as_array().unwrap() {
            assert_ne!(f["properties"]["mmsi"], "123456789");
        }
    }

    #[test]
    fn test_origin_lookback_feeds_routes_layer() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path());
        run(&config).unwrap();

        let routes = read_features(&config.outdir.join("lagebild_2025-06-01_russia_routes.geojson"));
        let features = routes["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        let props = &features[0]["properties"];
        assert_eq!(props["mmsi"], "211111111");
        assert_eq!(props["from_russia_lookback"], true);
        assert_eq!(props["origin_region"], "Primorsk");
        assert_eq!(props["to_russia_destination_match"], false);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixture(dir.path());
        run(&config).unwrap();
        let first = fs::read_to_string(config.outdir.join("lagebild_2025-06-01_shadow_fleet.geojson")).unwrap();
        run(&config).unwrap();
        let second = fs::read_to_string(config.outdir.join("lagebild_2025-06-01_shadow_fleet.geojson")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_inputs_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_fixture(dir.path());
        config.input_glob = dir
            .path()
            .join("nowhere_*.jsonl")
            .to_string_lossy()
            .into_owned();
        assert!(run(&config).is_err());
    }

    #[test]
    fn test_unresolvable_timezone_degrades_to_utc() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_fixture(dir.path());
        config.tz = "Europe/Nowhere".to_string();
        // degrades with a warning instead of failing
        let summary = run(&config).unwrap();
        assert_eq!(summary.vessels, 3);
    }
}
