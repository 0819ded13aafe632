//! GeoJSON Layer Export
//!
//! Serializes classified tracks into one FeatureCollection per layer. Each
//! vessel contributes a LineString feature (the track, ascending by time)
//! and a Point feature (last known position) sharing one property schema.
//! Collections are built fully in memory and written to a temporary
//! sibling path that is renamed into place, so readers never observe a
//! partially written file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::classify::{Classification, Layer};
use crate::tracks::VesselDayRecord;
use crate::LagebildError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    LineString { coordinates: Vec<[f64; 2]> },
    Point { coordinates: [f64; 2] },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: Map<String, Value>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        FeatureCollection {
            kind: "FeatureCollection",
            features: Vec::new(),
        }
    }
}

fn timestamp(ts: chrono::DateTime<chrono::Utc>) -> Value {
    Value::String(ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

fn opt_str(v: &Option<String>) -> Value {
    match v {
        Some(s) => Value::String(s.clone()),
        None => Value::String(String::new()),
    }
}

/// Display label with the layer prefixes the map styling keys on.
fn display_label(record: &VesselDayRecord, layer: Layer) -> String {
    match layer {
        Layer::ShadowFleet => format!("🕶️ Schattenflotte – {}", record.label),
        Layer::RussiaRoutes => format!("🇷🇺 Aus Russland – {}", record.label),
        _ => record.label.clone(),
    }
}

/// The property schema shared by the track and last-position features.
fn properties(record: &VesselDayRecord, classification: &Classification) -> Map<String, Value> {
    let layer = classification.layer;
    let evidence = &classification.evidence;

    let mut props = Map::new();
    props.insert("layer".to_string(), json!(layer.as_str()));
    props.insert("label".to_string(), json!(display_label(record, layer)));
    props.insert("mmsi".to_string(), json!(record.mmsi));
    props.insert("imo".to_string(), opt_str(&record.imo));
    props.insert("name".to_string(), opt_str(&record.name));
    props.insert("shiptype".to_string(), opt_str(&record.shiptype));
    props.insert("destination".to_string(), opt_str(&record.destination));
    props.insert("eta".to_string(), opt_str(&record.eta));
    props.insert("first_seen_utc".to_string(), timestamp(record.first_seen));
    props.insert("last_seen_utc".to_string(), timestamp(record.last_seen));

    props.insert(
        "watchlist_match_via".to_string(),
        match &evidence.watchlist_match_via {
            Some(via) => json!(via.as_str()),
            None => json!(""),
        },
    );
    if let Some(row) = &evidence.watchlist_row {
        props.insert("watchlist_category".to_string(), json!(row.category));
        props.insert("watchlist_sanctioned".to_string(), json!(row.sanctioned));
        props.insert("watchlist_sanctions".to_string(), json!(row.sanctions));
        props.insert("watchlist_note".to_string(), json!(row.note));
    }
    props.insert(
        "to_russia_destination_match".to_string(),
        json!(evidence.destination_match),
    );
    props.insert(
        "from_russia_lookback".to_string(),
        json!(evidence.origin_sighting.is_some()),
    );
    if let Some(origin) = &evidence.origin_sighting {
        props.insert("origin_region".to_string(), json!(origin.region));
        props.insert("origin_seen_utc".to_string(), timestamp(origin.ts));
    }
    if let Some(via) = &evidence.pre_sanction_match_via {
        props.insert("pre_sanction_match_via".to_string(), json!(via.as_str()));
    }
    if let Some(row) = &evidence.pre_sanction_row {
        props.insert("pre_sanction_source".to_string(), json!(row.sanctions));
        props.insert("pre_sanction_note".to_string(), json!(row.note));
    }
    if let Some(prefix) = &evidence.mid_prefix {
        props.insert("mid_prefix".to_string(), json!(prefix));
    }
    if let Some(name) = &record.name {
        props.insert(
            "vessel_name_norm".to_string(),
            json!(crate::watchlist::normalize_name(name)),
        );
    }
    props
}

/// Build both features for one classified vessel.
fn vessel_features(record: &VesselDayRecord, classification: &Classification) -> [Feature; 2] {
    let base = properties(record, classification);
    let mut track_props = base.clone();
    track_props.insert("feature".to_string(), json!("track"));
    let mut point_props = base;
    point_props.insert("feature".to_string(), json!("last_position"));

    let last = record.last_point();
    [
        Feature {
            kind: "Feature",
            properties: track_props,
            geometry: Geometry::LineString {
                coordinates: record.coordinates(),
            },
        },
        Feature {
            kind: "Feature",
            properties: point_props,
            geometry: Geometry::Point {
                coordinates: [last.lon, last.lat],
            },
        },
    ]
}

/// Group classified records into one collection per layer.
///
/// Every layer gets a collection, empty ones included, so downstream map
/// configuration can rely on all files existing. Records are emitted in
/// MMSI order for reproducible output.
pub fn layer_collections(
    classified: &[(&VesselDayRecord, Classification)],
) -> BTreeMap<Layer, FeatureCollection> {
    let mut collections: BTreeMap<Layer, FeatureCollection> = Layer::ALL
        .iter()
        .map(|layer| (*layer, FeatureCollection::new()))
        .collect();

    let mut ordered: Vec<&(&VesselDayRecord, Classification)> = classified.iter().collect();
    ordered.sort_by(|a, b| a.0.mmsi.cmp(&b.0.mmsi));

    for (record, classification) in ordered {
        if let Some(collection) = collections.get_mut(&classification.layer) {
            collection
                .features
                .extend(vessel_features(record, classification));
        }
    }
    collections
}

fn write_atomic(path: &Path, collection: &FeatureCollection) -> Result<(), LagebildError> {
    let io_err = |source: std::io::Error| LagebildError::ExportIo {
        path: path.display().to_string(),
        source,
    };
    let json = serde_json::to_string(collection)?;
    let tmp = path.with_extension("geojson.tmp");
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Write dated files plus stable `live_` aliases, atomically, one file per
/// layer. Returns the dated paths.
pub fn write_all(
    outdir: &Path,
    date_tag: &str,
    collections: &BTreeMap<Layer, FeatureCollection>,
) -> Result<Vec<PathBuf>, LagebildError> {
    fs::create_dir_all(outdir).map_err(|source| LagebildError::ExportIo {
        path: outdir.display().to_string(),
        source,
    })?;

    let mut written = Vec::new();
    for (layer, collection) in collections {
        let dated = outdir.join(format!("lagebild_{}_{}.geojson", date_tag, layer.as_str()));
        write_atomic(&dated, collection)?;
        let live = outdir.join(format!("live_{}.geojson", layer.as_str()));
        write_atomic(&live, collection)?;
        written.push(dated);
    }
    Ok(written)
}
