use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tracks::VesselDayRecord;
use crate::watchlist::{MatchVia, WatchlistEntry, WatchlistMatcher};
use crate::window::{OriginSighting, SightingWindow};

/// Destination free-text patterns treated as "bound for Russia".
///
/// Deliberately loose: destination fields are hand-typed on board and full
/// of spelling variants, so this is a weak signal and ranked below the
/// position-derived origin signal in the evidence output.
static RU_DEST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(RU|RUSSIA|RUS|PRIMORSK|UST[- ]?LUGA|ST\s*PETERSBURG|PETERSBURG|KALININGRAD|BALTIYSK|MURMANSK|ARKHANGELSK|SABETTA|DUDINKA)\b",
    )
    .expect("destination pattern compiles")
});

/// Whether a destination text matches the Russia pattern.
pub fn destination_matches_russia(destination: &str) -> bool {
    RU_DEST_RE.is_match(destination)
}

/// Output layers, mutually exclusive per vessel per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    ShadowFleet,
    PreSanctioned,
    RussiaRoutes,
    RuFlagHeuristic,
}

impl Layer {
    pub const ALL: [Layer; 4] = [
        Layer::ShadowFleet,
        Layer::PreSanctioned,
        Layer::RussiaRoutes,
        Layer::RuFlagHeuristic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::ShadowFleet => "shadow_fleet",
            Layer::PreSanctioned => "pre_sanctioned",
            Layer::RussiaRoutes => "russia_routes",
            Layer::RuFlagHeuristic => "ru_flag_heuristic",
        }
    }
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The signals that produced a classification, for audit output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Route of the watchlist hit, when the layer is `shadow_fleet`.
    pub watchlist_match_via: Option<MatchVia>,
    /// The matched watchlist row.
    pub watchlist_row: Option<WatchlistEntry>,
    /// Route of the pre-sanction hit, when the layer is `pre_sanctioned`.
    pub pre_sanction_match_via: Option<MatchVia>,
    pub pre_sanction_row: Option<WatchlistEntry>,
    /// Destination text matched the Russia pattern.
    pub destination_match: bool,
    /// Most recent origin-region sighting inside the lookback horizon.
    pub origin_sighting: Option<OriginSighting>,
    /// The flag-proxy prefix that fired, when the layer is
    /// `ru_flag_heuristic`.
    pub mid_prefix: Option<String>,
}

/// One classified vessel: exactly one layer plus its evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub layer: Layer,
    pub evidence: Evidence,
}

/// Applies the precedence rules to assembled day records.
///
/// Built once per batch run from read-only inputs; evaluation is pure per
/// vessel, so callers may partition records by vessel id if they ever
/// parallelize.
pub struct ClassificationEngine<'a> {
    watchlist: &'a WatchlistMatcher,
    pre_sanction: Option<&'a WatchlistMatcher>,
    window: &'a SightingWindow,
    lookback_start: DateTime<Utc>,
    flag_prefix: String,
}

impl<'a> ClassificationEngine<'a> {
    pub fn new(
        watchlist: &'a WatchlistMatcher,
        pre_sanction: Option<&'a WatchlistMatcher>,
        window: &'a SightingWindow,
        lookback_start: DateTime<Utc>,
        flag_prefix: &str,
    ) -> Self {
        ClassificationEngine {
            watchlist,
            pre_sanction,
            window,
            lookback_start,
            flag_prefix: flag_prefix.to_string(),
        }
    }

    fn origin_in_lookback(&self, mmsi: &str) -> Option<OriginSighting> {
        self.window
            .last_origin_sighting(mmsi)
            .filter(|s| s.ts >= self.lookback_start)
            .cloned()
    }

    /// Evaluate the precedence chain for one vessel. Returns `None` when no
    /// predicate holds; the vessel then stays off the picture entirely.
    pub fn classify(&self, record: &VesselDayRecord) -> Option<Classification> {
        let imo = record.imo.as_deref();
        let name = record.name.as_deref();

        if let Some((via, row)) = self.watchlist.matches(&record.mmsi, imo, name) {
            return Some(Classification {
                layer: Layer::ShadowFleet,
                evidence: Evidence {
                    watchlist_match_via: Some(via),
                    watchlist_row: Some(row.clone()),
                    ..Evidence::default()
                },
            });
        }

        // A shadow-fleet hit above suppresses the pre-sanction tag; the
        // remaining order keeps one layer per vessel.
        if let Some(pre) = self.pre_sanction {
            if let Some((via, row)) = pre.matches(&record.mmsi, imo, name) {
                return Some(Classification {
                    layer: Layer::PreSanctioned,
                    evidence: Evidence {
                        pre_sanction_match_via: Some(via),
                        pre_sanction_row: Some(row.clone()),
                        ..Evidence::default()
                    },
                });
            }
        }

        let destination_match = record
            .destination
            .as_deref()
            .map(destination_matches_russia)
            .unwrap_or(false);
        let origin_sighting = self.origin_in_lookback(&record.mmsi);
        if destination_match || origin_sighting.is_some() {
            return Some(Classification {
                layer: Layer::RussiaRoutes,
                evidence: Evidence {
                    destination_match,
                    origin_sighting,
                    ..Evidence::default()
                },
            });
        }

        if !self.flag_prefix.is_empty() && record.mmsi.starts_with(&self.flag_prefix) {
            return Some(Classification {
                layer: Layer::RuFlagHeuristic,
                evidence: Evidence {
                    mid_prefix: Some(self.flag_prefix.clone()),
                    ..Evidence::default()
                },
            });
        }

        None
    }
}
