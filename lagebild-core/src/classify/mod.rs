//! Vessel Classification
//!
//! Assigns each vessel with a qualifying track to exactly one output layer,
//! using a fixed precedence over signals of decreasing reliability:
//!
//! 1. curated watchlist match (`shadow_fleet`)
//! 2. independent pre-sanction list match (`pre_sanctioned`)
//! 3. route heuristic: destination text or origin-region presence
//!    (`russia_routes`)
//! 4. MMSI registration-prefix heuristic (`ru_flag_heuristic`)
//!
//! The first predicate that holds decides the layer; conflicting signals
//! are therefore never an error. Every result carries the evidence that
//! produced it.

mod engine;

pub use engine::{
    destination_matches_russia, Classification, ClassificationEngine, Evidence, Layer,
};
