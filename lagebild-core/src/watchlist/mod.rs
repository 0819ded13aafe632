//! Watchlist Snapshot Matching
//!
//! Loads a vessel watchlist from a CSV snapshot and answers membership
//! queries by MMSI, IMO or normalized name. Snapshots come from external
//! acquisition tooling and arrive in whatever dialect the source used, so
//! the loader auto-detects encoding (UTF-8/UTF-16, with or without BOM)
//! and delimiter (`,` vs `;`) and maps header variants through a fixed
//! synonym table. Unmappable headers are ignored, not fatal.
//!
//! Identifier matches (MMSI, IMO) are authoritative. Name matching is a
//! lower-confidence fallback consulted only when no identifier matched,
//! because vessel names are not unique.

mod csv;
mod matcher;

pub use matcher::{normalize_name, MatchVia, WatchlistEntry, WatchlistMatcher};
