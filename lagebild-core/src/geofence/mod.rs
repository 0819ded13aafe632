//! Geofence Regions
//!
//! Named rectangular regions with point-in-region queries. Regions come in
//! two roles: broad *monitoring areas* that define what is in scope for the
//! daily picture, and narrow *origin regions* (ports, gateways) whose
//! presence-sighting is used as a route-relationship signal.
//!
//! Queries iterate in registration order and return the first match, so
//! callers keep same-role regions disjoint where determinism matters.
//!
//! # Example
//!
//! ```rust,ignore
//! use lagebild_core::geofence::{GeofenceIndex, RegionRole};
//!
//! let mut index = GeofenceIndex::new();
//! index.register("Primorsk", RegionRole::Origin, (28.20, 60.20, 28.90, 60.50));
//! assert!(index.contains_any(60.3, 28.5, RegionRole::Origin));
//! ```

mod regions;

pub use regions::*;
