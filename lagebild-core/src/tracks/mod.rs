//! Per-Vessel Track Assembly
//!
//! Collects the sightings of one reporting window (a UTC day, or a local
//! day converted to a half-open UTC interval) that fall inside the
//! monitoring areas, and assembles them into ordered per-vessel records.
//! A vessel yields a record only when it has at least the configured
//! minimum of qualifying points; a single stray report is not a track.
//!
//! # Example
//!
//! ```rust,ignore
//! use lagebild_core::tracks::{resolve_day_window, TrackBuilder};
//!
//! let window = resolve_day_window("2025-06-01".parse().unwrap(), "UTC");
//! let mut builder = TrackBuilder::new(window, 2);
//! builder.observe(&sighting, &fences);
//! let records = builder.build();
//! ```

mod builder;

pub use builder::{resolve_day_window, ReportingWindow, TrackBuilder, VesselDayRecord};
