//! AIS Lagebild server library.
//!
//! Hosts the live-feed collector (websocket subscription, throttling,
//! identity enrichment, durable JSONL log) and the daily batch pipeline
//! that turns the log into classified GeoJSON layers via `lagebild-core`.

pub mod daily;
pub mod ingest;
pub mod protocol;
pub mod store;
pub mod transport;
