//! Live Feed Ingestion
//!
//! Owns the single logical subscription to the upstream relay: an explicit
//! reconnect state machine, a per-vessel minimum-interval throttle, an
//! MMSI-to-identity cache fed by static-data messages, and a low-frequency
//! heartbeat. Accepted position reports are enriched from the cache and
//! appended to the date-partitioned log.
//!
//! All mutable state (throttle map, identity cache) is owned by one
//! `StreamIngestor` instance, so independent sessions can coexist.

mod collector;
mod fsm;

pub use collector::{
    heartbeat, run_collector, FrameOutcome, IdentityCache, IngestConfig, IngestStats,
    StreamIngestor, ThrottleGate, VesselStatic,
};
pub use fsm::{ConnectionFsm, FsmAction, FsmInput, IngestState};
