use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};

use lagebild_core::sighting::{clean_imo, digits_only, is_mmsi, non_empty, valid_position, PositionSighting};

use crate::protocol::{
    value_text, BoundingBox, FeedMessage, PositionReport, SubscriptionRequest, DEFAULT_STREAM_URL,
};
use crate::store::DailyLogWriter;
use crate::transport::{StreamTransport, WsTransport};

use super::fsm::{ConnectionFsm, FsmAction, FsmInput};

/// Marker in server error text that signals a rate-limit condition.
const THROTTLE_MARKER: &str = "concurrent connections";

/// Collector settings. Durations are wall-clock.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub url: String,
    pub api_key: String,
    /// Boxes as `(min_lon, min_lat, max_lon, max_lat)`.
    pub boxes: Vec<BoundingBox>,
    /// Optional server-side MMSI filter (useful up to ~50 entries).
    pub mmsi_filter: Vec<String>,
    /// Per-vessel minimum interval between persisted sightings.
    pub min_interval: Duration,
    /// Fixed wait after a server-reported rate limit.
    pub throttle_wait: Duration,
    pub backoff_floor: Duration,
    pub backoff_ceiling: Duration,
    /// Liveness log interval; zero disables the heartbeat.
    pub heartbeat: Duration,
    pub open_timeout: Duration,
    pub outdir: PathBuf,
    pub prefix: String,
    pub flush_every: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            url: DEFAULT_STREAM_URL.to_string(),
            api_key: String::new(),
            boxes: Vec::new(),
            mmsi_filter: Vec::new(),
            min_interval: Duration::from_secs(1800),
            throttle_wait: Duration::from_secs(120),
            backoff_floor: Duration::from_secs(2),
            backoff_ceiling: Duration::from_secs(60),
            heartbeat: Duration::from_secs(300),
            open_timeout: Duration::from_secs(60),
            outdir: PathBuf::from("logs"),
            prefix: "bbox".to_string(),
            flush_every: 200,
        }
    }
}

/// Cached static-data fields for one vessel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VesselStatic {
    pub name: Option<String>,
    pub imo: Option<String>,
    pub callsign: Option<String>,
    pub shiptype: Option<String>,
    pub destination: Option<String>,
    pub eta: Option<String>,
    pub draught: Option<String>,
}

/// MMSI-to-identity cache, private to one ingestor instance and kept for
/// its process lifetime.
#[derive(Debug, Default)]
pub struct IdentityCache {
    map: HashMap<String, VesselStatic>,
}

impl IdentityCache {
    pub fn update(&mut self, mmsi: &str, data: VesselStatic) {
        self.map.insert(mmsi.to_string(), data);
    }

    pub fn get(&self, mmsi: &str) -> Option<&VesselStatic> {
        self.map.get(mmsi)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Per-vessel minimum-interval gate, measured by wall-clock arrival time.
#[derive(Debug)]
pub struct ThrottleGate {
    min_interval: chrono::Duration,
    last: HashMap<String, DateTime<Utc>>,
}

impl ThrottleGate {
    pub fn new(min_interval: Duration) -> Self {
        ThrottleGate {
            min_interval: chrono::Duration::from_std(min_interval)
                .unwrap_or_else(|_| chrono::Duration::seconds(1800)),
            last: HashMap::new(),
        }
    }

    /// Admit and record, or reject. Spacing exactly at the interval is
    /// admitted.
    pub fn admit(&mut self, mmsi: &str, now: DateTime<Utc>) -> bool {
        if let Some(prev) = self.last.get(mmsi) {
            if now - *prev < self.min_interval {
                return false;
            }
        }
        self.last.insert(mmsi.to_string(), now);
        true
    }
}

/// Shared counters, readable by the heartbeat task.
#[derive(Debug, Default)]
pub struct IngestStats {
    written: AtomicU64,
    malformed: AtomicU64,
    throttled: AtomicU64,
    reconnects: AtomicU64,
}

impl IngestStats {
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
    pub fn throttled(&self) -> u64 {
        self.throttled.load(Ordering::Relaxed)
    }
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

/// Result of handling one raw frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Accepted position report, enriched and ready to persist.
    Persist(PositionSighting),
    /// Static-data message; cache updated, nothing persisted.
    CacheUpdated,
    /// Suppressed by the per-vessel throttle.
    Throttled,
    /// Undecodable, unknown kind, or failed validation.
    Skipped,
    /// Server-reported error; ends the current stream.
    ServerError { throttled: bool },
}

/// The live subscription driver.
pub struct StreamIngestor<T: StreamTransport> {
    config: IngestConfig,
    transport: T,
    fsm: ConnectionFsm,
    throttle: ThrottleGate,
    identity: IdentityCache,
    stats: Arc<IngestStats>,
}

impl<T: StreamTransport> StreamIngestor<T> {
    pub fn new(config: IngestConfig, transport: T) -> Self {
        let fsm = ConnectionFsm::new(
            config.backoff_floor,
            config.backoff_ceiling,
            config.throttle_wait,
        );
        let throttle = ThrottleGate::new(config.min_interval);
        StreamIngestor {
            config,
            transport,
            fsm,
            throttle,
            identity: IdentityCache::default(),
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    fn build_sighting(
        &self,
        report: &PositionReport,
        mmsi: String,
        lat: f64,
        lon: f64,
        now: DateTime<Utc>,
    ) -> PositionSighting {
        let cached = self.identity.get(&mmsi).cloned().unwrap_or_default();
        PositionSighting {
            ts_utc: now,
            mmsi,
            imo: cached.imo,
            name: cached.name,
            callsign: cached.callsign,
            shiptype: cached.shiptype,
            destination: cached.destination,
            eta: cached.eta,
            draught: cached.draught,
            lat,
            lon,
            sog: report.sog,
            cog: report.cog,
            nav_status: report.nav_status,
        }
    }

    /// Decode and dispatch one frame. Pure in everything but the throttle
    /// map and the identity cache, so it is directly unit-testable.
    pub fn process_frame(&mut self, raw: &str, now: DateTime<Utc>) -> FrameOutcome {
        let msg: FeedMessage = match serde_json::from_str(raw) {
            Ok(m) => m,
            Err(_) => return FrameOutcome::Skipped,
        };

        if let Some(error) = msg.error {
            log::warn!("server error: {}", error);
            return FrameOutcome::ServerError {
                throttled: error.to_lowercase().contains(THROTTLE_MARKER),
            };
        }

        match msg.message_type.as_deref() {
            Some("ShipStaticData") => {
                let Some(sd) = msg.message.and_then(|m| m.ship_static_data) else {
                    return FrameOutcome::Skipped;
                };
                let mmsi = digits_only(&value_text(&sd.user_id).unwrap_or_default());
                if !is_mmsi(&mmsi) {
                    return FrameOutcome::Skipped;
                }
                self.identity.update(
                    &mmsi,
                    VesselStatic {
                        name: non_empty(sd.name.as_deref()),
                        imo: clean_imo(value_text(&sd.imo).as_deref()),
                        callsign: non_empty(sd.callsign.as_deref()),
                        shiptype: value_text(&sd.shiptype),
                        destination: non_empty(sd.destination.as_deref()),
                        eta: value_text(&sd.eta),
                        draught: value_text(&sd.draught),
                    },
                );
                FrameOutcome::CacheUpdated
            }
            Some("PositionReport") => {
                let Some(pr) = msg.message.and_then(|m| m.position_report) else {
                    return FrameOutcome::Skipped;
                };
                let mmsi = digits_only(&value_text(&pr.user_id).unwrap_or_default());
                if !is_mmsi(&mmsi) {
                    return FrameOutcome::Skipped;
                }
                let (Some(lat), Some(lon)) = (pr.latitude, pr.longitude) else {
                    return FrameOutcome::Skipped;
                };
                if !valid_position(lat, lon) {
                    return FrameOutcome::Skipped;
                }
                if !self.throttle.admit(&mmsi, now) {
                    return FrameOutcome::Throttled;
                }
                FrameOutcome::Persist(self.build_sighting(&pr, mmsi, lat, lon, now))
            }
            _ => FrameOutcome::Skipped,
        }
    }

    /// Read frames until the stream ends, errors, or shutdown is requested.
    async fn read_stream(
        &mut self,
        subsys: &SubsystemHandle,
        writer: &mut DailyLogWriter,
    ) -> Result<FsmInput> {
        loop {
            let frame = tokio::select! {
                _ = subsys.on_shutdown_requested() => return Ok(FsmInput::Stop),
                frame = self.transport.next_text() => frame,
            };
            match frame {
                Ok(Some(raw)) => {
                    let now = Utc::now();
                    let now = now.with_nanosecond(0).unwrap_or(now);
                    match self.process_frame(&raw, now) {
                        FrameOutcome::Persist(sighting) => {
                            writer.append(&sighting)?;
                            let written = self.stats.written.fetch_add(1, Ordering::Relaxed) + 1;
                            log::debug!("persisted {} ({} total)", sighting.mmsi, written);
                        }
                        FrameOutcome::CacheUpdated | FrameOutcome::Throttled => {}
                        FrameOutcome::Skipped => {
                            self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                        }
                        FrameOutcome::ServerError { throttled } => {
                            if throttled {
                                self.stats.throttled.fetch_add(1, Ordering::Relaxed);
                                return Ok(FsmInput::Throttled);
                            }
                            return Ok(FsmInput::StreamError);
                        }
                    }
                }
                Ok(None) => {
                    log::info!("stream closed by server");
                    return Ok(FsmInput::StreamEnded);
                }
                Err(e) => {
                    log::warn!("receive error: {}", e);
                    return Ok(FsmInput::StreamError);
                }
            }
        }
    }

    /// Run the subscription until shutdown. Flushes and closes the log
    /// before returning.
    pub async fn run(mut self, subsys: SubsystemHandle) -> Result<()> {
        let mut writer =
            DailyLogWriter::new(&self.config.outdir, &self.config.prefix, self.config.flush_every)?;
        let result = self.drive(&subsys, &mut writer).await;
        writer.close()?;
        log::info!(
            "collector stopped; written={} malformed={} reconnects={}",
            self.stats.written(),
            self.stats.malformed(),
            self.stats.reconnects()
        );
        result
    }

    async fn drive(
        &mut self,
        subsys: &SubsystemHandle,
        writer: &mut DailyLogWriter,
    ) -> Result<()> {
        let mut action = self.fsm.next(FsmInput::Start);
        loop {
            let input = match action {
                FsmAction::Halt => break,
                FsmAction::Connect => {
                    log::info!("connecting to {}", self.config.url);
                    tokio::select! {
                        _ = subsys.on_shutdown_requested() => FsmInput::Stop,
                        result = self.transport.connect() => match result {
                            Ok(()) => FsmInput::Connected,
                            Err(e) => {
                                log::warn!("connect failed: {}", e);
                                self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                                FsmInput::ConnectFailed
                            }
                        },
                    }
                }
                FsmAction::Subscribe => {
                    let request = SubscriptionRequest::new(
                        &self.config.api_key,
                        &self.config.boxes,
                        &self.config.mmsi_filter,
                    );
                    let text = serde_json::to_string(&request)?;
                    match self.transport.send_text(text).await {
                        Ok(()) => {
                            log::info!(
                                "subscribed; {} boxes, throttle {}s per vessel",
                                self.config.boxes.len(),
                                self.config.min_interval.as_secs()
                            );
                            FsmInput::SubscribeOk
                        }
                        Err(e) => {
                            log::warn!("subscribe failed: {}", e);
                            FsmInput::SubscribeFailed
                        }
                    }
                }
                FsmAction::Read => self.read_stream(subsys, writer).await?,
                FsmAction::Wait(wait) => {
                    log::debug!("waiting {:?} before reconnect", wait);
                    tokio::select! {
                        _ = subsys.on_shutdown_requested() => FsmInput::Stop,
                        _ = tokio::time::sleep(wait) => FsmInput::Start,
                    }
                }
            };
            action = self.fsm.next(input);
        }
        self.transport.close().await;
        Ok(())
    }
}

/// Low-frequency liveness logging, scheduled next to the read loop.
pub async fn heartbeat(
    subsys: SubsystemHandle,
    every: Duration,
    stats: Arc<IngestStats>,
) -> Result<()> {
    if every.is_zero() {
        return Ok(());
    }
    loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => return Ok(()),
            _ = tokio::time::sleep(every) => {
                log::info!(
                    "alive; written={} malformed={} reconnects={}",
                    stats.written(),
                    stats.malformed(),
                    stats.reconnects()
                );
            }
        }
    }
}

/// Build the subsystem tree for a collect run and block until shutdown.
pub async fn run_collector(config: IngestConfig) -> Result<()> {
    let transport = WsTransport::new(&config.url, config.open_timeout);
    let heartbeat_every = config.heartbeat;
    let ingestor = StreamIngestor::new(config, transport);
    let stats = ingestor.stats();

    Toplevel::new(move |s| async move {
        s.start(SubsystemBuilder::new("heartbeat", move |h| {
            heartbeat(h, heartbeat_every, stats)
        }));
        s.start(SubsystemBuilder::new("collector", move |h| ingestor.run(h)));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(10))
    .await
    .map_err(|e| anyhow::anyhow!(e))
}
