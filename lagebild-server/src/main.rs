use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use lagebild_core::geofence::{MONITORING_BOXES, ORIGIN_BOXES};
use lagebild_core::watchlist::WatchlistMatcher;
use lagebild_server::daily::{self, DailyRunConfig};
use lagebild_server::ingest::{run_collector, IngestConfig};
use lagebild_server::protocol::BoundingBox;

#[derive(Parser, Debug)]
#[command(
    name = "lagebild-server",
    version,
    about = "AIS live-feed collector and daily Lagebild classification exporter"
)]
struct Cli {
    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect the live feed into date-partitioned JSONL logs
    Collect(CollectArgs),
    /// Build the classified daily GeoJSON layers from the logs
    Daily(DailyArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Preset {
    Northsea,
    Southbaltic,
    NorthseaSouthbaltic,
    NorthseaSouthbalticRussiaPorts,
}

#[derive(Args, Debug)]
struct CollectArgs {
    /// API key; falls back to the AISSTREAM_API_KEY environment variable
    #[arg(long)]
    apikey: Option<String>,

    /// Directory for the JSONL log partitions
    #[arg(long, default_value = "logs")]
    outdir: PathBuf,

    /// Log file prefix
    #[arg(long, default_value = "bbox")]
    prefix: String,

    /// Bounding-box preset
    #[arg(long, value_enum, default_value = "northsea-southbaltic-russia-ports")]
    preset: Preset,

    /// Explicit box as MIN_LON MIN_LAT MAX_LON MAX_LAT; repeatable,
    /// overrides the preset
    #[arg(long, num_args = 4, value_names = ["MIN_LON", "MIN_LAT", "MAX_LON", "MAX_LAT"], action = clap::ArgAction::Append)]
    bbox: Vec<f64>,

    /// Minimum seconds between persisted sightings per vessel
    #[arg(long, default_value_t = 1800)]
    min_seconds_per_ship: u64,

    /// Fixed wait after a server-side rate limit, seconds
    #[arg(long, default_value_t = 120)]
    throttle_wait: u64,

    /// Websocket opening-handshake timeout, seconds
    #[arg(long, default_value_t = 60)]
    open_timeout: u64,

    /// Liveness log interval, minutes; 0 disables
    #[arg(long, default_value_t = 5)]
    alive_minutes: u64,

    /// Flush the log every N persisted sightings
    #[arg(long, default_value_t = 200)]
    flush_every: usize,

    /// Optional watchlist CSV; enables server-side MMSI filtering
    #[arg(long)]
    watchlist: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DailyArgs {
    /// Input glob over the log files, e.g. "logs/bbox_*.jsonl"
    #[arg(long = "in", value_name = "GLOB")]
    input: String,

    /// Target day, YYYY-MM-DD
    #[arg(long)]
    date: NaiveDate,

    /// Zone for the day boundaries: UTC, local, or a fixed offset like +02:00
    #[arg(long, default_value = "UTC")]
    tz: String,

    /// Lookback horizon for the origin-region heuristic, days
    #[arg(long, default_value_t = 14)]
    lookback_days: u32,

    /// Watchlist CSV snapshot
    #[arg(long, default_value = "watchlist_shadowfleet.csv")]
    watchlist: PathBuf,

    /// Optional second list of pre-sanctioned vessels
    #[arg(long)]
    presanction: Option<PathBuf>,

    /// Output directory for the GeoJSON layers
    #[arg(long, default_value = "exports")]
    outdir: PathBuf,

    /// Minimum qualifying sightings for a track
    #[arg(long, default_value_t = 2)]
    min_track_points: usize,

    /// MID prefix for the flag-proxy heuristic
    #[arg(long, default_value = "273")]
    flag_prefix: String,
}

fn preset_boxes(preset: Preset) -> Vec<BoundingBox> {
    let monitoring = |i: usize| MONITORING_BOXES[i].1;
    match preset {
        Preset::Northsea => vec![monitoring(0)],
        Preset::Southbaltic => vec![monitoring(1)],
        Preset::NorthseaSouthbaltic => vec![monitoring(0), monitoring(1)],
        Preset::NorthseaSouthbalticRussiaPorts => {
            let mut boxes = vec![monitoring(0), monitoring(1)];
            boxes.extend(ORIGIN_BOXES.iter().map(|(_, bbox)| *bbox));
            boxes
        }
    }
}

async fn collect(args: CollectArgs) -> Result<()> {
    let api_key = args
        .apikey
        .or_else(|| std::env::var("AISSTREAM_API_KEY").ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .context("missing API key: pass --apikey or set AISSTREAM_API_KEY")?;

    let mmsi_filter = match &args.watchlist {
        Some(path) => {
            let watchlist = WatchlistMatcher::load(path)?;
            let filter = watchlist.mmsi_filter();
            if filter.len() > 50 {
                log::warn!(
                    "watchlist has {} MMSI entries; the upstream filter is intended for <= 50",
                    filter.len()
                );
            }
            log::info!("server-side MMSI filter enabled ({} entries)", filter.len());
            filter
        }
        None => Vec::new(),
    };

    let boxes = if args.bbox.is_empty() {
        preset_boxes(args.preset)
    } else {
        args.bbox
            .chunks(4)
            .filter(|c| c.len() == 4)
            .map(|c| (c[0], c[1], c[2], c[3]))
            .collect()
    };

    let config = IngestConfig {
        api_key,
        boxes,
        mmsi_filter,
        min_interval: Duration::from_secs(args.min_seconds_per_ship.max(10)),
        throttle_wait: Duration::from_secs(args.throttle_wait.max(10)),
        heartbeat: Duration::from_secs(args.alive_minutes * 60),
        open_timeout: Duration::from_secs(args.open_timeout.max(5)),
        outdir: args.outdir,
        prefix: args.prefix,
        flush_every: args.flush_every.max(1),
        ..IngestConfig::default()
    };
    log::info!(
        "collecting into {} ({} boxes)",
        config.outdir.display(),
        config.boxes.len()
    );
    run_collector(config).await
}

fn daily(args: DailyArgs) -> Result<()> {
    let config = DailyRunConfig {
        input_glob: args.input,
        date: args.date,
        tz: args.tz,
        lookback_days: args.lookback_days,
        watchlist: args.watchlist,
        presanction: args.presanction,
        outdir: args.outdir,
        min_track_points: args.min_track_points.max(1),
        flag_prefix: args.flag_prefix,
    };
    let summary = daily::run(&config)?;
    log::info!(
        "done: {} vessels with tracks, {} lines skipped",
        summary.vessels,
        summary.lines_skipped
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbosity.log_level_filter())
        .init();

    match cli.command {
        Command::Collect(args) => collect(args).await,
        Command::Daily(args) => daily(args),
    }
}
