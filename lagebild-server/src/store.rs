//! Durable Sighting Log
//!
//! Append-only, date-partitioned JSONL files: one `{prefix}_{YYYY-MM-DD}.jsonl`
//! per UTC day, where the partition date comes from the sighting's own
//! timestamp. A late-arriving event for a prior day is appended to that
//! day's file, never to the current one. The batch path reads the same
//! files back leniently: undecodable lines are counted and skipped,
//! out-of-range coordinates and malformed vessel ids are dropped.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use lagebild_core::sighting::{digits_only, is_mmsi, valid_position, PositionSighting};
use lagebild_core::LagebildError;

/// Appends sightings to per-day files, switching files by event date.
pub struct DailyLogWriter {
    outdir: PathBuf,
    prefix: String,
    flush_every: usize,
    pending: usize,
    current: Option<(NaiveDate, BufWriter<File>)>,
}

impl DailyLogWriter {
    pub fn new(outdir: &Path, prefix: &str, flush_every: usize) -> io::Result<Self> {
        std::fs::create_dir_all(outdir)?;
        Ok(DailyLogWriter {
            outdir: outdir.to_path_buf(),
            prefix: prefix.to_string(),
            flush_every: flush_every.max(1),
            pending: 0,
            current: None,
        })
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.outdir
            .join(format!("{}_{}.jsonl", self.prefix, date.format("%Y-%m-%d")))
    }

    fn open_for(&mut self, date: NaiveDate) -> io::Result<()> {
        if let Some((_, mut writer)) = self.current.take() {
            writer.flush()?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(date))?;
        self.current = Some((date, BufWriter::new(file)));
        Ok(())
    }

    /// Append one sighting to the partition of its own event day.
    pub fn append(&mut self, sighting: &PositionSighting) -> io::Result<()> {
        let date = sighting.ts_utc.date_naive();
        let needs_open = match &self.current {
            Some((current_date, _)) => *current_date != date,
            None => true,
        };
        if needs_open {
            self.open_for(date)?;
        }
        let line = serde_json::to_string(sighting)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let (_, writer) = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no open partition"))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        self.pending += 1;
        if self.pending >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        if let Some((_, writer)) = self.current.as_mut() {
            writer.flush()?;
        }
        self.pending = 0;
        Ok(())
    }

    /// Flush and drop the open handle. Safe to call more than once.
    pub fn close(&mut self) -> io::Result<()> {
        if let Some((_, mut writer)) = self.current.take() {
            writer.flush()?;
        }
        self.pending = 0;
        Ok(())
    }
}

fn value_as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn opt_text(value: Option<&Value>) -> Option<String> {
    value_as_text(value).filter(|s| !s.is_empty())
}

/// Parse one persisted log line. Returns `None` for anything that cannot
/// be keyed and placed: bad JSON, missing/invalid timestamp, malformed
/// MMSI, missing or out-of-range coordinates.
pub fn parse_log_line(line: &str) -> Option<PositionSighting> {
    let value: Value = serde_json::from_str(line).ok()?;

    let ts_raw = value.get("ts_utc")?.as_str()?;
    let ts_utc: DateTime<Utc> = DateTime::parse_from_rfc3339(ts_raw)
        .ok()?
        .with_timezone(&Utc);

    let mmsi = digits_only(&value_as_text(value.get("mmsi"))?);
    if !is_mmsi(&mmsi) {
        return None;
    }

    let lat = value_as_f64(value.get("lat"))?;
    let lon = value_as_f64(value.get("lon"))?;
    if !valid_position(lat, lon) {
        return None;
    }

    let imo = opt_text(value.get("imo"))
        .map(|v| digits_only(&v))
        .filter(|v| lagebild_core::sighting::is_imo(v));

    Some(PositionSighting {
        ts_utc,
        mmsi,
        imo,
        name: opt_text(value.get("name")),
        callsign: opt_text(value.get("callsign")),
        shiptype: opt_text(value.get("shiptype")),
        destination: opt_text(value.get("destination")),
        eta: opt_text(value.get("eta")),
        draught: opt_text(value.get("draught")),
        lat,
        lon,
        sog: value_as_f64(value.get("sog")),
        cog: value_as_f64(value.get("cog")),
        nav_status: value.get("nav_status").and_then(Value::as_i64),
    })
}

/// Totals from one scan over the input files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files: usize,
    pub parsed: u64,
    pub skipped: u64,
}

/// Scan all files matching the glob in path order, calling `visit` for
/// every parseable sighting. An empty match set is a configuration error;
/// an unreadable file or line is not.
pub fn scan_logs<F: FnMut(PositionSighting)>(
    pattern: &str,
    mut visit: F,
) -> Result<ScanStats, LagebildError> {
    let paths = glob::glob(pattern).map_err(|_| LagebildError::NoInput {
        pattern: pattern.to_string(),
    })?;
    let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
    files.sort();
    if files.is_empty() {
        return Err(LagebildError::NoInput {
            pattern: pattern.to_string(),
        });
    }

    let mut stats = ScanStats::default();
    for path in files {
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                log::warn!("skipping unreadable {}: {}", path.display(), e);
                continue;
            }
        };
        stats.files += 1;
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    log::warn!("read error in {}: {}", path.display(), e);
                    stats.skipped += 1;
                    continue;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_log_line(line) {
                Some(sighting) => {
                    stats.parsed += 1;
                    visit(sighting);
                }
                None => stats.skipped += 1,
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(ts: &str, mmsi: &str) -> PositionSighting {
        PositionSighting {
            ts_utc: ts.parse().unwrap(),
            mmsi: mmsi.to_string(),
            imo: None,
            name: None,
            callsign: None,
            shiptype: None,
            destination: None,
            eta: None,
            draught: None,
            lat: 55.0,
            lon: 3.0,
            sog: None,
            cog: None,
            nav_status: None,
        }
    }

    #[test]
    fn test_writer_partitions_by_event_date() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DailyLogWriter::new(dir.path(), "bbox", 1).unwrap();

        writer.append(&sighting("2025-06-01T23:59:00Z", "111111111")).unwrap();
        writer.append(&sighting("2025-06-02T00:01:00Z", "111111111")).unwrap();
        // late event for the prior day lands in the prior day's file
        writer.append(&sighting("2025-06-01T23:59:30Z", "222222222")).unwrap();
        writer.close().unwrap();

        let day1 = std::fs::read_to_string(dir.path().join("bbox_2025-06-01.jsonl")).unwrap();
        let day2 = std::fs::read_to_string(dir.path().join("bbox_2025-06-02.jsonl")).unwrap();
        assert_eq!(day1.lines().count(), 2);
        assert_eq!(day2.lines().count(), 1);
        assert!(day1.lines().last().unwrap().contains("222222222"));
    }

    #[test]
    fn test_writer_appends_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut w = DailyLogWriter::new(dir.path(), "bbox", 10).unwrap();
            w.append(&sighting("2025-06-01T10:00:00Z", "111111111")).unwrap();
            w.close().unwrap();
        }
        {
            let mut w = DailyLogWriter::new(dir.path(), "bbox", 10).unwrap();
            w.append(&sighting("2025-06-01T11:00:00Z", "111111111")).unwrap();
            w.close().unwrap();
        }
        let text = std::fs::read_to_string(dir.path().join("bbox_2025-06-01.jsonl")).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_parse_log_line_lenient() {
        // numeric mmsi and string coordinates still parse
        let line = r#"{"ts_utc":"2025-06-01T10:00:00Z","mmsi":273123456,"lat":"54.6","lon":19.8,"name":"X"}"#;
        let s = parse_log_line(line).unwrap();
        assert_eq!(s.mmsi, "273123456");
        assert_eq!(s.lat, 54.6);
        assert_eq!(s.name.as_deref(), Some("X"));
    }

    #[test]
    fn test_parse_log_line_rejects_bad_records() {
        assert!(parse_log_line("not json").is_none());
        // short mmsi
        assert!(parse_log_line(
            r#"{"ts_utc":"2025-06-01T10:00:00Z","mmsi":"12345","lat":54.6,"lon":19.8}"#
        )
        .is_none());
        // out-of-range latitude
        assert!(parse_log_line(
            r#"{"ts_utc":"2025-06-01T10:00:00Z","mmsi":"273123456","lat":95.0,"lon":19.8}"#
        )
        .is_none());
        // missing timestamp
        assert!(parse_log_line(r#"{"mmsi":"273123456","lat":54.6,"lon":19.8}"#).is_none());
    }

    #[test]
    fn test_scan_logs_counts_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bbox_2025-06-01.jsonl"),
            "{\"ts_utc\":\"2025-06-01T10:00:00Z\",\"mmsi\":\"273123456\",\"lat\":54.6,\"lon\":19.8}\n\
             garbage line\n\
             \n",
        )
        .unwrap();

        let pattern = dir.path().join("bbox_*.jsonl");
        let mut seen = Vec::new();
        let stats = scan_logs(pattern.to_str().unwrap(), |s| seen.push(s.mmsi)).unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.parsed, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(seen, vec!["273123456"]);
    }

    #[test]
    fn test_scan_logs_empty_glob_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("nothing_*.jsonl");
        assert!(matches!(
            scan_logs(pattern.to_str().unwrap(), |_| {}),
            Err(LagebildError::NoInput { .. })
        ));
    }

    #[test]
    fn test_roundtrip_through_writer_and_parser() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = DailyLogWriter::new(dir.path(), "bbox", 1).unwrap();
        let mut s = sighting("2025-06-01T10:00:00Z", "273123456");
        s.imo = Some("9695523".to_string());
        s.destination = Some("PRIMORSK".to_string());
        writer.append(&s).unwrap();
        writer.close().unwrap();

        let text = std::fs::read_to_string(dir.path().join("bbox_2025-06-01.jsonl")).unwrap();
        let back = parse_log_line(text.lines().next().unwrap()).unwrap();
        assert_eq!(back, s);
    }
}
