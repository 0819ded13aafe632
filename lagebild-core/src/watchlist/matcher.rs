use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::csv::{decode, detect_delimiter, map_header, parse_flag, split_record, Column};
use crate::sighting::{digits_only, is_imo, is_mmsi};
use crate::LagebildError;

/// One row of the watchlist snapshot, normalized and shape-checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub category: String,
    pub name: String,
    pub imo: Option<String>,
    pub mmsi: Option<String>,
    pub sanctioned: bool,
    pub sanctions: String,
    pub note: String,
}

/// How a vessel matched the watchlist. Identifier routes outrank the
/// advisory name route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchVia {
    Mmsi,
    Imo,
    Name,
}

impl MatchVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchVia::Mmsi => "mmsi",
            MatchVia::Imo => "imo",
            MatchVia::Name => "name",
        }
    }
}

/// Normalize a vessel name for matching: uppercase, punctuation to spaces,
/// whitespace collapsed.
pub fn normalize_name(s: &str) -> String {
    let upper = s.trim().to_uppercase();
    let spaced: String = upper
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Watchlist membership index by MMSI, IMO and normalized name.
#[derive(Debug, Clone, Default)]
pub struct WatchlistMatcher {
    entries: Vec<WatchlistEntry>,
    by_mmsi: HashMap<String, usize>,
    by_imo: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl WatchlistMatcher {
    /// Load a snapshot from disk. Encoding and delimiter are auto-detected;
    /// rows without any usable identifier or name are dropped.
    pub fn load(path: &Path) -> Result<Self, LagebildError> {
        let bytes = std::fs::read(path).map_err(|source| LagebildError::WatchlistIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&bytes, &path.display().to_string())
    }

    /// Parse a snapshot already in memory. `origin` is used for error text.
    pub fn from_bytes(bytes: &[u8], origin: &str) -> Result<Self, LagebildError> {
        let text = decode(bytes);
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header = lines.next().ok_or_else(|| LagebildError::WatchlistHeader {
            path: origin.to_string(),
        })?;
        let delimiter = detect_delimiter(header);
        let columns: Vec<Option<Column>> = split_record(header, delimiter)
            .iter()
            .map(|h| map_header(h))
            .collect();

        let mut matcher = WatchlistMatcher::default();
        for line in lines {
            let fields = split_record(line, delimiter);
            let mut entry = WatchlistEntry::default();
            for (i, field) in fields.iter().enumerate() {
                let value = field.trim();
                match columns.get(i).copied().flatten() {
                    Some(Column::Category) => entry.category = value.to_string(),
                    Some(Column::Name) => {
                        // First non-empty name column wins
                        if entry.name.is_empty() {
                            entry.name = value.to_string();
                        }
                    }
                    Some(Column::Imo) => {
                        let digits = digits_only(value);
                        if is_imo(&digits) {
                            entry.imo = Some(digits);
                        }
                    }
                    Some(Column::Mmsi) => {
                        let digits = digits_only(value);
                        if is_mmsi(&digits) {
                            entry.mmsi = Some(digits);
                        }
                    }
                    Some(Column::Sanctioned) => entry.sanctioned = parse_flag(value),
                    Some(Column::Sanctions) => entry.sanctions = value.to_string(),
                    Some(Column::Note) => entry.note = value.to_string(),
                    None => {}
                }
            }
            if entry.mmsi.is_none() && entry.imo.is_none() && entry.name.is_empty() {
                continue;
            }
            matcher.push(entry);
        }
        Ok(matcher)
    }

    fn push(&mut self, entry: WatchlistEntry) {
        let idx = self.entries.len();
        if let Some(mmsi) = &entry.mmsi {
            self.by_mmsi.entry(mmsi.clone()).or_insert(idx);
        }
        if let Some(imo) = &entry.imo {
            self.by_imo.entry(imo.clone()).or_insert(idx);
        }
        let norm = normalize_name(&entry.name);
        if !norm.is_empty() {
            self.by_name.entry(norm).or_insert(idx);
        }
        self.entries.push(entry);
    }

    /// Membership test against a vessel's current identity.
    ///
    /// MMSI and IMO matches are authoritative; the normalized-name route is
    /// consulted only when neither identifier matched.
    pub fn matches(
        &self,
        mmsi: &str,
        imo: Option<&str>,
        name: Option<&str>,
    ) -> Option<(MatchVia, &WatchlistEntry)> {
        if let Some(&idx) = self.by_mmsi.get(mmsi) {
            return Some((MatchVia::Mmsi, &self.entries[idx]));
        }
        if let Some(imo) = imo.filter(|v| is_imo(v)) {
            if let Some(&idx) = self.by_imo.get(imo) {
                return Some((MatchVia::Imo, &self.entries[idx]));
            }
        }
        if let Some(name) = name {
            let norm = normalize_name(name);
            if !norm.is_empty() {
                if let Some(&idx) = self.by_name.get(&norm) {
                    return Some((MatchVia::Name, &self.entries[idx]));
                }
            }
        }
        None
    }

    /// Sorted list of all indexed MMSI, for upstream server-side filtering.
    pub fn mmsi_filter(&self) -> Vec<String> {
        let mut out: Vec<String> = self.by_mmsi.keys().cloned().collect();
        out.sort();
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
