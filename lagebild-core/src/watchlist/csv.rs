//! CSV dialect detection and record splitting for watchlist snapshots.

/// Canonical watchlist columns. Anything else in the header is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Column {
    Category,
    Name,
    Imo,
    Mmsi,
    Sanctioned,
    Sanctions,
    Note,
}

/// Map a raw header cell to a canonical column.
///
/// Lowercased, spaces and dashes folded to underscores, then matched
/// against the known synonyms of each column.
pub(crate) fn map_header(raw: &str) -> Option<Column> {
    let mut h = raw.trim().to_ascii_lowercase();
    h.retain(|c| c != ' ');
    let h = h.replace('-', "_");
    match h.as_str() {
        "category" | "kse_category" => Some(Column::Category),
        "name" | "vessel_name" | "vesselname" | "ship_name" | "shipname" | "vessel" => {
            Some(Column::Name)
        }
        "imo" | "imo_number" | "imonumber" | "imo_no" | "imoid" => Some(Column::Imo),
        "mmsi" | "mmsi_number" | "mmsino" | "mmsiid" | "userid" => Some(Column::Mmsi),
        "sanctioned" => Some(Column::Sanctioned),
        "sanctions" | "sanctions_text" => Some(Column::Sanctions),
        "note" | "notes" | "comment" => Some(Column::Note),
        _ => None,
    }
}

/// Decode raw snapshot bytes, honoring UTF-16 and UTF-8 BOMs.
pub(crate) fn decode(bytes: &[u8]) -> String {
    let encoding = if bytes.starts_with(&[0xFF, 0xFE]) {
        encoding_rs::UTF_16LE
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        encoding_rs::UTF_16BE
    } else {
        encoding_rs::UTF_8
    };
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Pick the delimiter by counting candidates in the header line.
pub(crate) fn detect_delimiter(header: &str) -> char {
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        ';'
    } else {
        ','
    }
}

/// Split one CSV record, honoring double quotes and `""` escapes.
///
/// Quoted fields spanning multiple lines are not supported; watchlist
/// snapshots are one record per line.
pub(crate) fn split_record(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
        } else if c == delimiter {
            fields.push(std::mem::take(&mut field));
        } else {
            field.push(c);
        }
    }
    fields.push(field);
    fields
}

/// Truthy values accepted for the `sanctioned` column.
pub(crate) fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}
