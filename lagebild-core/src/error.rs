use thiserror::Error;

/// Errors surfaced by the batch classification path.
///
/// Malformed individual records are never errors; they are skipped and
/// counted by the callers. These variants cover the conditions that must
/// abort a run.
#[derive(Error, Debug)]
pub enum LagebildError {
    #[error("watchlist {path}: {source}")]
    WatchlistIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("watchlist {path}: no header row")]
    WatchlistHeader { path: String },

    #[error("no input files match {pattern}")]
    NoInput { pattern: String },

    #[error("export {path}: {source}")]
    ExportIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
