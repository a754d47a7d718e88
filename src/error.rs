use thiserror::Error;

/// Failure fetching a catalog or page. A 404 is not an error: fetch functions
/// return `Ok(None)` for content that is not yet published.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A week label that could not be turned into a date.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty week label")]
    Empty,
    #[error("unknown month in week label: {0}")]
    UnknownMonth(String),
    #[error("invalid day in week label: {0}")]
    InvalidDay(String),
    #[error("no such date: {year}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("{path} has header {found:?}, expected {expected:?}")]
    HeaderMismatch {
        path: String,
        found: Vec<String>,
        expected: Vec<String>,
    },
    #[error("{path} has no \"{column}\" column")]
    MissingColumn { path: String, column: &'static str },
}
