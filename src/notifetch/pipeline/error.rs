use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::notifetch::pipeline::fetch::FetchCursor;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur while the
/// pipeline fetches, normalizes, assembles, or exports data.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when the CSV encoder fails.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a workbook does not follow the export layout.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// The credential was missing or rejected by the remote service.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// The requested source does not exist.
    #[error("source not found: {0}")]
    NotFound(String),

    /// The credential is valid but may not read the requested source.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Timeouts, resets, and server-side hiccups worth retrying.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The remote service asked us to slow down.
    #[error("rate limited by remote service")]
    RateLimited { retry_after: Option<Duration> },

    /// Any other rejection from the remote service.
    #[error("remote service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The remote service answered with a payload we could not decode.
    #[error("malformed remote payload: {0}")]
    Decode(String),

    /// A fetch stopped before completion. The cursor is the last position
    /// that was fully delivered to the caller.
    #[error("fetch interrupted after {} records: {source}", .cursor.retrieved())]
    FetchInterrupted {
        cursor: FetchCursor,
        #[source]
        source: Box<ToolError>,
    },

    /// An assembled row did not match the unified column count.
    #[error("schema violation in row {row}: expected {expected} cells, found {actual}")]
    SchemaViolation {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Raised when a page or database identifier cannot be parsed.
    #[error("invalid source identifier '{0}'")]
    InvalidSourceId(String),

    /// Raised when the secret provider has no value for the requested name.
    #[error("secret '{0}' is not available")]
    MissingSecret(String),

    /// Raised when the secret provider refuses an operation.
    #[error("secret store error: {0}")]
    SecretStore(String),

    /// Raised when the configuration file is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Raised when an export format cannot be determined.
    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl ToolError {
    /// Whether the fetcher should retry the same request after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ToolError::TransientNetwork(_) | ToolError::RateLimited { .. }
        )
    }

    /// Returns `Some` for rate-limit signals. The inner value is the delay the
    /// service asked for, if it named one.
    pub fn rate_limit_delay(&self) -> Option<Option<Duration>> {
        match self {
            ToolError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// The error underneath any [`ToolError::FetchInterrupted`] wrapping.
    pub fn root_cause(&self) -> &ToolError {
        match self {
            ToolError::FetchInterrupted { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The cursor a caller can resume from, when the error carries one.
    pub fn resume_cursor(&self) -> Option<&FetchCursor> {
        match self {
            ToolError::FetchInterrupted { cursor, .. } => Some(cursor),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() || error.is_request() {
            ToolError::TransientNetwork(error.to_string())
        } else if error.is_decode() {
            ToolError::Decode(error.to_string())
        } else {
            ToolError::Api {
                status: error.status().map(|status| status.as_u16()).unwrap_or(0),
                message: error.to_string(),
            }
        }
    }
}
