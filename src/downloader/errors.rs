// Error types for the media client
//
// Extraction failures are returned to the caller once. Progress-channel
// failures never escape the job controller: they become a terminal
// FailureReason instead.

use thiserror::Error;

/// Errors from resolving a media URL into metadata
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Empty input. Checked before any request is made; callers treat it as a no-op.
    #[error("no media URL provided")]
    EmptyUrl,

    /// The request could not be completed
    #[error("extraction request for '{url}' failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("extraction of '{url}' rejected by server ({status}): {detail}")]
    Rejected {
        url: String,
        status: u16,
        detail: String,
    },

    /// The response body does not have the expected shape
    #[error("malformed extraction response for '{url}': {reason}")]
    MalformedPayload { url: String, reason: String },
}

impl ExtractionError {
    #[must_use]
    pub fn transport(url: &str, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.to_string(),
            source,
        }
    }

    #[must_use]
    pub fn rejected(url: &str, status: u16, detail: &str) -> Self {
        Self::Rejected {
            url: url.to_string(),
            status,
            detail: detail.to_string(),
        }
    }

    #[must_use]
    pub fn malformed(url: &str, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Input errors are silently ignored rather than reported
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EmptyUrl)
    }
}

/// Failures of the progress delivery channel itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("could not open progress stream: {0}")]
    Connect(String),

    #[error("progress stream answered with status {0}")]
    Status(u16),

    #[error("progress stream broke: {0}")]
    Stream(String),
}

/// Rejected session operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no media has been extracted yet")]
    NoMetadata,

    #[error("format '{0}' is not offered for the current media")]
    UnknownFormat(String),

    #[error("a download for format '{0}' is already running")]
    AlreadyRunning(String),
}

/// Invalid client configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL '{value}': {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base URL '{0}' cannot carry paths")]
    OpaqueBaseUrl(String),

    #[error("invalid proxy '{value}': {source}")]
    InvalidProxy {
        value: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Errors from saving a finished artifact to disk
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact request for job '{job_id}' failed: {source}")]
    Transport {
        job_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("artifact for job '{job_id}' unavailable (status {status})")]
    Status { job_id: String, status: u16 },

    #[error("failed to write artifact to {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
