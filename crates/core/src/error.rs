//! Error taxonomy shared by the client components.

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Rejection of a file offered for upload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The declared media type is not `text/csv`.
    #[error("Please upload a valid CSV file (got {media_type})")]
    NotCsv {
        /// Media type the file was declared with.
        media_type: String,
    },
    /// The file exceeds the configured size bound.
    #[error("File is too large ({size} bytes, max {limit} bytes)")]
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Configured maximum in bytes.
        limit: u64,
    },
}

/// Failure to turn an accepted file into preview text.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Display form of the offending path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The payload is not valid UTF-8 text.
    #[error("file is not valid UTF-8 text")]
    Decode(#[from] std::string::FromUtf8Error),
    /// The tokenizer gave up on the payload.
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Credential rejection at login.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Identifier or secret was left empty.
    #[error("credentials required")]
    CredentialsRequired,
    /// The backend refused the credentials; carries its detail message.
    #[error("{0}")]
    Rejected(String),
}

/// Any failure talking to the backend.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("backend unreachable: {0}")]
    Connect(String),
    /// The request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// The backend answered 401.
    #[error("unauthorized")]
    Unauthorized {
        /// Server-reported reason, when the body carried one.
        detail: Option<String>,
    },
    /// The backend answered with a non-success status.
    #[error("request failed with status {status}: {detail}")]
    Status {
        /// HTTP status returned.
        status: StatusCode,
        /// Server-reported detail, or the canonical reason.
        detail: String,
    },
    /// The response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// Any other client-side failure.
    #[error("request error: {0}")]
    Request(String),
}

impl TransportError {
    /// Server-provided detail for status and 401 failures, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            TransportError::Status { detail, .. } => Some(detail.as_str()),
            TransportError::Unauthorized { detail } => detail.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Failure reading or writing the durable key/value file.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("state file {path}: {source}")]
    Io {
        /// Display form of the state file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The state file holds invalid JSON.
    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        /// Display form of the state file path.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Either half of taking a file in for preview.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The file was refused before reading.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The file was accepted but could not be read.
    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Failure submitting an accepted file to the backend.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The file could not be read for sending.
    #[error(transparent)]
    Read(#[from] ReadError),
    /// The backend call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
