//! Error types for each component seam.
//!
//! The CLI wraps these in `anyhow` at its entry points; the HTTP server maps
//! them onto status codes in [`crate::server`].

use std::path::PathBuf;
use thiserror::Error;

/// Missing or invalid configuration. Never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("{0} is not set; text extraction is disabled")]
    MissingApiKey(String),
}

/// Failure of the outbound model call. The caller shows it and never stores
/// it as extracted text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("request to extraction API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("extraction API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Input(String),
}

/// Failure of a persistence operation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid stored value in column {column}: {value}")]
    Decode { column: &'static str, value: String },

    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while building an export artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("xlsx packaging failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("export i/o failed: {0}")]
    Io(#[from] std::io::Error),
}
