//! Error types for masque.
//!
//! Very little in the pipeline is allowed to fail loudly. Detector failures
//! are swallowed by [`crate::backends::DetectorAdapter`], malformed candidates
//! are dropped with an audit entry, and missing configuration falls back to
//! documented defaults. What remains here is mostly configuration loading
//! and I/O.

use thiserror::Error;

/// Result type for masque operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for masque operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A detector failed during initialization or inference.
    #[error("Detector failed: {0}")]
    Detector(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (configuration syntax, dictionary files).
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a detector error.
    pub fn detector(msg: impl Into<String>) -> Self {
        Error::Detector(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
