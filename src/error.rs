//! Error types for benchpress

use std::fmt;

/// Result type alias for benchpress operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for benchpress
#[derive(Debug)]
pub enum Error {
    /// IO errors
    Io(std::io::Error),
    /// HTTP errors from the document-store client
    Http(reqwest::Error),
    /// Object store errors
    ObjectStore(object_store::Error),
    /// CSV serialization errors
    Csv(csv::Error),
    /// Serialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// Invalid exclusion pattern
    Pattern { pattern: String, reason: String },
    /// Unexpected response from the document store
    Query(String),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::ObjectStore(e) => Some(e),
            Error::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::ObjectStore(e) => write!(f, "Object store error: {}", e),
            Error::Csv(e) => write!(f, "CSV error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Pattern { pattern, reason } => {
                write!(f, "Invalid exclusion pattern '{}': {}", pattern, reason)
            }
            Error::Query(msg) => write!(f, "Query error: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<object_store::Error> for Error {
    fn from(e: object_store::Error) -> Self {
        Error::ObjectStore(e)
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
