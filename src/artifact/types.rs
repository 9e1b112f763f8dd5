use std::error::Error;
use std::fmt;

/// Custom error types for artifact encoding and decoding
#[derive(Debug)]
pub enum ArtifactError {
    /// Wraps std::io::Error for file operations and truncated input
    IoError(std::io::Error),
    /// Invalid format errors with a message
    InvalidFormat(String),
    /// The artifact was written by an unknown format version
    UnsupportedVersion(u32),
    /// The estimator payload could not be (de)serialized
    Payload(String),
}

/// Implements Display trait for ArtifactError for error reporting
impl fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ArtifactError::IoError(e) => write!(f, "I/O error: {}", e),
            ArtifactError::InvalidFormat(msg) => write!(f, "Invalid artifact format: {}", msg),
            ArtifactError::UnsupportedVersion(v) => write!(f, "Unsupported artifact version: {}", v),
            ArtifactError::Payload(msg) => write!(f, "Invalid estimator payload: {}", msg),
        }
    }
}

impl Error for ArtifactError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ArtifactError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

/// Allows automatic conversion from std::io::Error to ArtifactError
impl From<std::io::Error> for ArtifactError {
    fn from(err: std::io::Error) -> Self {
        ArtifactError::IoError(err)
    }
}

impl From<serde_json::Error> for ArtifactError {
    fn from(err: serde_json::Error) -> Self {
        ArtifactError::Payload(err.to_string())
    }
}
