use serde::{Deserialize, Serialize};

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { status: "success".to_string(), data: Some(data), message: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: "error".to_string(), data: None, message: Some(message.into()) }
    }
}

/// One artifact file offered by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// File name, usable as `/artifacts/{file}`
    pub file: String,
    /// Size in bytes
    pub size: u64,
    /// Estimator kind, absent when the header cannot be read
    pub kind: Option<String>,
    pub feature_names: Option<Vec<String>>,
    /// RFC 3339 training time
    pub trained_at: Option<String>,
}
