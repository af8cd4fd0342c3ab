//! Error types for the diel analysis pipeline

use thiserror::Error;

/// Errors that can occur during analysis
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid timing configuration: {0}")]
    Configuration(String),

    #[error("Malformed tracking data: {0}")]
    DataShape(String),

    #[error("Insufficient data for statistical test: {0}")]
    InsufficientData(String),

    #[error("Timestamp parse error: {0}")]
    TimestampParse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
