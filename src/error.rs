// Error types shared by every pipeline stage.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

/// One or more columns the caller promised were absent from the input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing required column(s): {}", .missing.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

impl SchemaError {
    pub fn new<I, S>(missing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemaError {
            missing: missing.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
