use thiserror::Error;

pub type Result<T> = std::result::Result<T, CovidcastError>;

#[derive(Debug, Error)]
pub enum CovidcastError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Malformed column name {column:?}: {reason}")]
    Format { column: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for CovidcastError {
    fn from(err: serde_json::Error) -> Self {
        CovidcastError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for CovidcastError {
    fn from(err: std::io::Error) -> Self {
        CovidcastError::Io(err.to_string())
    }
}

impl From<csv::Error> for CovidcastError {
    fn from(err: csv::Error) -> Self {
        CovidcastError::Io(err.to_string())
    }
}
