use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Input file is empty: {0}")]
    EmptyInput(String),

    #[error("Input file is not valid UTF-8: {0}")]
    Decode(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
