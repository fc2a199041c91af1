use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("extraction failed: {0}")]
    Extraction(String),
    #[error("unparseable price {text:?}")]
    Parse { text: String },
    #[error("extraction timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Config(String),
}

impl AppError {
    pub fn parse(text: impl Into<String>) -> Self {
        AppError::Parse { text: text.into() }
    }

    /// Short, stable label used in logs and the health report.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Extraction(_) => "extraction",
            AppError::Parse { .. } => "parse",
            AppError::Timeout(_) => "timeout",
            AppError::Http(_) => "http",
            AppError::Io(_) => "io",
            AppError::Csv(_) => "csv",
            AppError::Config(_) => "config",
        }
    }
}
