use thiserror::Error;

/// Main error type for the papergen engine
#[derive(Error, Debug)]
pub enum PaperGenError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for PaperGenError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        PaperGenError::ThreadPool(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PaperGenError>;
