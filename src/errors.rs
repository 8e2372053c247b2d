use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Operation canceled")]
    Canceled,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Packaging error: {0}")]
    Packaging(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, AppError::Canceled)
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(error: zip::result::ZipError) -> Self {
        AppError::Packaging(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
