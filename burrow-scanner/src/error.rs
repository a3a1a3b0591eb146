use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Blacklisted URL: {0}")]
    Blacklisted(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<url::ParseError> for ScanError {
    fn from(e: url::ParseError) -> Self {
        ScanError::InvalidUrl(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
