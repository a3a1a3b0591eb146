use burrow_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to reach canary URL {url}: {source}")]
    Canary {
        url: String,
        #[source]
        source: ScanError,
    },

    #[error("No seed URLs supplied")]
    NoSeeds,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<url::ParseError> for EngineError {
    fn from(e: url::ParseError) -> Self {
        EngineError::Scan(ScanError::from(e))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
