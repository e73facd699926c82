use thiserror::Error;

/// Failures of the local article store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Failures reported by a remote article source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Invalid API key")]
    Unauthorized,

    #[error("API rate limit exceeded")]
    RateLimited,

    #[error("Server error (code {0})")]
    ServerError(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RemoteError::ServerError(status.as_u16())
        } else {
            RemoteError::Network(err.to_string())
        }
    }
}

/// Non-fatal error delivered alongside still-valid (possibly stale) data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    #[error("{0}")]
    Remote(#[from] RemoteError),

    #[error("Local storage unavailable: {0}")]
    Storage(String),
}

impl From<StorageError> for Advisory {
    fn from(err: StorageError) -> Self {
        Advisory::Storage(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
