use thiserror::Error;

/// Application error types.
///
/// Only hard failures live here. A missing or malformed source degrades the
/// aggregated signal instead (see `SourceUnavailable`).
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Why a source did not contribute to a horizon this cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceUnavailable {
    #[error("source disabled")]
    Disabled,

    #[error("no data")]
    NoData,

    #[error("invalid input: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
