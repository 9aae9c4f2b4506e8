use opend::OpendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Opend(#[from] OpendError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("not logged in; run `mintvault login` first")]
    NotLoggedIn,

    #[error("{0}")]
    Blocked(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
