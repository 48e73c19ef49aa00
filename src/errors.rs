use actix_web::{http::StatusCode, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("http error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Error in getData: upstream responded with {status}")]
    Upstream { status: u16 },

    #[error("internal server error")]
    InternalError,

    #[error("authentication failed")]
    InvalidUsernamePassword,

    #[error("invalid token")]
    InvalidToken,

    #[error("no session id")]
    MissingSession,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing configuration variable {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AppError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        AppError::InvalidInput(msg.into())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ReqwestError(_) => StatusCode::BAD_GATEWAY,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidUsernamePassword => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::MissingSession => StatusCode::BAD_REQUEST,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::MissingConfig(_) | AppError::InvalidConfig(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
