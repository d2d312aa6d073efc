//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub const NOT_FOUND_MESSAGE: &str = "Resource not found";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: entity {entity} column '{column}'")]
    InvalidPrimaryKey { entity: String, column: String },
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound,
    /// Body failed the entity's validation rules; carries every message.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// Body could not be interpreted at all (not a JSON object, wrong shape).
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    #[error("{0} not allowed")]
    NotAllowed(&'static str),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("store: {0}")]
    Store(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{status, message}`; message is a string, or the list of messages for validation failures.
#[derive(Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: serde_json::Value,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = match self {
            AppError::NotFound | AppError::Db(sqlx::Error::RowNotFound) => ErrorBody {
                status: "failed",
                message: NOT_FOUND_MESSAGE.into(),
            },
            AppError::Validation(messages) => ErrorBody {
                status: "error",
                message: messages.into(),
            },
            AppError::Unprocessable(message) => ErrorBody {
                status: "error",
                message: vec![message].into(),
            },
            other => ErrorBody {
                status: "error",
                message: other.to_string().into(),
            },
        };
        (status, Json(body)).into_response()
    }
}
