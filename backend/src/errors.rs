use crate::model::Role;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Authentication(String),

    #[error("Insufficient permissions: {required} role required")]
    Authorization { required: Role },

    #[error("{0}")]
    NotFound(String),

    #[error("Anomaly model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Request body the extractors could not decode.
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },

    #[error("Training error: {0}")]
    Training(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
