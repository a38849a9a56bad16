use axum::{response::{IntoResponse, Response}, Json};
use http::StatusCode;
use serde::Serialize;

use crate::models::{Category, ChannelId};

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("question dataset is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("question dataset schema is invalid: {0}")]
    Schema(String),
    #[error("question dataset failed validation: {}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("category {category} has {available} distinct countries, {required} are needed")]
    TooFewCountries {
        category: Category,
        available: usize,
        required: usize,
    },
    #[error("category {0} has no questions")]
    MissingCategory(Category),
}

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("stats database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stats migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("stored category is unknown: {0}")]
    Corrupt(#[from] crate::models::UnknownCategory),
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("unknown user {0}")]
    UnknownUser(String),
    #[error("chat gateway unavailable: {0}")]
    Unavailable(String),
    #[error("presentation encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("channel {0} is not a quiz channel")]
    UnassignedChannel(ChannelId),
    #[error(transparent)]
    Bank(#[from] BankError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub field: String,
    pub issue: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Vec::new(),
            request_id: request_id.into(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }

    pub fn internal(err: impl std::fmt::Display, request_id: impl Into<String>) -> Self {
        tracing::error!("request failed: {}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "internal error", request_id)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let payload = ErrorBody {
            error: ErrorPayload {
                code: self.code,
                message: self.message,
                details: self.details,
                request_id: self.request_id,
            },
        };
        (self.status, Json(payload)).into_response()
    }
}
