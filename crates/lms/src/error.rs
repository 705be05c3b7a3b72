use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coursehub_common::CoursehubError;
use sea_orm::TransactionError;
use serde_json::{Map, Value as JsonValue, json};
use thiserror::Error;

/// HTTP 层错误：需要自定义响应体的情况放在这里，领域错误透传给 `CoursehubError`
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    /// 400，响应体在 `message` 之外附加字段
    #[error("{message}")]
    BadRequestWith { message: String, extra: JsonValue },
    #[error("authentication required")]
    Unauthorized,
    #[error("{message}")]
    Forbidden { message: String, extra: JsonValue },
    #[error(transparent)]
    Domain(#[from] CoursehubError),
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
            extra: JsonValue::Null,
        }
    }
}

fn body_with(message: String, extra: JsonValue) -> JsonValue {
    let mut body = Map::new();
    body.insert("message".to_string(), JsonValue::String(message));
    if let JsonValue::Object(fields) = extra {
        body.extend(fields);
    }
    JsonValue::Object(body)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Domain(err) => return err.into_response(),
            AppError::Db(err) => return CoursehubError::Database(err).into_response(),
            AppError::Internal(err) => return CoursehubError::Internal(err).into_response(),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({"message": msg})),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({"message": msg})),
            AppError::BadRequestWith { message, extra } => {
                (StatusCode::BAD_REQUEST, body_with(message, extra))
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({"message": "Authentication credentials were not provided."}),
            ),
            AppError::Forbidden { message, extra } => {
                tracing::info!(reason = %message, "Request forbidden");
                (StatusCode::FORBIDDEN, body_with(message, extra))
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<TransactionError<AppError>> for AppError {
    fn from(err: TransactionError<AppError>) -> Self {
        match err {
            TransactionError::Connection(db) => Self::Db(db),
            TransactionError::Transaction(app) => app,
        }
    }
}

impl From<TransactionError<CoursehubError>> for AppError {
    fn from(err: TransactionError<CoursehubError>) -> Self {
        Self::Domain(err.into())
    }
}
