//! CourseHub 统一错误类型定义
//!
//! 领域层与 HTTP 层共享同一个错误类型，每个变体对应一个明确的 HTTP 状态码。

use crate::status::{CertificateAction, CertificateStatus};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// CourseHub 统一错误类型
#[derive(Error, Debug)]
pub enum CoursehubError {
    /// 资源未找到 (404)
    #[error("{0} not found")]
    NotFound(String),

    /// 用户不存在 (404)
    #[error("user '{0}' not found")]
    UserNotFound(String),

    /// 课程不存在 (400)
    #[error("No course '{0}' found")]
    CourseNotFound(String),

    /// 课程标识格式错误 (400)
    #[error("invalid course key '{0}'")]
    InvalidCourseKey(String),

    /// 课程不提供所请求的模式 (400)
    #[error("The course mode '{mode}' is not available for course '{course_id}'.")]
    CourseModeNotFound {
        mode: String,
        course_id: String,
        course_details: JsonValue,
    },

    /// 用户已选课 (409)，携带已有的选课记录
    #[error("enrollment already exists")]
    EnrollmentExists(Box<JsonValue>),

    /// 请求被策略拒绝 (403)
    #[error("{0}")]
    Forbidden(String),

    /// 非法的证书状态迁移 (409)
    #[error("cannot {action} certificate in status '{from}'")]
    InvalidTransition {
        from: CertificateStatus,
        action: CertificateAction,
    },

    /// 用户在同一课程中属于多个分组 (409)
    #[error("user '{username}' belongs to multiple cohorts in course '{course_id}'")]
    MultipleCohorts { username: String, course_id: String },

    /// 队列回调参数错误 (400)
    #[error("malformed callback: {0}")]
    MalformedCallback(String),

    /// 请求参数验证失败 (400)
    #[error("{0}")]
    Validation(String),

    /// 外部队列错误 (502)
    #[error("queue error: {0}")]
    Queue(String),

    /// 数据库错误 (500)
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// 序列化错误 (500)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 其他内部错误 (500)
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoursehubError {
    /// 创建未找到错误
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// 创建验证错误
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// 创建队列错误
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    /// 创建回调参数错误
    pub fn malformed_callback(msg: impl Into<String>) -> Self {
        Self::MalformedCallback(msg.into())
    }

    /// 判断是否为客户端错误（4xx）
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status_code())
    }

    /// 判断是否为服务端错误（5xx）
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// 获取 HTTP 状态码
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::UserNotFound(_) => 404,
            Self::CourseNotFound(_)
            | Self::InvalidCourseKey(_)
            | Self::CourseModeNotFound { .. }
            | Self::MalformedCallback(_)
            | Self::Validation(_) => 400,
            Self::Forbidden(_) => 403,
            Self::EnrollmentExists(_)
            | Self::InvalidTransition { .. }
            | Self::MultipleCohorts { .. } => 409,
            Self::Queue(_) => 502,
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => 500,
        }
    }

    /// 获取 HTTP 状态码（axum 类型）
    #[cfg(feature = "lms")]
    pub fn axum_status_code(&self) -> axum::http::StatusCode {
        axum::http::StatusCode::from_u16(self.http_status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// CourseHub Result 类型别名
pub type Result<T> = std::result::Result<T, CoursehubError>;

// ============ Axum HTTP 响应支持 ============

#[cfg(feature = "lms")]
mod axum_impl {
    use super::*;
    use axum::{
        Json,
        response::{IntoResponse, Response},
    };
    use serde_json::json;

    impl IntoResponse for CoursehubError {
        fn into_response(self) -> Response {
            let status = self.axum_status_code();

            // 根据错误类型和严重程度记录结构化日志
            match &self {
                CoursehubError::NotFound(_)
                | CoursehubError::UserNotFound(_)
                | CoursehubError::CourseNotFound(_)
                | CoursehubError::InvalidCourseKey(_)
                | CoursehubError::CourseModeNotFound { .. }
                | CoursehubError::EnrollmentExists(_)
                | CoursehubError::Validation(_) => {
                    tracing::info!(status = status.as_u16(), reason = %self, "Client error");
                }
                CoursehubError::Forbidden(msg) => {
                    tracing::info!(status = status.as_u16(), reason = %msg, "Request forbidden");
                }
                CoursehubError::InvalidTransition { from, action } => {
                    tracing::warn!(
                        status = status.as_u16(),
                        from = %from,
                        action = %action,
                        "Rejected certificate transition"
                    );
                }
                CoursehubError::MultipleCohorts {
                    username,
                    course_id,
                } => {
                    tracing::warn!(
                        status = status.as_u16(),
                        username = %username,
                        course_id = %course_id,
                        "User found in multiple cohorts"
                    );
                }
                // 回调格式错误需要关注，可能是队列版本不匹配
                CoursehubError::MalformedCallback(msg) => {
                    tracing::error!(
                        status = status.as_u16(),
                        callback_error = %msg,
                        "Malformed queue callback"
                    );
                }
                CoursehubError::Queue(msg) => {
                    tracing::warn!(
                        status = status.as_u16(),
                        queue_error = %msg,
                        "Queue operation failed"
                    );
                }
                CoursehubError::Database(db_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        error = %db_err,
                        "Database operation failed"
                    );
                }
                CoursehubError::Serialization(json_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        serialization_error = %json_err,
                        "JSON serialization failed"
                    );
                }
                CoursehubError::Internal(internal_err) => {
                    tracing::error!(
                        status = status.as_u16(),
                        internal_error = ?internal_err,
                        "Internal server error"
                    );
                }
            }

            let body = match self {
                CoursehubError::CourseModeNotFound {
                    ref course_details, ..
                } => json!({
                    "message": self.to_string(),
                    "course_details": course_details,
                }),
                CoursehubError::EnrollmentExists(enrollment) => *enrollment,
                other => json!({"message": other.to_string()}),
            };
            (status, Json(body)).into_response()
        }
    }
}

// ============ 事务错误支持 ============

/// SeaORM 事务错误转换
impl<T> From<sea_orm::TransactionError<T>> for CoursehubError
where
    T: Into<CoursehubError>,
{
    fn from(err: sea_orm::TransactionError<T>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(db) => Self::Database(db),
            sea_orm::TransactionError::Transaction(app) => app.into(),
        }
    }
}
