//! 请求参数与配置验证
//!
//! 管理接口写入数据库前在这里做统一校验，错误以 `ValidationError` 返回，
//! 由调用方转换成 400 响应。

use crate::error::CoursehubError;
use serde_json::Value as JsonValue;

/// 验证错误类型
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// 字段不是合法 JSON
    InvalidJson { field: &'static str, reason: String },

    /// JSON 顶层必须是对象
    NotAnObject { field: &'static str },

    /// 成绩超出 0..1
    PercentOutOfRange { percent: f64 },

    /// 必填字段为空
    EmptyField { field: &'static str },
}

impl ValidationError {
    /// 获取错误的详细描述
    pub fn description(&self) -> String {
        match self {
            Self::InvalidJson { field, reason } => {
                format!("{field} must be valid JSON: {reason}")
            }
            Self::NotAnObject { field } => format!("{field} must be a JSON object"),
            Self::PercentOutOfRange { percent } => {
                format!("percent {percent} out of range (must be 0-1)")
            }
            Self::EmptyField { field } => format!("{field} must not be empty"),
        }
    }
}

impl From<ValidationError> for CoursehubError {
    fn from(err: ValidationError) -> Self {
        CoursehubError::Validation(err.description())
    }
}

/// 校验证书 HTML 视图配置文本，返回解析后的对象
pub fn validate_html_view_configuration(raw: &str) -> Result<JsonValue, ValidationError> {
    let value: JsonValue =
        serde_json::from_str(raw).map_err(|err| ValidationError::InvalidJson {
            field: "configuration",
            reason: err.to_string(),
        })?;
    if !value.is_object() {
        return Err(ValidationError::NotAnObject {
            field: "configuration",
        });
    }
    Ok(value)
}

/// 校验成绩百分比
pub fn validate_percent(percent: f64) -> Result<f64, ValidationError> {
    if percent.is_finite() && (0.0..=1.0).contains(&percent) {
        Ok(percent)
    } else {
        Err(ValidationError::PercentOutOfRange { percent })
    }
}

/// 校验必填文本字段
pub fn validate_non_empty<'a>(
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(trimmed)
    }
}
