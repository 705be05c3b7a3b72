//! XQueue 报文类型
//!
//! 提交与回调都使用表单编码，`xqueue_header` 与 `xqueue_body` 字段各自是一段 JSON 文本。

use crate::error::{CoursehubError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 提交任务时附带的头部，队列回调时原样带回 `lms_key`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XQueueHeader {
    pub lms_callback_url: String,
    pub lms_key: String,
    pub queue_name: String,
}

/// 队列 HTTP 接口的统一响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XQueueReply {
    pub return_code: i32,
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub content: JsonValue,
}

impl XQueueReply {
    pub fn ok() -> Self {
        Self {
            return_code: 0,
            content: JsonValue::Null,
        }
    }

    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            return_code: 1,
            content: JsonValue::String(content.into()),
        }
    }
}

/// 构造回调地址，`task_identifier` 存在时追加 `?key=`
pub fn make_callback_url(
    use_https: bool,
    site_name: &str,
    path: &str,
    task_identifier: Option<&str>,
) -> String {
    let scheme = if use_https { "https" } else { "http" };
    let path = path.trim_start_matches('/');
    match task_identifier {
        Some(key) => format!("{scheme}://{site_name}/{path}?key={key}"),
        None => format!("{scheme}://{site_name}/{path}"),
    }
}

/// 队列回调的原始表单
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackForm {
    pub xqueue_header: Option<String>,
    pub xqueue_body: Option<String>,
}

/// 解析后的回调内容
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackPayload {
    pub header: JsonValue,
    pub body: JsonValue,
}

impl CallbackForm {
    pub fn parse(&self) -> Result<CallbackPayload> {
        let header = parse_field("xqueue_header", self.xqueue_header.as_deref())?;
        let body = parse_field("xqueue_body", self.xqueue_body.as_deref())?;
        Ok(CallbackPayload { header, body })
    }
}

fn parse_field(name: &str, raw: Option<&str>) -> Result<JsonValue> {
    let raw = raw.ok_or_else(|| CoursehubError::malformed_callback(format!("missing {name}")))?;
    let value: JsonValue = serde_json::from_str(raw)
        .map_err(|err| CoursehubError::malformed_callback(format!("invalid {name}: {err}")))?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(CoursehubError::malformed_callback(format!(
            "{name} must be a JSON object"
        )))
    }
}

impl CallbackPayload {
    pub fn lms_key(&self) -> Option<&str> {
        self.header.get("lms_key").and_then(JsonValue::as_str)
    }

    pub fn body_str(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(JsonValue::as_str)
    }

    /// 读取必填字段，缺失时视为回调格式错误
    pub fn require_body_str(&self, field: &str) -> Result<&str> {
        self.body_str(field).ok_or_else(|| {
            CoursehubError::malformed_callback(format!("xqueue_body missing '{field}'"))
        })
    }
}
