//! 证书状态机
//!
//! 证书行在数据库中以小写字符串保存状态。所有状态迁移都经过本模块，
//! 服务层与回调处理不直接比较状态字符串。

use crate::error::{CoursehubError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 证书状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Unavailable,
    Generating,
    Regenerating,
    Deleting,
    Deleted,
    Downloadable,
    Notpassing,
    Restricted,
    Error,
}

/// 触发状态迁移的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateAction {
    Add,
    Regenerate,
    Delete,
    /// 队列回调报告任务完成
    Complete,
}

/// 队列回调的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Success,
    Error { reason: Option<String> },
}

/// 示例证书状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExampleCertificateStatus {
    Started,
    Success,
    Error,
}

impl CertificateStatus {
    pub const ALL: [CertificateStatus; 9] = [
        Self::Unavailable,
        Self::Generating,
        Self::Regenerating,
        Self::Deleting,
        Self::Deleted,
        Self::Downloadable,
        Self::Notpassing,
        Self::Restricted,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Generating => "generating",
            Self::Regenerating => "regenerating",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
            Self::Downloadable => "downloadable",
            Self::Notpassing => "notpassing",
            Self::Restricted => "restricted",
            Self::Error => "error",
        }
    }

    /// 当前状态是否允许执行指定动作
    pub fn allows(&self, action: CertificateAction) -> bool {
        match action {
            CertificateAction::Add => matches!(
                self,
                Self::Generating
                    | Self::Unavailable
                    | Self::Deleted
                    | Self::Error
                    | Self::Notpassing
            ),
            CertificateAction::Regenerate | CertificateAction::Delete => {
                matches!(self, Self::Error | Self::Downloadable)
            }
            CertificateAction::Complete => {
                matches!(self, Self::Generating | Self::Regenerating | Self::Deleting)
            }
        }
    }

    /// 提交到队列后进入的等待状态
    pub fn pending(action: CertificateAction) -> Option<Self> {
        match action {
            CertificateAction::Add => Some(Self::Generating),
            CertificateAction::Regenerate => Some(Self::Regenerating),
            CertificateAction::Delete => Some(Self::Deleting),
            CertificateAction::Complete => None,
        }
    }

    /// 校验动作并返回等待状态；非法迁移返回 `InvalidTransition`
    pub fn begin(self, action: CertificateAction) -> Result<Self> {
        match Self::pending(action) {
            Some(next) if self.allows(action) => Ok(next),
            _ => Err(CoursehubError::InvalidTransition { from: self, action }),
        }
    }

    /// 根据队列回调计算新状态
    ///
    /// 错误结果在任何状态下都会把证书置为 `error`。成功结果只对等待中的证书有效。
    pub fn apply_callback(self, outcome: &CallbackOutcome) -> Result<Self> {
        match outcome {
            CallbackOutcome::Error { .. } => Ok(Self::Error),
            CallbackOutcome::Success => match self {
                Self::Generating | Self::Regenerating => Ok(Self::Downloadable),
                Self::Deleting => Ok(Self::Deleted),
                other => Err(CoursehubError::InvalidTransition {
                    from: other,
                    action: CertificateAction::Complete,
                }),
            },
        }
    }

    /// 对学员展示时是否视为“生成中”
    pub fn is_generating_for_display(&self) -> bool {
        matches!(self, Self::Generating | Self::Error)
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateStatus {
    type Err = CoursehubError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoursehubError::validation(format!("unknown certificate status '{s}'")))
    }
}

impl CertificateAction {
    /// 队列协议中的动作名
    pub fn queue_action(&self) -> &'static str {
        match self {
            Self::Add => "create",
            Self::Regenerate => "regen",
            Self::Delete => "delete",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for CertificateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Regenerate => "regenerate",
            Self::Delete => "delete",
            Self::Complete => "complete",
        })
    }
}

impl CallbackOutcome {
    /// 解析回调体：含 `error` 字段视为失败
    pub fn from_body(body: &serde_json::Value) -> Self {
        if body.get("error").is_some() {
            Self::Error {
                reason: body
                    .get("error_reason")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            }
        } else {
            Self::Success
        }
    }
}

impl ExampleCertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ExampleCertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExampleCertificateStatus {
    type Err = CoursehubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "started" => Ok(Self::Started),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(CoursehubError::validation(format!(
                "unknown example certificate status '{other}'"
            ))),
        }
    }
}
