pub mod config;
pub mod course_key;
pub mod entities;
pub mod error;
pub mod grading;
pub mod models;
pub mod status;
pub mod validation;
pub mod xqueue;

// ============ 重新导出常用类型 ============

// 错误处理
pub use error::{CoursehubError, Result as CoursehubResult};

// 配置相关
pub use config::{AppConfig, ProfileVisibility};

// 课程标识
pub use course_key::CourseKey;

// 证书状态机
pub use status::{CallbackOutcome, CertificateAction, CertificateStatus, ExampleCertificateStatus};

// 验证相关
pub use validation::ValidationError;

// 兼容性别名（Result 是更常用的名称）
pub use error::Result;
