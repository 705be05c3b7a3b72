use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::status::{CertificateStatus, ExampleCertificateStatus};

// ============ 选课 ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModeInfo {
    pub slug: String,
    pub name: String,
    pub min_price: i32,
    pub suggested_prices: String,
    pub currency: String,
    pub expiration_datetime: Option<DateTime<FixedOffset>>,
    pub description: Option<String>,
    pub sku: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseEnrollmentDetails {
    pub course_id: String,
    pub enrollment_start: Option<DateTime<FixedOffset>>,
    pub enrollment_end: Option<DateTime<FixedOffset>>,
    pub invite_only: bool,
    pub course_modes: Vec<CourseModeInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentInfo {
    pub created: DateTime<FixedOffset>,
    pub mode: String,
    pub is_active: bool,
    pub course_details: CourseEnrollmentDetails,
    pub user: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseRef {
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEnrollment {
    pub user: Option<String>,
    pub course_details: Option<CourseRef>,
    pub email_opt_in: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentListQuery {
    pub user: Option<String>,
}

// ============ 证书 ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateStatusInfo {
    pub status: CertificateStatus,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadableStatus {
    pub is_downloadable: bool,
    pub is_generating: bool,
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleCertificateInfo {
    pub description: String,
    pub status: ExampleCertificateStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestCertificateForm {
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationToggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistRequest {
    pub username: String,
    pub course_id: String,
    #[serde(default = "default_true")]
    pub whitelist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlViewConfigurationRequest {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// JSON 文本
    pub configuration: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertificateCourseQuery {
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HtmlViewQuery {
    pub course: Option<String>,
}

fn default_true() -> bool {
    true
}

// ============ 学习进度与成绩 ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub percent: f64,
    pub letter_grade: Option<String>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub course_id: String,
    pub username: String,
    pub grade_summary: GradeSummary,
    pub show_generate_cert_btn: bool,
    #[serde(flatten)]
    pub certificate: Option<DownloadableStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeUpdate {
    pub percent: f64,
}

// ============ 分组 ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortInfo {
    pub id: Uuid,
    pub name: String,
    pub user_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortConfig {
    #[serde(default)]
    pub cohorted: bool,
    #[serde(default)]
    pub auto_cohort_groups: Vec<String>,
}

impl CohortConfig {
    pub fn from_json(value: &JsonValue) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

// ============ 通用 ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn certificate_status_omits_missing_fields() {
        let info = CertificateStatusInfo {
            status: CertificateStatus::Unavailable,
            mode: "honor".to_string(),
            grade: None,
            download_url: None,
        };
        assert_eq!(
            serde_json::to_value(info).unwrap(),
            json!({"status": "unavailable", "mode": "honor"})
        );
    }

    #[test]
    fn cohort_config_tolerates_partial_json() {
        let config = CohortConfig::from_json(&json!({"cohorted": true}));
        assert!(config.cohorted);
        assert!(config.auto_cohort_groups.is_empty());

        let config = CohortConfig::from_json(&json!("garbage"));
        assert_eq!(config, CohortConfig::default());
    }

    #[test]
    fn progress_flattens_certificate_fields() {
        let progress = ProgressResponse {
            course_id: "edX/DemoX/Demo".to_string(),
            username: "bob".to_string(),
            grade_summary: GradeSummary {
                percent: 0.8,
                letter_grade: Some("Pass".to_string()),
                passed: true,
            },
            show_generate_cert_btn: true,
            certificate: Some(DownloadableStatus {
                is_downloadable: false,
                is_generating: true,
                download_url: None,
            }),
        };
        let value = serde_json::to_value(progress).unwrap();
        assert_eq!(value["is_generating"], json!(true));
        assert_eq!(value["grade_summary"]["letter_grade"], json!("Pass"));
    }
}
