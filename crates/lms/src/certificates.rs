//! 证书服务接口
//!
//! 学员状态查询、生成开关、示例证书自检与白名单。

use crate::queue::{MODE_HONOR, find_certificate, template_name};
use crate::state::AppState;
use crate::txn_with;
use chrono::Utc;
use coursehub_common::entities::{
    certificate_generation_configurations, certificate_generation_course_settings,
    certificate_html_view_configurations, certificate_whitelist, course_modes, courses,
    example_certificate_sets, example_certificates, users,
};
use coursehub_common::models::{CertificateStatusInfo, DownloadableStatus, ExampleCertificateInfo};
use coursehub_common::validation::validate_html_view_configuration;
use coursehub_common::{CertificateStatus, CoursehubError, ExampleCertificateStatus, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const EXAMPLE_FULL_NAME: &str = "John Doë";

pub async fn certificate_status_for_student(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_key: &str,
) -> Result<CertificateStatusInfo> {
    let Some(cert) = find_certificate(db, user_id, course_key).await? else {
        return Ok(CertificateStatusInfo {
            status: CertificateStatus::Unavailable,
            mode: MODE_HONOR.to_string(),
            grade: None,
            download_url: None,
        });
    };
    let status = cert.status();
    Ok(CertificateStatusInfo {
        status,
        mode: cert.mode,
        grade: Some(cert.grade).filter(|grade| !grade.is_empty()),
        download_url: (status == CertificateStatus::Downloadable).then_some(cert.download_url),
    })
}

pub async fn certificate_downloadable_status(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_key: &str,
) -> Result<DownloadableStatus> {
    let info = certificate_status_for_student(db, user_id, course_key).await?;
    Ok(DownloadableStatus {
        is_downloadable: info.status == CertificateStatus::Downloadable,
        is_generating: info.status.is_generating_for_display(),
        download_url: info.download_url,
    })
}

pub async fn generate_user_certificates(
    state: &AppState,
    student: &users::Model,
    course: &courses::Model,
) -> Result<CertificateStatus> {
    state.generator().add_cert(student, course, None, None).await
}

// ============ 生成开关 ============

/// 全局开关与课程开关同时打开时学员才能自助生成证书
pub async fn cert_generation_enabled(state: &AppState, course_key: &str) -> Result<bool> {
    Ok(state.settings.global_generation_enabled(&state.db).await?
        && state
            .settings
            .course_generation_enabled(&state.db, course_key)
            .await?)
}

pub async fn set_cert_generation_enabled(
    state: &AppState,
    course_key: &str,
    enabled: bool,
) -> Result<()> {
    let now = Utc::now();
    certificate_generation_course_settings::ActiveModel {
        id: Set(Uuid::new_v4()),
        course_key: Set(course_key.to_string()),
        enabled: Set(enabled),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.db)
    .await?;
    state.settings.invalidate_course(course_key).await;

    if enabled {
        tracing::info!(course_id = %course_key, "enabled self-generated certificates");
    } else {
        tracing::info!(course_id = %course_key, "disabled self-generated certificates");
    }
    Ok(())
}

pub async fn set_global_generation_enabled(
    state: &AppState,
    enabled: bool,
    changed_by: Option<&str>,
) -> Result<()> {
    certificate_generation_configurations::ActiveModel {
        id: Set(Uuid::new_v4()),
        enabled: Set(enabled),
        changed_by: Set(changed_by.map(str::to_string)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.db)
    .await?;
    state.settings.invalidate_global().await;
    tracing::info!(enabled, changed_by = ?changed_by, "certificate generation configuration changed");
    Ok(())
}

// ============ 示例证书 ============

/// 为课程的每个模式创建一张示例证书并提交到队列
pub async fn generate_example_certificates(
    state: &AppState,
    course: &courses::Model,
) -> Result<Vec<ExampleCertificateInfo>> {
    let mut modes: Vec<String> = course_modes::Entity::find()
        .filter(course_modes::Column::CourseKey.eq(&course.course_key))
        .order_by_asc(course_modes::Column::ModeSlug)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|mode| mode.mode_slug)
        .collect();
    if modes.is_empty() {
        modes.push(MODE_HONOR.to_string());
    }

    let certs = txn_with!(&state.db, |txn, course, modes| {
        let now = Utc::now();
        let set = example_certificate_sets::ActiveModel {
            id: Set(Uuid::new_v4()),
            course_key: Set(course.course_key.clone()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(txn)
        .await?;

        let mut certs = Vec::with_capacity(modes.len());
        for mode in modes.iter() {
            let verified = mode == "verified";
            let cert = example_certificates::ActiveModel {
                id: Set(Uuid::new_v4()),
                example_cert_set_id: Set(set.id),
                description: Set(mode.clone()),
                uuid: Set(Uuid::new_v4().simple().to_string()),
                access_key: Set(Uuid::new_v4().simple().to_string()),
                full_name: Set(EXAMPLE_FULL_NAME.to_string()),
                template: Set(template_name(&course.org, &course.number, verified)),
                status: Set(ExampleCertificateStatus::Started.as_str().to_string()),
                error_reason: Set(None),
                download_url: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(txn)
            .await?;
            certs.push(cert);
        }
        Ok::<_, CoursehubError>(certs)
    }, course, &modes)?;

    let generator = state.generator();
    for cert in certs {
        generator.add_example_cert(&course.course_key, cert).await?;
    }
    tracing::info!(course_id = %course.course_key, "started generating example certificates");

    example_certificates_status(&state.db, &course.course_key).await
}

/// 最近一次示例证书任务的状态；没有任务时为空列表
pub async fn example_certificates_status(
    db: &DatabaseConnection,
    course_key: &str,
) -> Result<Vec<ExampleCertificateInfo>> {
    let Some(set) = example_certificate_sets::Entity::find()
        .filter(example_certificate_sets::Column::CourseKey.eq(course_key))
        .order_by_desc(example_certificate_sets::Column::CreatedAt)
        .one(db)
        .await?
    else {
        return Ok(Vec::new());
    };

    let certs = example_certificates::Entity::find()
        .filter(example_certificates::Column::ExampleCertSetId.eq(set.id))
        .order_by_asc(example_certificates::Column::CreatedAt)
        .order_by_asc(example_certificates::Column::Description)
        .all(db)
        .await?;
    Ok(certs.into_iter().map(example_info).collect())
}

fn example_info(cert: example_certificates::Model) -> ExampleCertificateInfo {
    let status = cert.status();
    ExampleCertificateInfo {
        description: cert.description,
        status,
        download_url: cert
            .download_url
            .filter(|_| status == ExampleCertificateStatus::Success),
        error_reason: cert
            .error_reason
            .filter(|_| status == ExampleCertificateStatus::Error),
    }
}

// ============ 白名单与 HTML 视图配置 ============

pub async fn set_whitelist(
    db: &DatabaseConnection,
    user: &users::Model,
    course_key: &str,
    whitelist: bool,
) -> Result<certificate_whitelist::Model> {
    let existing = certificate_whitelist::Entity::find()
        .filter(certificate_whitelist::Column::UserId.eq(user.id))
        .filter(certificate_whitelist::Column::CourseKey.eq(course_key))
        .one(db)
        .await?;
    let now = Utc::now();
    let row = match existing {
        Some(row) => {
            let mut active: certificate_whitelist::ActiveModel = row.into();
            active.whitelist = Set(whitelist);
            active.updated_at = Set(now.into());
            active.update(db).await?
        }
        None => {
            certificate_whitelist::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.id),
                course_key: Set(course_key.to_string()),
                whitelist: Set(whitelist),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(db)
            .await?
        }
    };
    tracing::info!(username = %user.username, course_id = %course_key, whitelist, "certificate whitelist updated");
    Ok(row)
}

/// 保存 HTML 视图配置，非法 JSON 返回校验错误
pub async fn save_html_view_configuration(
    state: &AppState,
    enabled: bool,
    raw: &str,
    changed_by: Option<&str>,
) -> Result<JsonValue> {
    let parsed = validate_html_view_configuration(raw)?;
    certificate_html_view_configurations::ActiveModel {
        id: Set(Uuid::new_v4()),
        enabled: Set(enabled),
        configuration: Set(raw.to_string()),
        changed_by: Set(changed_by.map(str::to_string)),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.db)
    .await?;
    state.settings.invalidate_html_view().await;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        RecordingQueue, seed_certificate, seed_course, seed_mode, seed_user, test_config,
        test_state, test_state_with,
    };

    #[tokio::test]
    async fn status_without_certificate_is_unavailable_honor() {
        let (state, _) = test_state().await;
        let user = seed_user(&state.db, "alice").await;
        let info = certificate_status_for_student(&state.db, user.id, "edX/DemoX/Demo")
            .await
            .unwrap();
        assert_eq!(info.status, CertificateStatus::Unavailable);
        assert_eq!(info.mode, "honor");
        assert!(info.grade.is_none());
    }

    #[tokio::test]
    async fn downloadable_status_exposes_url() {
        let (state, _) = test_state().await;
        let user = seed_user(&state.db, "alice").await;
        let course = seed_course(&state.db, "edX/DemoX/Demo").await;
        let cert = seed_certificate(&state.db, &user, &course, CertificateStatus::Downloadable).await;

        let status = certificate_downloadable_status(&state.db, user.id, &course.course_key)
            .await
            .unwrap();
        assert!(status.is_downloadable);
        assert!(!status.is_generating);
        assert_eq!(status.download_url, Some(cert.download_url));

        let info = certificate_status_for_student(&state.db, user.id, &course.course_key)
            .await
            .unwrap();
        assert_eq!(info.grade.as_deref(), Some("0.8"));
    }

    #[tokio::test]
    async fn error_status_is_shown_as_generating() {
        let (state, _) = test_state().await;
        let user = seed_user(&state.db, "bob").await;
        let course = seed_course(&state.db, "edX/DemoX/Demo").await;
        seed_certificate(&state.db, &user, &course, CertificateStatus::Error).await;

        let status = certificate_downloadable_status(&state.db, user.id, &course.course_key)
            .await
            .unwrap();
        assert!(status.is_generating);
        assert!(!status.is_downloadable);
        assert_eq!(status.download_url, None);
    }

    #[tokio::test]
    async fn generation_requires_both_switches() {
        let (state, _) = test_state().await;
        let course_key = "edX/DemoX/Demo";
        assert!(!cert_generation_enabled(&state, course_key).await.unwrap());

        set_cert_generation_enabled(&state, course_key, true).await.unwrap();
        assert!(!cert_generation_enabled(&state, course_key).await.unwrap());

        set_global_generation_enabled(&state, true, Some("staff")).await.unwrap();
        assert!(cert_generation_enabled(&state, course_key).await.unwrap());

        set_cert_generation_enabled(&state, course_key, false).await.unwrap();
        assert!(!cert_generation_enabled(&state, course_key).await.unwrap());
    }

    #[tokio::test]
    async fn example_certificates_cover_each_mode() {
        let (state, queue) = test_state().await;
        let course = seed_course(&state.db, "edX/DemoX/Demo").await;
        seed_mode(&state.db, &course.course_key, "honor").await;
        seed_mode(&state.db, &course.course_key, "verified").await;

        assert!(example_certificates_status(&state.db, &course.course_key)
            .await
            .unwrap()
            .is_empty());

        let status = generate_example_certificates(&state, &course).await.unwrap();
        let mut descriptions: Vec<_> = status.iter().map(|s| s.description.clone()).collect();
        descriptions.sort();
        assert_eq!(descriptions, vec!["honor", "verified"]);
        assert!(status.iter().all(|s| s.status == ExampleCertificateStatus::Started));

        let sent = queue.sent();
        assert_eq!(sent.len(), 2);
        for (header, body) in &sent {
            let uuid = body["username"].as_str().unwrap();
            assert_eq!(
                header.lms_callback_url,
                format!("https://lms.example.com/update_example_certificate?key={uuid}")
            );
            assert_eq!(body["example_certificate"], true);
            assert_eq!(body["name"], EXAMPLE_FULL_NAME);
        }
        let verified_template = sent
            .iter()
            .find(|(_, body)| body["template_pdf"] == "certificate-template-edX-DemoX-verified.pdf");
        assert!(verified_template.is_some());
    }

    #[tokio::test]
    async fn course_without_modes_gets_honor_example() {
        let (state, _) = test_state().await;
        let course = seed_course(&state.db, "edX/DemoX/Demo").await;
        let status = generate_example_certificates(&state, &course).await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].description, "honor");
    }

    #[tokio::test]
    async fn queue_failure_marks_example_error() {
        let (state, _) = test_state_with(test_config(), RecordingQueue::failing("boom")).await;
        let course = seed_course(&state.db, "edX/DemoX/Demo").await;
        let status = generate_example_certificates(&state, &course).await.unwrap();
        assert_eq!(status[0].status, ExampleCertificateStatus::Error);
        assert_eq!(status[0].error_reason.as_deref(), Some("queue error: boom"));
        assert!(status[0].download_url.is_none());
    }

    #[tokio::test]
    async fn whitelist_upserts() {
        let (state, _) = test_state().await;
        let user = seed_user(&state.db, "carol").await;
        let first = set_whitelist(&state.db, &user, "edX/DemoX/Demo", true).await.unwrap();
        let second = set_whitelist(&state.db, &user, "edX/DemoX/Demo", false).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!second.whitelist);
    }

    #[tokio::test]
    async fn html_view_configuration_rejects_invalid_json() {
        let (state, _) = test_state().await;
        let err = save_html_view_configuration(&state, true, "{broken", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoursehubError::Validation(_)));

        save_html_view_configuration(&state, true, r#"{"default": {"company_name": "X"}}"#, None)
            .await
            .unwrap();
        let config = state.settings.html_view_configuration(&state.db).await.unwrap();
        assert_eq!(config["default"]["company_name"], "X");
    }
}
