//! 证书生成任务
//!
//! `CertificateGenerator` 负责证书行的状态迁移并把任务提交给队列。
//! 队列提交失败不会回滚状态：证书保持等待状态，运维可以重新提交。

use crate::metrics;
use async_trait::async_trait;
use chrono::Utc;
use coursehub_common::entities::{
    certificate_whitelist, course_enrollments, course_grades, courses, example_certificates,
    generated_certificates, users,
};
use coursehub_common::grading::{cutoffs_from_json, is_passing, letter_grade};
use coursehub_common::xqueue::{XQueueHeader, make_callback_url};
use coursehub_common::{
    AppConfig, CertificateAction, CertificateStatus, CoursehubError, ExampleCertificateStatus,
    Result,
};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

pub const MODE_HONOR: &str = "honor";
pub const MODE_VERIFIED: &str = "verified";

/// 证书任务队列
#[async_trait]
pub trait CertificateQueue: Send + Sync {
    async fn send_to_queue(&self, header: &XQueueHeader, body: &JsonValue) -> Result<()>;
}

/// 生成队列任务密钥（32 位十六进制）
pub fn new_task_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 证书模板文件名
pub fn template_name(org: &str, course: &str, verified: bool) -> String {
    if verified {
        format!("certificate-template-{org}-{course}-verified.pdf")
    } else {
        format!("certificate-template-{org}-{course}.pdf")
    }
}

/// 根据选课模式与用户验证状态决定证书模式和模板
fn resolve_mode(
    enrollment_mode: &str,
    student: &users::Model,
    course: &courses::Model,
) -> (String, String) {
    if enrollment_mode == MODE_VERIFIED {
        if student.is_verified {
            return (
                MODE_VERIFIED.to_string(),
                template_name(&course.org, &course.number, true),
            );
        }
        return (
            MODE_HONOR.to_string(),
            template_name(&course.org, &course.number, false),
        );
    }
    (
        enrollment_mode.to_string(),
        template_name(&course.org, &course.number, false),
    )
}

pub struct CertificateGenerator<'a> {
    db: &'a DatabaseConnection,
    config: &'a AppConfig,
    queue: &'a dyn CertificateQueue,
}

impl<'a> CertificateGenerator<'a> {
    pub fn new(
        db: &'a DatabaseConnection,
        config: &'a AppConfig,
        queue: &'a dyn CertificateQueue,
    ) -> Self {
        Self { db, config, queue }
    }

    /// 为学员申请证书，返回证书的新状态
    ///
    /// 当前状态不允许申请时直接返回当前状态。
    pub async fn add_cert(
        &self,
        student: &users::Model,
        course: &courses::Model,
        forced_grade: Option<&str>,
        template_file: Option<&str>,
    ) -> Result<CertificateStatus> {
        let existing = find_certificate(self.db, student.id, &course.course_key).await?;
        let current = existing
            .as_ref()
            .map(generated_certificates::Model::status)
            .unwrap_or(CertificateStatus::Unavailable);
        if !current.allows(CertificateAction::Add) {
            tracing::info!(
                username = %student.username,
                course_id = %course.course_key,
                status = %current,
                "certificate request ignored in current status"
            );
            return Ok(current);
        }

        let percent = course_percent(self.db, student.id, &course.course_key).await?;
        let cutoffs = cutoffs_from_json(&course.grade_cutoffs);
        let letter = percent.and_then(|p| letter_grade(&cutoffs, p));
        let passing = is_passing(&cutoffs, percent);
        let enrollment_mode = enrollment_mode(self.db, student.id, &course.course_key).await?;
        let (mode, template) = resolve_mode(&enrollment_mode, student, course);
        let whitelisted = is_whitelisted(self.db, student.id, &course.course_key).await?;

        let is_new = existing.is_none();
        let mut active = match existing {
            Some(cert) => cert.into(),
            None => new_certificate(student.id, &course.course_key),
        };
        active.mode = Set(mode);
        active.grade = Set(percent.map(|p| p.to_string()).unwrap_or_default());
        active.name = Set(student.name.clone());

        let mut submission = None;
        let status = if whitelisted || passing {
            if !student.allow_certificate {
                CertificateStatus::Restricted
            } else {
                let key = new_task_key();
                active.key = Set(key.clone());
                let body = json!({
                    "action": CertificateAction::Add.queue_action(),
                    "username": student.username,
                    "course_id": course.course_key,
                    "course_name": course.display_name,
                    "name": student.name,
                    "grade": forced_grade.map(str::to_string).or(letter).unwrap_or_default(),
                    "template_pdf": template_file.unwrap_or(&template),
                });
                submission = Some((key, body));
                CertificateStatus::Generating
            }
        } else {
            CertificateStatus::Notpassing
        };
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now().into());
        if is_new {
            if !insert_if_absent(self.db, active).await? {
                // 并发请求已先插入同一行
                let current = find_certificate(self.db, student.id, &course.course_key)
                    .await?
                    .map(|cert| cert.status())
                    .unwrap_or(CertificateStatus::Unavailable);
                tracing::info!(
                    username = %student.username,
                    course_id = %course.course_key,
                    status = %current,
                    "certificate already requested concurrently"
                );
                return Ok(current);
            }
        } else {
            active.update(self.db).await?;
        }

        tracing::info!(
            username = %student.username,
            course_id = %course.course_key,
            status = %status,
            "certificate requested"
        );
        if let Some((key, body)) = submission {
            self.submit(CertificateAction::Add, &key, &body).await;
        }
        Ok(status)
    }

    /// 重新生成已完成或失败的证书
    pub async fn regen_cert(
        &self,
        student: &users::Model,
        course: &courses::Model,
        forced_grade: Option<&str>,
        template_file: Option<&str>,
    ) -> Result<CertificateStatus> {
        let cert = find_certificate(self.db, student.id, &course.course_key)
            .await?
            .ok_or_else(|| CoursehubError::not_found("certificate"))?;
        let status = cert.status().begin(CertificateAction::Regenerate)?;

        let percent = course_percent(self.db, student.id, &course.course_key).await?;
        let cutoffs = cutoffs_from_json(&course.grade_cutoffs);
        let letter = percent.and_then(|p| letter_grade(&cutoffs, p));
        let enrollment_mode = enrollment_mode(self.db, student.id, &course.course_key).await?;
        let (mode, template) = resolve_mode(&enrollment_mode, student, course);

        let key = new_task_key();
        let body = json!({
            "action": CertificateAction::Regenerate.queue_action(),
            "delete_verify_uuid": cert.verify_uuid,
            "delete_download_uuid": cert.download_uuid,
            "username": student.username,
            "course_id": course.course_key,
            "course_name": course.display_name,
            "name": student.name,
            "grade": forced_grade.map(str::to_string).or(letter).unwrap_or_default(),
            "template_pdf": template_file.unwrap_or(&template),
        });

        let mut active: generated_certificates::ActiveModel = cert.into();
        active.status = Set(status.as_str().to_string());
        active.key = Set(key.clone());
        active.mode = Set(mode);
        active.name = Set(student.name.clone());
        active.grade = Set(percent.map(|p| p.to_string()).unwrap_or_default());
        active.updated_at = Set(Utc::now().into());
        active.update(self.db).await?;

        self.submit(CertificateAction::Regenerate, &key, &body).await;
        Ok(status)
    }

    /// 删除已发放的证书
    pub async fn del_cert(
        &self,
        student: &users::Model,
        course: &courses::Model,
    ) -> Result<CertificateStatus> {
        let cert = find_certificate(self.db, student.id, &course.course_key)
            .await?
            .ok_or_else(|| CoursehubError::not_found("certificate"))?;
        let status = cert.status().begin(CertificateAction::Delete)?;

        let key = cert.key.clone();
        let body = json!({
            "action": CertificateAction::Delete.queue_action(),
            "delete_verify_uuid": cert.verify_uuid,
            "delete_download_uuid": cert.download_uuid,
            "username": student.username,
            "course_id": course.course_key,
        });

        let mut active: generated_certificates::ActiveModel = cert.into();
        active.status = Set(status.as_str().to_string());
        active.updated_at = Set(Utc::now().into());
        active.update(self.db).await?;

        self.submit(CertificateAction::Delete, &key, &body).await;
        Ok(status)
    }

    /// 提交示例证书；失败时写入 error 状态而不返回错误
    pub async fn add_example_cert(
        &self,
        course_key: &str,
        cert: example_certificates::Model,
    ) -> Result<example_certificates::Model> {
        let header = XQueueHeader {
            lms_callback_url: make_callback_url(
                true,
                &self.config.site_name,
                "update_example_certificate",
                Some(&cert.uuid),
            ),
            lms_key: cert.access_key.clone(),
            queue_name: self.config.cert_queue.clone(),
        };
        let body = json!({
            "action": CertificateAction::Add.queue_action(),
            "course_id": course_key,
            "name": cert.full_name,
            "template_pdf": cert.template,
            "username": cert.uuid,
            "example_certificate": true,
        });

        let outcome = self.queue.send_to_queue(&header, &body).await;
        metrics::inc_xqueue_submission("example", outcome.is_ok());
        match outcome {
            Ok(()) => {
                tracing::info!(
                    course_id = %course_key,
                    uuid = %cert.uuid,
                    "started generating example certificate"
                );
                Ok(cert)
            }
            Err(err) => {
                tracing::error!(
                    course_id = %course_key,
                    uuid = %cert.uuid,
                    error = %err,
                    "could not add example certificate to the queue"
                );
                let mut active: example_certificates::ActiveModel = cert.into();
                active.status = Set(ExampleCertificateStatus::Error.as_str().to_string());
                active.error_reason = Set(Some(err.to_string()));
                active.updated_at = Set(Utc::now().into());
                Ok(active.update(self.db).await?)
            }
        }
    }

    async fn submit(&self, action: CertificateAction, key: &str, body: &JsonValue) {
        let header = XQueueHeader {
            lms_callback_url: make_callback_url(
                self.config.use_https_callbacks,
                &self.config.site_name,
                "update_certificate",
                Some(key),
            ),
            lms_key: key.to_string(),
            queue_name: self.config.cert_queue.clone(),
        };
        let outcome = self.queue.send_to_queue(&header, body).await;
        metrics::inc_xqueue_submission(action.queue_action(), outcome.is_ok());
        if let Err(err) = outcome {
            tracing::warn!(
                action = %action,
                key = %key,
                error = %err,
                "unable to add a request to the queue"
            );
        }
    }
}

pub async fn find_certificate(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_key: &str,
) -> Result<Option<generated_certificates::Model>> {
    Ok(generated_certificates::Entity::find()
        .filter(generated_certificates::Column::UserId.eq(user_id))
        .filter(generated_certificates::Column::CourseKey.eq(course_key))
        .one(db)
        .await?)
}

/// 按 (user_id, course_key) 唯一索引插入；行已存在时返回 false
async fn insert_if_absent(
    db: &DatabaseConnection,
    active: generated_certificates::ActiveModel,
) -> Result<bool> {
    let inserted = generated_certificates::Entity::insert(active)
        .on_conflict(
            OnConflict::columns([
                generated_certificates::Column::UserId,
                generated_certificates::Column::CourseKey,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(inserted > 0)
}

pub async fn course_percent(
    db: &DatabaseConnection,
    user_id: Uuid,
    course_key: &str,
) -> Result<Option<f64>> {
    Ok(course_grades::Entity::find()
        .filter(course_grades::Column::UserId.eq(user_id))
        .filter(course_grades::Column::CourseKey.eq(course_key))
        .one(db)
        .await?
        .map(|grade| grade.percent))
}

async fn enrollment_mode(db: &DatabaseConnection, user_id: Uuid, course_key: &str) -> Result<String> {
    Ok(course_enrollments::Entity::find()
        .filter(course_enrollments::Column::UserId.eq(user_id))
        .filter(course_enrollments::Column::CourseKey.eq(course_key))
        .one(db)
        .await?
        .map(|enrollment| enrollment.mode)
        .unwrap_or_else(|| MODE_HONOR.to_string()))
}

async fn is_whitelisted(db: &DatabaseConnection, user_id: Uuid, course_key: &str) -> Result<bool> {
    Ok(certificate_whitelist::Entity::find()
        .filter(certificate_whitelist::Column::UserId.eq(user_id))
        .filter(certificate_whitelist::Column::CourseKey.eq(course_key))
        .filter(certificate_whitelist::Column::Whitelist.eq(true))
        .one(db)
        .await?
        .is_some())
}

fn new_certificate(user_id: Uuid, course_key: &str) -> generated_certificates::ActiveModel {
    let now = Utc::now();
    generated_certificates::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        course_key: Set(course_key.to_string()),
        status: Set(CertificateStatus::Unavailable.as_str().to_string()),
        mode: Set(MODE_HONOR.to_string()),
        grade: Set(String::new()),
        key: Set(String::new()),
        download_url: Set(String::new()),
        download_uuid: Set(String::new()),
        verify_uuid: Set(String::new()),
        name: Set(String::new()),
        distinction: Set(false),
        error_reason: Set(String::new()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
}
