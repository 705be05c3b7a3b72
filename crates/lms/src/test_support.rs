//! 测试辅助：内存 SQLite、记录型队列与数据构造函数

use crate::queue::CertificateQueue;
use crate::state::AppState;
use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use coursehub_common::entities::{
    certificate_generation_configurations, certificate_generation_course_settings,
    course_enrollments, course_grades, course_modes, courses, generated_certificates, users,
};
use coursehub_common::xqueue::XQueueHeader;
use coursehub_common::{AppConfig, CertificateStatus, CourseKey, CoursehubError, Result};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    coursehub_migration::Migrator::up(&db, None).await.unwrap();
    db
}

#[derive(Default)]
pub struct RecordingQueue {
    sent: Mutex<Vec<(XQueueHeader, JsonValue)>>,
    failure: Option<String>,
}

impl RecordingQueue {
    pub fn failing(message: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<(XQueueHeader, JsonValue)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl CertificateQueue for RecordingQueue {
    async fn send_to_queue(&self, header: &XQueueHeader, body: &JsonValue) -> Result<()> {
        if let Some(message) = &self.failure {
            return Err(CoursehubError::queue(message.clone()));
        }
        self.sent.lock().unwrap().push((header.clone(), body.clone()));
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_database("sqlite::memory:");
    config.api_key = Some("test-api-key".to_string());
    config
}

pub async fn test_state() -> (AppState, Arc<RecordingQueue>) {
    test_state_with(test_config(), RecordingQueue::default()).await
}

pub async fn test_state_with(
    config: AppConfig,
    queue: RecordingQueue,
) -> (AppState, Arc<RecordingQueue>) {
    let db = setup_db().await;
    let queue = Arc::new(queue);
    let state = AppState::new(db, config, queue.clone());
    (state, queue)
}

pub async fn seed_user(db: &DatabaseConnection, username: &str) -> users::Model {
    insert_user(db, username, false).await
}

pub async fn seed_staff(db: &DatabaseConnection, username: &str) -> users::Model {
    insert_user(db, username, true).await
}

async fn insert_user(db: &DatabaseConnection, username: &str, is_staff: bool) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        name: Set(format!("{username} Learner")),
        is_active: Set(true),
        is_staff: Set(is_staff),
        is_verified: Set(false),
        allow_certificate: Set(true),
        gender: Set(None),
        year_of_birth: Set(None),
        level_of_education: Set(None),
        goals: Set(None),
        country: Set(None),
        language: Set(None),
        time_zone: Set(None),
        languages: Set(json!([])),
        bio: Set(None),
        profile_image: Set(None),
        mailing_address: Set(None),
        date_joined: Set(now.into()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_course(db: &DatabaseConnection, course_key: &str) -> courses::Model {
    let key = CourseKey::parse(course_key).unwrap();
    let now = Utc::now();
    courses::ActiveModel {
        id: Set(Uuid::new_v4()),
        course_key: Set(course_key.to_string()),
        org: Set(key.org.clone()),
        number: Set(key.course.clone()),
        run: Set(key.run.clone()),
        display_name: Set("Demonstration Course".to_string()),
        enrollment_start: Set(None),
        enrollment_end: Set(None),
        invite_only: Set(false),
        grade_cutoffs: Set(json!({"Pass": 0.5})),
        cert_html_view_overrides: Set(json!({})),
        cohort_config: Set(json!({})),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_mode(db: &DatabaseConnection, course_key: &str, slug: &str) -> course_modes::Model {
    let now = Utc::now();
    course_modes::ActiveModel {
        id: Set(Uuid::new_v4()),
        course_key: Set(course_key.to_string()),
        mode_slug: Set(slug.to_string()),
        mode_display_name: Set(slug.to_string()),
        min_price: Set(0),
        suggested_prices: Set(String::new()),
        currency: Set("usd".to_string()),
        expiration_datetime: Set(None),
        description: Set(None),
        sku: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_enrollment(
    db: &DatabaseConnection,
    user: &users::Model,
    course: &courses::Model,
    mode: &str,
) -> course_enrollments::Model {
    let now = Utc::now();
    course_enrollments::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        course_key: Set(course.course_key.clone()),
        mode: Set(mode.to_string()),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_grade(
    db: &DatabaseConnection,
    user: &users::Model,
    course: &courses::Model,
    percent: f64,
) -> course_grades::Model {
    let now = Utc::now();
    course_grades::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        course_key: Set(course.course_key.clone()),
        percent: Set(percent),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_certificate(
    db: &DatabaseConnection,
    user: &users::Model,
    course: &courses::Model,
    status: CertificateStatus,
) -> generated_certificates::Model {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let downloadable = status == CertificateStatus::Downloadable;
    generated_certificates::ActiveModel {
        id: Set(id),
        user_id: Set(user.id),
        course_key: Set(course.course_key.clone()),
        status: Set(status.as_str().to_string()),
        mode: Set("honor".to_string()),
        grade: Set("0.8".to_string()),
        key: Set(Uuid::new_v4().simple().to_string()),
        download_url: Set(if downloadable {
            format!("https://certs.example.com/{}.pdf", id.simple())
        } else {
            String::new()
        }),
        download_uuid: Set(if downloadable { id.simple().to_string() } else { String::new() }),
        verify_uuid: Set(if downloadable { "verify-uuid-1".to_string() } else { String::new() }),
        name: Set(user.name.clone()),
        distinction: Set(false),
        error_reason: Set(String::new()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap()
}

/// 打开全局与课程级证书生成开关
pub async fn enable_generation(db: &DatabaseConnection, course_key: &str) {
    let now = Utc::now();
    certificate_generation_configurations::ActiveModel {
        id: Set(Uuid::new_v4()),
        enabled: Set(true),
        changed_by: Set(None),
        created_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();
    certificate_generation_course_settings::ActiveModel {
        id: Set(Uuid::new_v4()),
        course_key: Set(course_key.to_string()),
        enabled: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .unwrap();
}

/// 发送请求并把响应体解析为 JSON（空响应体解析为 Null）
pub async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, JsonValue) {
    let (status, text) = send_text(app, request).await;
    let json = if text.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, json)
}

pub async fn send_text(app: axum::Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

pub fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header(crate::auth::REMOTE_USER_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, user: Option<&str>, body: JsonValue) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header(crate::auth::REMOTE_USER_HEADER, user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn post_form(uri: &str, user: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let encoded = fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(user) = user {
        builder = builder.header(crate::auth::REMOTE_USER_HEADER, user);
    }
    builder.body(Body::from(encoded)).unwrap()
}

fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// 带 API key 的请求
pub fn with_api_key(mut request: Request<Body>) -> Request<Body> {
    request.headers_mut().insert(
        crate::auth::API_KEY_HEADER,
        axum::http::HeaderValue::from_static("test-api-key"),
    );
    request
}
