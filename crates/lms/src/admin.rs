//! 证书管理接口：管理员或持有 API key 的服务调用
//!
//! 路径中的课程标识需要对 `/` 做百分号编码，例如 `edX%2FDemoX%2FDemo`。

use crate::auth::Caller;
use crate::certificates::{
    certificate_status_for_student, example_certificates_status, generate_example_certificates,
    save_html_view_configuration, set_cert_generation_enabled, set_global_generation_enabled,
    set_whitelist,
};
use crate::error::AppError;
use crate::lookup::{require_course, require_user};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use coursehub_common::models::{
    CertificateCourseQuery, CertificateStatusInfo, ExampleCertificateInfo, GenerationToggle,
    HtmlViewConfigurationRequest, WhitelistRequest,
};
use coursehub_common::validation::validate_non_empty;
use coursehub_common::CoursehubError;
use serde_json::{Value as JsonValue, json};

type ApiResult<T> = std::result::Result<T, AppError>;

// ============ 生成开关 ============

pub async fn get_global_configuration(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<GenerationToggle>> {
    caller.require_staff_or_key()?;
    let enabled = state.settings.global_generation_enabled(&state.db).await?;
    Ok(Json(GenerationToggle { enabled }))
}

pub async fn set_global_configuration(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<GenerationToggle>,
) -> ApiResult<Json<GenerationToggle>> {
    caller.require_staff_or_key()?;
    set_global_generation_enabled(&state, payload.enabled, caller.username()).await?;
    Ok(Json(payload))
}

pub async fn get_course_generation(
    State(state): State<AppState>,
    caller: Caller,
    Path(course_id): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    caller.require_staff_or_key()?;
    let course = require_course(&state.db, &course_id).await?;
    let enabled = state
        .settings
        .course_generation_enabled(&state.db, &course.course_key)
        .await?;
    Ok(Json(json!({"course_id": course.course_key, "enabled": enabled})))
}

pub async fn set_course_generation(
    State(state): State<AppState>,
    caller: Caller,
    Path(course_id): Path<String>,
    Json(payload): Json<GenerationToggle>,
) -> ApiResult<Json<JsonValue>> {
    caller.require_staff_or_key()?;
    let course = require_course(&state.db, &course_id).await?;
    set_cert_generation_enabled(&state, &course.course_key, payload.enabled).await?;
    Ok(Json(json!({"course_id": course.course_key, "enabled": payload.enabled})))
}

// ============ 示例证书 ============

pub async fn get_example_certificates(
    State(state): State<AppState>,
    caller: Caller,
    Path(course_id): Path<String>,
) -> ApiResult<Json<Vec<ExampleCertificateInfo>>> {
    caller.require_staff_or_key()?;
    let course = require_course(&state.db, &course_id).await?;
    Ok(Json(example_certificates_status(&state.db, &course.course_key).await?))
}

pub async fn start_example_certificates(
    State(state): State<AppState>,
    caller: Caller,
    Path(course_id): Path<String>,
) -> ApiResult<Json<Vec<ExampleCertificateInfo>>> {
    caller.require_staff_or_key()?;
    let course = require_course(&state.db, &course_id).await?;
    Ok(Json(generate_example_certificates(&state, &course).await?))
}

// ============ 单个学员证书 ============

pub async fn regenerate_certificate(
    State(state): State<AppState>,
    caller: Caller,
    Path((course_id, username)): Path<(String, String)>,
) -> ApiResult<Json<JsonValue>> {
    caller.require_staff_or_key()?;
    let course = require_course(&state.db, &course_id).await?;
    let student = require_user(&state.db, &username).await?;
    let status = state.generator().regen_cert(&student, &course, None, None).await?;
    tracing::info!(
        username = %student.username,
        course_id = %course.course_key,
        requested_by = ?caller.username(),
        "certificate regeneration requested"
    );
    Ok(Json(json!({"status": status})))
}

pub async fn delete_certificate(
    State(state): State<AppState>,
    caller: Caller,
    Path((course_id, username)): Path<(String, String)>,
) -> ApiResult<Json<JsonValue>> {
    caller.require_staff_or_key()?;
    let course = require_course(&state.db, &course_id).await?;
    let student = require_user(&state.db, &username).await?;
    let status = state.generator().del_cert(&student, &course).await?;
    tracing::info!(
        username = %student.username,
        course_id = %course.course_key,
        requested_by = ?caller.username(),
        "certificate deletion requested"
    );
    Ok(Json(json!({"status": status})))
}

pub async fn update_whitelist(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<WhitelistRequest>,
) -> ApiResult<Json<JsonValue>> {
    caller.require_staff_or_key()?;
    let username = validate_non_empty("username", &payload.username).map_err(CoursehubError::from)?;
    let course_id =
        validate_non_empty("course_id", &payload.course_id).map_err(CoursehubError::from)?;
    let course = require_course(&state.db, course_id).await?;
    let student = require_user(&state.db, username).await?;
    let row = set_whitelist(&state.db, &student, &course.course_key, payload.whitelist).await?;
    Ok(Json(json!({
        "username": student.username,
        "course_id": row.course_key,
        "whitelist": row.whitelist,
    })))
}

pub async fn update_html_view_configuration(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<HtmlViewConfigurationRequest>,
) -> ApiResult<Json<JsonValue>> {
    caller.require_staff_or_key()?;
    let configuration = save_html_view_configuration(
        &state,
        payload.enabled,
        &payload.configuration,
        caller.username(),
    )
    .await?;
    Ok(Json(json!({"enabled": payload.enabled, "configuration": configuration})))
}

/// `GET /api/certificates/v1/status?course_id=`，查询当前用户
pub async fn certificate_status(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<CertificateCourseQuery>,
) -> ApiResult<Json<CertificateStatusInfo>> {
    let user = caller.require_user()?;
    let course_id = query.course_id.unwrap_or_default();
    let course_id =
        validate_non_empty("course_id", &course_id).map_err(CoursehubError::from)?;
    let course = require_course(&state.db, course_id).await?;
    Ok(Json(
        certificate_status_for_student(&state.db, user.id, &course.course_key).await?,
    ))
}
