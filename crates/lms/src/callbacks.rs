//! XQueue 回调处理

use crate::error::AppError;
use crate::metrics;
use crate::rate_limit::client_key;
use crate::state::AppState;
use axum::Json;
use axum::extract::{ConnectInfo, Extension, Form, State};
use axum::http::HeaderMap;
use chrono::Utc;
use coursehub_common::entities::{example_certificates, generated_certificates, users};
use coursehub_common::xqueue::{CallbackForm, CallbackPayload, XQueueReply};
use coursehub_common::{CallbackOutcome, CertificateStatus, CoursehubError, ExampleCertificateStatus};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter,
    QuerySelect, RelationTrait, Set,
};
use serde_json::{Value as JsonValue, json};
use std::net::SocketAddr;

type ApiResult<T> = std::result::Result<T, AppError>;

/// 证书生成任务的回调
pub async fn update_certificate(
    State(state): State<AppState>,
    Form(form): Form<CallbackForm>,
) -> ApiResult<Json<XQueueReply>> {
    let payload = form.parse()?;

    let Some(cert) = lookup_certificate(&state.db, &payload).await? else {
        tracing::error!(
            xqueue_header = %payload.header,
            xqueue_body = %payload.body,
            "unable to lookup certificate"
        );
        return Ok(Json(XQueueReply::failure("unable to lookup key")));
    };

    let current = cert.status();
    let outcome = CallbackOutcome::from_body(&payload.body);
    let next = match current.apply_callback(&outcome) {
        Ok(next) => next,
        Err(_) => {
            tracing::error!(
                status = %current,
                course_id = %cert.course_key,
                "invalid state for certificate update"
            );
            return Ok(Json(XQueueReply::failure("invalid cert status")));
        }
    };

    let course_key = cert.course_key.clone();
    let mut active: generated_certificates::ActiveModel = cert.into();
    match &outcome {
        CallbackOutcome::Error { reason } => {
            if let Some(reason) = reason {
                active.error_reason = Set(reason.clone());
            }
        }
        CallbackOutcome::Success if next == CertificateStatus::Downloadable => {
            active.download_uuid = Set(payload.require_body_str("download_uuid")?.to_string());
            active.verify_uuid = Set(payload.require_body_str("verify_uuid")?.to_string());
            active.download_url = Set(payload.require_body_str("url")?.to_string());
        }
        CallbackOutcome::Success => {}
    }
    active.status = Set(next.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    active.update(&state.db).await?;

    metrics::inc_xqueue_update("update_certificate");
    tracing::info!(
        course_id = %course_key,
        from = %current,
        to = %next,
        "certificate updated from queue callback"
    );
    Ok(Json(XQueueReply::ok()))
}

async fn lookup_certificate(
    db: &DatabaseConnection,
    payload: &CallbackPayload,
) -> ApiResult<Option<generated_certificates::Model>> {
    let (Some(username), Some(course_id), Some(key)) = (
        payload.body_str("username"),
        payload.body_str("course_id"),
        payload.lms_key(),
    ) else {
        return Ok(None);
    };
    Ok(generated_certificates::Entity::find()
        .join(JoinType::InnerJoin, generated_certificates::Relation::User.def())
        .filter(users::Column::Username.eq(username))
        .filter(generated_certificates::Column::CourseKey.eq(course_id))
        .filter(generated_certificates::Column::Key.eq(key))
        .one(db)
        .await?)
}

/// 示例证书任务的回调
///
/// 查不到证书或参数错误都会计入客户端的错误请求次数，超过上限后返回 403。
pub async fn update_example_certificate(
    State(state): State<AppState>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
    Form(form): Form<CallbackForm>,
) -> ApiResult<Json<JsonValue>> {
    let peer = connect_info.map(|Extension(ConnectInfo(addr))| addr);
    let client = client_key(&headers, peer, &state.config.trusted_proxies);
    if state.callback_limiter.is_blocked(&client).await {
        tracing::warn!(client = %client, "example certificate callback rate limited");
        return Err(AppError::forbidden("rate limit exceeded"));
    }

    match handle_example_callback(&state.db, &form).await {
        Ok(cert) => {
            metrics::inc_xqueue_update("update_example_certificate");
            tracing::info!(
                uuid = %cert.uuid,
                status = %cert.status,
                "example certificate updated from queue callback"
            );
            Ok(Json(json!({"return_code": 0})))
        }
        Err(err) => {
            if err.is_client_error() {
                state.callback_limiter.record(&client).await;
            }
            Err(err.into())
        }
    }
}

async fn handle_example_callback(
    db: &DatabaseConnection,
    form: &CallbackForm,
) -> Result<example_certificates::Model, CoursehubError> {
    let payload = form.parse()?;
    let uuid = payload.require_body_str("username")?;
    let access_key = payload
        .lms_key()
        .ok_or_else(|| CoursehubError::malformed_callback("xqueue_header missing 'lms_key'"))?;

    let cert = example_certificates::Entity::find()
        .filter(example_certificates::Column::Uuid.eq(uuid))
        .filter(example_certificates::Column::AccessKey.eq(access_key))
        .one(db)
        .await?
        .ok_or_else(|| {
            tracing::warn!(uuid = %uuid, "could not find example certificate");
            CoursehubError::not_found("example certificate")
        })?;

    let mut active: example_certificates::ActiveModel = cert.into();
    match CallbackOutcome::from_body(&payload.body) {
        CallbackOutcome::Error { reason } => {
            active.status = Set(ExampleCertificateStatus::Error.as_str().to_string());
            active.error_reason = Set(reason);
        }
        CallbackOutcome::Success => {
            let url = payload.require_body_str("url")?;
            active.status = Set(ExampleCertificateStatus::Success.as_str().to_string());
            active.download_url = Set(Some(url.to_string()));
        }
    }
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(db).await?)
}
