//! 学习进度与学员自助申请证书

use crate::auth::Caller;
use crate::certificates::{
    cert_generation_enabled, certificate_downloadable_status, certificate_status_for_student,
    generate_user_certificates,
};
use crate::error::AppError;
use crate::lookup::find_course;
use crate::queue::course_percent;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Form, State};
use coursehub_common::grading::{cutoffs_from_json, is_passing, letter_grade};
use coursehub_common::models::{GradeSummary, MessageResponse, ProgressResponse, RequestCertificateForm};
use coursehub_common::{CertificateStatus, CourseKey};
use serde_json::{Value as JsonValue, json};

type ApiResult<T> = std::result::Result<T, AppError>;

const CREATING_CERTIFICATE: &str = "Creating certificate";

/// `GET /courses/{course_id}/progress`
pub async fn progress(
    state: &AppState,
    caller: &Caller,
    course_id: &str,
) -> ApiResult<Json<ProgressResponse>> {
    let student = caller.require_user()?;
    let course_key = CourseKey::parse(course_id)
        .map_err(|_| AppError::not_found(format!("course '{course_id}' not found")))?;
    let course = find_course(&state.db, &course_key.to_string())
        .await?
        .ok_or_else(|| AppError::not_found(format!("course '{course_id}' not found")))?;

    let percent = course_percent(&state.db, student.id, &course.course_key).await?;
    let cutoffs = cutoffs_from_json(&course.grade_cutoffs);
    let grade_summary = GradeSummary {
        percent: percent.unwrap_or(0.0),
        letter_grade: percent.and_then(|p| letter_grade(&cutoffs, p)),
        passed: is_passing(&cutoffs, percent),
    };

    let show_generate_cert_btn = cert_generation_enabled(state, &course.course_key).await?;
    let certificate = if show_generate_cert_btn {
        Some(certificate_downloadable_status(&state.db, student.id, &course.course_key).await?)
    } else {
        None
    };

    Ok(Json(ProgressResponse {
        course_id: course.course_key,
        username: student.username.clone(),
        grade_summary,
        show_generate_cert_btn,
        certificate,
    }))
}

/// `POST /courses/{course_id}/generate_user_cert`
pub async fn generate_user_cert(
    state: &AppState,
    caller: &Caller,
    course_id: &str,
) -> ApiResult<Json<MessageResponse>> {
    let Some(student) = caller.user.as_ref() else {
        tracing::info!(course_id = %course_id, "anonymous user trying to generate certificate");
        return Err(AppError::bad_request(format!(
            "You must be signed in to {} to create a certificate.",
            state.config.platform_name
        )));
    };
    let course_key = CourseKey::parse(course_id)
        .map_err(|_| AppError::not_found(format!("course '{course_id}' not found")))?;
    let Some(course) = find_course(&state.db, &course_key.to_string()).await? else {
        return Err(AppError::bad_request("Course is not valid"));
    };

    let percent = course_percent(&state.db, student.id, &course.course_key).await?;
    if !is_passing(&cutoffs_from_json(&course.grade_cutoffs), percent) {
        return Err(AppError::bad_request(
            "Your certificate will be available when you pass the course.",
        ));
    }

    let current = certificate_status_for_student(&state.db, student.id, &course.course_key).await?;
    if matches!(
        current.status,
        CertificateStatus::Generating | CertificateStatus::Downloadable
    ) {
        return Err(AppError::bad_request(CREATING_CERTIFICATE));
    }

    let status = generate_user_certificates(state, student, &course).await?;
    tracing::info!(
        target: "certificate.generate",
        user_id = %student.id,
        course_id = %course.course_key,
        status = %status,
        "certificate.generate"
    );
    Ok(Json(MessageResponse::new(CREATING_CERTIFICATE)))
}

/// `POST /request_certificate`
pub async fn request_certificate(
    State(state): State<AppState>,
    caller: Caller,
    Form(form): Form<RequestCertificateForm>,
) -> ApiResult<Json<JsonValue>> {
    let Some(student) = caller.user.as_ref() else {
        return Ok(Json(json!({"add_status": "ERRORANONYMOUSUSER"})));
    };
    let course_id = form.course_id.unwrap_or_default();
    let course_key =
        CourseKey::parse(&course_id).map_err(|_| AppError::bad_request("Course is not valid"))?;
    let Some(course) = find_course(&state.db, &course_key.to_string()).await? else {
        return Err(AppError::bad_request("Course is not valid"));
    };

    let mut status = certificate_status_for_student(&state.db, student.id, &course.course_key)
        .await?
        .status;
    if matches!(
        status,
        CertificateStatus::Unavailable | CertificateStatus::Notpassing | CertificateStatus::Error
    ) {
        tracing::info!(
            username = %student.username,
            course_id = %course.course_key,
            "grading and certification requested via /request_certificate"
        );
        status = state.generator().add_cert(student, &course, None, None).await?;
    }
    Ok(Json(json!({"add_status": status})))
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::test_support::{
        enable_generation, get, post_form, seed_certificate, seed_course, seed_grade, seed_user,
        send, test_state,
    };
    use axum::http::StatusCode;
    use coursehub_common::CertificateStatus;
    use serde_json::json;

    const COURSE: &str = "edX/DemoX/Demo";

    #[tokio::test]
    async fn progress_hides_certificate_when_disabled() {
        let (state, _) = test_state().await;
        let user = seed_user(&state.db, "alice").await;
        let course = seed_course(&state.db, COURSE).await;
        seed_grade(&state.db, &user, &course, 0.75).await;

        let (status, body) = send(
            router(state.clone()),
            get("/courses/edX/DemoX/Demo/progress", Some("alice")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["grade_summary"]["letter_grade"], "Pass");
        assert_eq!(body["grade_summary"]["passed"], true);
        assert_eq!(body["show_generate_cert_btn"], false);
        assert!(body.get("is_downloadable").is_none());

        enable_generation(&state.db, COURSE).await;
        state.settings.invalidate_global().await;
        state.settings.invalidate_course(COURSE).await;
        let (_, body) = send(
            router(state),
            get("/courses/edX/DemoX/Demo/progress", Some("alice")),
        )
        .await;
        assert_eq!(body["show_generate_cert_btn"], true);
        assert_eq!(body["is_downloadable"], false);
        assert_eq!(body["is_generating"], false);
    }

    #[tokio::test]
    async fn progress_requires_login() {
        let (state, _) = test_state().await;
        seed_course(&state.db, COURSE).await;
        let (status, _) = send(router(state), get("/courses/edX/DemoX/Demo/progress", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn generate_user_cert_flow() {
        let (state, queue) = test_state().await;
        let user = seed_user(&state.db, "bob").await;
        let course = seed_course(&state.db, COURSE).await;
        let uri = "/courses/edX/DemoX/Demo/generate_user_cert";

        let (status, body) = send(router(state.clone()), post_form(uri, None, &[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "You must be signed in to CourseHub to create a certificate."
        );

        let (status, body) = send(router(state.clone()), post_form(uri, Some("bob"), &[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Your certificate will be available when you pass the course."
        );

        seed_grade(&state.db, &user, &course, 0.9).await;
        let (status, body) = send(router(state.clone()), post_form(uri, Some("bob"), &[])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Creating certificate");
        assert_eq!(queue.sent().len(), 1);

        let (status, body) = send(router(state.clone()), post_form(uri, Some("bob"), &[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Creating certificate");
        assert_eq!(queue.sent().len(), 1);
    }

    #[tokio::test]
    async fn generate_user_cert_rejects_bad_courses() {
        let (state, _) = test_state().await;
        seed_user(&state.db, "carl").await;

        let (status, body) = send(
            router(state.clone()),
            post_form("/courses/edX/Unknown/Run/generate_user_cert", Some("carl"), &[]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Course is not valid");

        let (status, _) = send(
            router(state),
            post_form("/courses/bad%20key!/generate_user_cert", Some("carl"), &[]),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn request_certificate_statuses() {
        let (state, queue) = test_state().await;
        let user = seed_user(&state.db, "dora").await;
        let course = seed_course(&state.db, COURSE).await;

        let (_, body) = send(
            router(state.clone()),
            post_form("/request_certificate", None, &[("course_id", COURSE)]),
        )
        .await;
        assert_eq!(body, json!({"add_status": "ERRORANONYMOUSUSER"}));

        let (_, body) = send(
            router(state.clone()),
            post_form("/request_certificate", Some("dora"), &[("course_id", COURSE)]),
        )
        .await;
        assert_eq!(body, json!({"add_status": "notpassing"}));

        seed_grade(&state.db, &user, &course, 0.6).await;
        let (_, body) = send(
            router(state.clone()),
            post_form("/request_certificate", Some("dora"), &[("course_id", COURSE)]),
        )
        .await;
        assert_eq!(body, json!({"add_status": "generating"}));
        assert_eq!(queue.sent().len(), 1);
    }

    #[tokio::test]
    async fn request_certificate_leaves_downloadable_alone() {
        let (state, queue) = test_state().await;
        let user = seed_user(&state.db, "eve").await;
        let course = seed_course(&state.db, COURSE).await;
        seed_certificate(&state.db, &user, &course, CertificateStatus::Downloadable).await;

        let (_, body) = send(
            router(state),
            post_form("/request_certificate", Some("eve"), &[("course_id", COURSE)]),
        )
        .await;
        assert_eq!(body, json!({"add_status": "downloadable"}));
        assert!(queue.sent().is_empty());
    }
}
