use crate::admin;
use crate::auth::Caller;
use crate::callbacks::{update_certificate, update_example_certificate};
use crate::cohorts::list_cohorts;
use crate::enrollment::{create_enrollment, get_course_details, get_enrollment_handler, list_enrollments};
use crate::error::AppError;
use crate::grades::put_grade;
use crate::html_view::render_certificate;
use crate::metrics::{metrics_middleware, render_metrics};
use crate::profiles::{get_account, get_profile};
use crate::progress::{generate_user_cert, progress, request_certificate};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde_json::{Value as JsonValue, json};
use tower_http::trace::TraceLayer;

type ApiResult<T> = std::result::Result<T, AppError>;

pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        // 课程页面：/courses/{course_id}/{action}，课程标识本身含 `/`
        .route("/courses/{*path}", get(course_get).post(course_post))
        .route("/update_certificate", post(update_certificate))
        .route("/update_example_certificate", post(update_example_certificate))
        .route("/request_certificate", post(request_certificate))
        .route("/certificates/html", get(render_certificate))
        .route(
            "/api/enrollment/v1/enrollment",
            get(list_enrollments).post(create_enrollment),
        )
        .route("/api/enrollment/v1/enrollment/{*spec}", get(get_enrollment_handler))
        .route("/api/enrollment/v1/course/{*course_id}", get(get_course_details))
        .route("/api/user/v0/accounts/{username}", get(get_account))
        .route("/api/user/v0/profiles/{username}", get(get_profile))
        .route("/api/grades/v1/{course_id}/{username}", put(put_grade))
        .route(
            "/api/certificates/v1/configuration",
            get(admin::get_global_configuration).post(admin::set_global_configuration),
        )
        .route(
            "/api/certificates/v1/courses/{course_id}/generation",
            get(admin::get_course_generation).post(admin::set_course_generation),
        )
        .route(
            "/api/certificates/v1/courses/{course_id}/example",
            get(admin::get_example_certificates).post(admin::start_example_certificates),
        )
        .route(
            "/api/certificates/v1/courses/{course_id}/users/{username}/regenerate",
            post(admin::regenerate_certificate),
        )
        .route(
            "/api/certificates/v1/courses/{course_id}/users/{username}/delete",
            post(admin::delete_certificate),
        )
        .route("/api/certificates/v1/whitelist", post(admin::update_whitelist))
        .route(
            "/api/certificates/v1/html_view_configuration",
            post(admin::update_html_view_configuration),
        )
        .route("/api/certificates/v1/status", get(admin::certificate_status))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 拆出末段动作，其余部分是课程标识
fn split_course_path(path: &str) -> Option<(&str, &str)> {
    let (course_id, action) = path.trim_end_matches('/').rsplit_once('/')?;
    if course_id.is_empty() {
        return None;
    }
    Some((course_id, action))
}

async fn course_get(
    State(state): State<AppState>,
    caller: Caller,
    Path(path): Path<String>,
) -> ApiResult<Response> {
    match split_course_path(&path) {
        Some((course_id, "progress")) => {
            Ok(progress(&state, &caller, course_id).await?.into_response())
        }
        Some((course_id, "cohorts")) => {
            Ok(list_cohorts(&state, &caller, course_id).await?.into_response())
        }
        _ => Err(AppError::not_found(format!("no page at /courses/{path}"))),
    }
}

async fn course_post(
    State(state): State<AppState>,
    caller: Caller,
    Path(path): Path<String>,
) -> ApiResult<Response> {
    match split_course_path(&path) {
        Some((course_id, "generate_user_cert")) => {
            Ok(generate_user_cert(&state, &caller, course_id).await?.into_response())
        }
        _ => Err(AppError::not_found(format!("no page at /courses/{path}"))),
    }
}

async fn metrics() -> Response {
    render_metrics()
}

async fn health() -> Json<JsonValue> {
    Json(json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{get as get_request, send, send_text, test_state};
    use axum::http::StatusCode;

    #[test]
    fn splits_course_paths_on_last_segment() {
        assert_eq!(
            split_course_path("edX/DemoX/Demo/progress"),
            Some(("edX/DemoX/Demo", "progress"))
        );
        assert_eq!(
            split_course_path("course-v1:edX+DemoX+Demo/cohorts/"),
            Some(("course-v1:edX+DemoX+Demo", "cohorts"))
        );
        assert_eq!(split_course_path("progress"), None);
        assert_eq!(split_course_path("/progress"), None);
    }

    #[tokio::test]
    async fn health_and_unknown_course_pages() {
        let (state, _) = test_state().await;
        let (status, body) = send(router(state.clone()), get_request("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));

        let (status, _) = send(
            router(state.clone()),
            get_request("/courses/edX/DemoX/Demo/syllabus", Some("anyone")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, text) = send_text(router(state), get_request("/metrics", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("coursehub_http_requests_total"));
    }
}
