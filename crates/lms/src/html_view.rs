//! 证书 HTML 页面
//!
//! 模板在编译期嵌入，使用 minijinja 渲染。页面上下文由三层静态配置叠加
//! （`default` → 证书模式 → 课程覆盖项），再写入根据课程与证书计算出的动态字段。

use crate::auth::Caller;
use crate::error::AppError;
use crate::lookup::find_course;
use crate::state::AppState;
use anyhow::anyhow;
use axum::extract::{Query, State};
use axum::response::Html;
use chrono::{Datelike, Utc};
use coursehub_common::CourseKey;
use coursehub_common::entities::{courses, generated_certificates, users};
use coursehub_common::models::HtmlViewQuery;
use minijinja::{Environment, UndefinedBehavior};
use serde_json::{Map, Value as JsonValue, json};
use std::sync::OnceLock;

const VALID_TEMPLATE: &str = include_str!("../templates/certificate_valid.html");
const INVALID_TEMPLATE: &str = include_str!("../templates/certificate_invalid.html");

fn template_env() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env
    })
}

fn render(name: &str, source: &str, context: &JsonValue) -> Result<Html<String>, AppError> {
    template_env()
        .render_named_str(name, source, context)
        .map(Html)
        .map_err(|e| AppError::Internal(anyhow!("failed to render {name}: {e}")))
}

/// `GET /certificates/html?course=`
pub async fn render_certificate(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<HtmlViewQuery>,
) -> Result<Html<String>, AppError> {
    let user = caller.require_user()?;
    let course_id = query.course.filter(|c| !c.is_empty());
    let invalid = |course: Option<&str>| {
        render(
            "certificate_invalid.html",
            INVALID_TEMPLATE,
            &json!({"platform_name": state.config.platform_name, "course": course}),
        )
    };

    if !state.config.certificates_html_view {
        return invalid(None);
    }
    let Some(course_id) = course_id else {
        return invalid(None);
    };
    let Ok(course_key) = CourseKey::parse(&course_id) else {
        return invalid(Some(&course_id));
    };
    let Some(course) = find_course(&state.db, &course_key.to_string()).await? else {
        return invalid(Some(&course_id));
    };
    let Some(certificate) =
        crate::queue::find_certificate(&state.db, user.id, &course.course_key).await?
    else {
        tracing::debug!(
            username = %user.username,
            course_id = %course.course_key,
            "no certificate for html view"
        );
        return invalid(Some(&course_id));
    };

    let configuration = state.settings.html_view_configuration(&state.db).await?;
    let context = build_context(
        &configuration,
        user,
        &course,
        &certificate,
        &state.config.platform_name,
    );
    render("certificate_valid.html", VALID_TEMPLATE, &context)
}

fn merge_into(target: &mut Map<String, JsonValue>, source: Option<&JsonValue>) {
    if let Some(JsonValue::Object(fields)) = source {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn text(context: &Map<String, JsonValue>, key: &str) -> String {
    match context.get(key) {
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn build_context(
    configuration: &JsonValue,
    user: &users::Model,
    course: &courses::Model,
    certificate: &generated_certificates::Model,
    platform_name: &str,
) -> JsonValue {
    let mut context = Map::new();
    merge_into(&mut context, configuration.get("default"));
    merge_into(&mut context, configuration.get(certificate.mode.as_str()));
    merge_into(&mut context, Some(&course.cert_html_view_overrides));

    // company_name 未配置时退回平台名
    let company_name = match text(&context, "company_name") {
        name if name.is_empty() => platform_name.to_string(),
        name => name,
    };
    let full_name = &user.name;
    let verify_url = format!(
        "{}{}{}",
        text(&context, "certificate_verify_url_prefix"),
        certificate.verify_uuid,
        text(&context, "certificate_verify_url_suffix"),
    );
    let description_full = format!(
        "{}{}",
        text(&context, "accomplishment_copy_description"),
        text(&context, "accomplishment_copy_description_suffix"),
    );

    let dynamic = json!({
        "company_name": company_name,
        "accomplishment_copy_name": full_name,
        "accomplishment_copy_course_description": format!(
            "a course of study offered by <span class=\"detail--xuniversity\">{}</span>, \
             through <span class=\"detail--company\">{}</span>.",
            course.org, company_name
        ),
        "accomplishment_copy_course_org": course.org,
        "accomplishment_copy_course_name": course.display_name,
        "accomplishment_more_title": format!("More Information About {full_name}'s Certificate:"),
        "certificate_date_issued": certificate.updated_at.format("%B %d, %Y").to_string(),
        "certificate_id_number": certificate.verify_uuid,
        "certificate_verify_url": verify_url,
        "copyright_text": format!(
            "&copy; {} {}. All rights reserved",
            Utc::now().year(),
            company_name
        ),
        "document_meta_description": format!(
            "This is a valid {} certificate for {}, who participated in {} {}",
            company_name, full_name, course.org, course.number
        ),
        "document_title": format!(
            "Valid {} {} Certificate | {}",
            course.org, course.number, company_name
        ),
        "accomplishment_copy_description_full": description_full,
    });
    merge_into(&mut context, Some(&dynamic));
    JsonValue::Object(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::test_support::{
        get, seed_certificate, seed_course, seed_user, send_text, test_config, test_state_with,
        RecordingQueue,
    };
    use axum::http::StatusCode;
    use coursehub_common::CertificateStatus;
    use coursehub_common::entities::certificate_html_view_configurations;
    use sea_orm::{ActiveModelTrait, Set};
    use uuid::Uuid;

    const COURSE: &str = "edX/DemoX/Demo";

    async fn enabled_state() -> crate::state::AppState {
        let mut config = test_config();
        config.certificates_html_view = true;
        let (state, _) = test_state_with(config, RecordingQueue::default()).await;
        state
    }

    async fn save_configuration(state: &crate::state::AppState, configuration: JsonValue) {
        let now = Utc::now();
        certificate_html_view_configurations::ActiveModel {
            id: Set(Uuid::new_v4()),
            enabled: Set(true),
            configuration: Set(configuration.to_string()),
            changed_by: Set(None),
            created_at: Set(now.into()),
        }
        .insert(&state.db)
        .await
        .unwrap();
        state.settings.invalidate_html_view().await;
    }

    #[tokio::test]
    async fn anonymous_users_are_rejected() {
        let state = enabled_state().await;
        let (status, _) = send_text(
            router(state),
            get("/certificates/html?course=edX/DemoX/Demo", None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_page_when_feature_disabled() {
        let (state, _) = crate::test_support::test_state().await;
        let user = seed_user(&state.db, "amy").await;
        let course = seed_course(&state.db, COURSE).await;
        seed_certificate(&state.db, &user, &course, CertificateStatus::Downloadable).await;

        let (status, body) = send_text(
            router(state),
            get("/certificates/html?course=edX/DemoX/Demo", Some("amy")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Cannot Find Certificate"));
    }

    #[tokio::test]
    async fn invalid_page_for_bad_course_or_missing_certificate() {
        let state = enabled_state().await;
        seed_user(&state.db, "ben").await;
        seed_course(&state.db, COURSE).await;

        for uri in [
            "/certificates/html",
            "/certificates/html?course=not%20a%20key",
            "/certificates/html?course=edX/Other/Run",
            "/certificates/html?course=edX/DemoX/Demo",
        ] {
            let (status, body) = send_text(router(state.clone()), get(uri, Some("ben"))).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert!(body.contains("Cannot Find Certificate"), "{uri}");
        }
    }

    #[tokio::test]
    async fn valid_page_layers_configuration() {
        let state = enabled_state().await;
        let user = seed_user(&state.db, "cleo").await;
        let course = seed_course(&state.db, COURSE).await;
        seed_certificate(&state.db, &user, &course, CertificateStatus::Downloadable).await;
        save_configuration(
            &state,
            json!({
                "default": {
                    "company_name": "Example Org",
                    "certificate_verify_url_prefix": "https://verify.example.com/cert/",
                    "certificate_verify_url_suffix": "/verify.html",
                    "accomplishment_copy_description": "Default description"
                },
                "honor": {"accomplishment_copy_description": "Honor description"}
            }),
        )
        .await;

        let (status, body) = send_text(
            router(state),
            get("/certificates/html?course=edX/DemoX/Demo", Some("cleo")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Valid edX DemoX Certificate | Example Org"));
        assert!(body.contains("cleo Learner"));
        assert!(body.contains("Honor description"));
        assert!(!body.contains("Default description"));
        assert!(body.contains("verify-uuid-1"));
        assert!(body.contains("<span class=\"detail--xuniversity\">edX</span>"));
        assert!(body.contains("&copy;"));
    }

    #[test]
    fn course_overrides_win_over_mode_values() {
        let now = Utc::now();
        let user = users::Model {
            id: Uuid::new_v4(),
            username: "dan".into(),
            email: "dan@example.com".into(),
            name: "Dan <Tester>".into(),
            is_active: true,
            is_staff: false,
            is_verified: false,
            allow_certificate: true,
            gender: None,
            year_of_birth: None,
            level_of_education: None,
            goals: None,
            country: None,
            language: None,
            time_zone: None,
            languages: json!([]),
            bio: None,
            profile_image: None,
            mailing_address: None,
            date_joined: now.into(),
            created_at: now.into(),
            updated_at: now.into(),
        };
        let course = courses::Model {
            id: Uuid::new_v4(),
            course_key: COURSE.into(),
            org: "edX".into(),
            number: "DemoX".into(),
            run: "Demo".into(),
            display_name: "Demo".into(),
            enrollment_start: None,
            enrollment_end: None,
            invite_only: false,
            grade_cutoffs: json!({}),
            cert_html_view_overrides: json!({"logo": "course.png"}),
            cohort_config: json!({}),
            created_at: now.into(),
            updated_at: now.into(),
        };
        let certificate = generated_certificates::Model {
            id: Uuid::new_v4(),
            user_id: user.id,
            course_key: COURSE.into(),
            status: "downloadable".into(),
            mode: "verified".into(),
            grade: "0.9".into(),
            key: String::new(),
            download_url: String::new(),
            download_uuid: String::new(),
            verify_uuid: "abc".into(),
            name: user.name.clone(),
            distinction: false,
            error_reason: String::new(),
            created_at: now.into(),
            updated_at: now.into(),
        };
        let configuration = json!({
            "default": {"logo": "default.png", "certificate_verify_url_prefix": "https://verify.example.com/"},
            "verified": {"logo": "verified.png"}
        });

        let context = build_context(&configuration, &user, &course, &certificate, "CourseHub");
        assert_eq!(context["logo"], "course.png");
        assert_eq!(context["company_name"], "CourseHub");
        assert_eq!(context["certificate_verify_url"], "https://verify.example.com/abc");
        assert_eq!(context["certificate_id_number"], "abc");
        assert_eq!(
            context["document_meta_description"],
            "This is a valid CourseHub certificate for Dan <Tester>, who participated in edX DemoX"
        );

        let html = render("certificate_valid.html", VALID_TEMPLATE, &context).unwrap().0;
        assert!(html.contains("Dan &lt;Tester&gt;"));
    }
}
