//! 选课接口
//!
//! 查询他人选课信息但没有 API key 时返回 404 而不是 403，避免泄露选课关系。

use crate::auth::Caller;
use crate::error::AppError;
use crate::lookup::{find_course, find_user};
use crate::queue::MODE_HONOR;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use coursehub_common::entities::{
    course_enrollments, course_modes, courses, restricted_courses, user_org_tags, users,
};
use coursehub_common::models::{
    CourseEnrollmentDetails, CourseModeInfo, CreateEnrollment, EnrollmentInfo, EnrollmentListQuery,
};
use coursehub_common::{CourseKey, CoursehubError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

type ApiResult<T> = std::result::Result<T, AppError>;

const EMAIL_OPT_IN_KEY: &str = "email-optin";

// ============ 服务层 ============

/// 课程当前可选的模式；未配置任何模式时提供默认 honor 模式
pub async fn course_modes_for(db: &DatabaseConnection, course_key: &str) -> Result<Vec<CourseModeInfo>> {
    let now = Utc::now();
    let modes: Vec<CourseModeInfo> = course_modes::Entity::find()
        .filter(course_modes::Column::CourseKey.eq(course_key))
        .order_by_asc(course_modes::Column::MinPrice)
        .order_by_asc(course_modes::Column::ModeSlug)
        .all(db)
        .await?
        .into_iter()
        .filter(|mode| mode.expiration_datetime.is_none_or(|expires| expires > now))
        .map(|mode| CourseModeInfo {
            slug: mode.mode_slug,
            name: mode.mode_display_name,
            min_price: mode.min_price,
            suggested_prices: mode.suggested_prices,
            currency: mode.currency,
            expiration_datetime: mode.expiration_datetime,
            description: mode.description,
            sku: mode.sku,
        })
        .collect();

    if modes.is_empty() {
        return Ok(vec![default_mode()]);
    }
    Ok(modes)
}

fn default_mode() -> CourseModeInfo {
    CourseModeInfo {
        slug: MODE_HONOR.to_string(),
        name: "Honor Code Certificate".to_string(),
        min_price: 0,
        suggested_prices: String::new(),
        currency: "usd".to_string(),
        expiration_datetime: None,
        description: None,
        sku: None,
    }
}

pub async fn course_details(
    db: &DatabaseConnection,
    course: &courses::Model,
) -> Result<CourseEnrollmentDetails> {
    Ok(CourseEnrollmentDetails {
        course_id: course.course_key.clone(),
        enrollment_start: course.enrollment_start,
        enrollment_end: course.enrollment_end,
        invite_only: course.invite_only,
        course_modes: course_modes_for(db, &course.course_key).await?,
    })
}

async fn enrollment_info(
    db: &DatabaseConnection,
    enrollment: course_enrollments::Model,
    username: &str,
) -> Result<EnrollmentInfo> {
    let course = find_course(db, &enrollment.course_key)
        .await?
        .ok_or_else(|| CoursehubError::CourseNotFound(enrollment.course_key.clone()))?;
    Ok(EnrollmentInfo {
        created: enrollment.created_at,
        mode: enrollment.mode,
        is_active: enrollment.is_active,
        course_details: course_details(db, &course).await?,
        user: username.to_string(),
    })
}

pub async fn get_enrollment(
    db: &DatabaseConnection,
    username: &str,
    course_key: &str,
) -> Result<Option<EnrollmentInfo>> {
    let Some(user) = find_user(db, username).await? else {
        return Ok(None);
    };
    let enrollment = course_enrollments::Entity::find()
        .filter(course_enrollments::Column::UserId.eq(user.id))
        .filter(course_enrollments::Column::CourseKey.eq(course_key))
        .one(db)
        .await?;
    match enrollment {
        Some(enrollment) => Ok(Some(enrollment_info(db, enrollment, username).await?)),
        None => Ok(None),
    }
}

pub async fn get_enrollments(db: &DatabaseConnection, username: &str) -> Result<Vec<EnrollmentInfo>> {
    let Some(user) = find_user(db, username).await? else {
        return Ok(Vec::new());
    };
    let enrollments = course_enrollments::Entity::find()
        .filter(course_enrollments::Column::UserId.eq(user.id))
        .filter(course_enrollments::Column::IsActive.eq(true))
        .order_by_asc(course_enrollments::Column::CreatedAt)
        .all(db)
        .await?;
    let mut result = Vec::with_capacity(enrollments.len());
    for enrollment in enrollments {
        result.push(enrollment_info(db, enrollment, username).await?);
    }
    Ok(result)
}

/// 以 honor 模式选课
///
/// 已有有效选课时返回 `EnrollmentExists`；已退课的记录会被重新激活。
pub async fn add_enrollment(
    db: &DatabaseConnection,
    user: &users::Model,
    course: &courses::Model,
) -> Result<EnrollmentInfo> {
    let details = course_details(db, course).await?;
    if !details.course_modes.iter().any(|mode| mode.slug == MODE_HONOR) {
        return Err(CoursehubError::CourseModeNotFound {
            mode: MODE_HONOR.to_string(),
            course_id: course.course_key.clone(),
            course_details: serde_json::to_value(&details)?,
        });
    }

    let existing = course_enrollments::Entity::find()
        .filter(course_enrollments::Column::UserId.eq(user.id))
        .filter(course_enrollments::Column::CourseKey.eq(&course.course_key))
        .one(db)
        .await?;
    let now = Utc::now();
    let enrollment = match existing {
        Some(enrollment) if enrollment.is_active => {
            let info = enrollment_info(db, enrollment, &user.username).await?;
            return Err(CoursehubError::EnrollmentExists(Box::new(serde_json::to_value(
                info,
            )?)));
        }
        Some(enrollment) => {
            let mut active: course_enrollments::ActiveModel = enrollment.into();
            active.is_active = Set(true);
            active.mode = Set(MODE_HONOR.to_string());
            active.updated_at = Set(now.into());
            active.update(db).await?
        }
        None => {
            course_enrollments::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.id),
                course_key: Set(course.course_key.clone()),
                mode: Set(MODE_HONOR.to_string()),
                is_active: Set(true),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(db)
            .await?
        }
    };

    tracing::info!(
        username = %user.username,
        course_id = %course.course_key,
        mode = %enrollment.mode,
        "user enrolled"
    );
    Ok(EnrollmentInfo {
        created: enrollment.created_at,
        mode: enrollment.mode,
        is_active: enrollment.is_active,
        course_details: details,
        user: user.username.clone(),
    })
}

/// 记录用户是否接收课程机构的邮件
pub async fn update_email_opt_in(
    db: &DatabaseConnection,
    user: &users::Model,
    org: &str,
    opt_in: bool,
) -> Result<()> {
    let value = if opt_in { "True" } else { "False" };
    let existing = user_org_tags::Entity::find()
        .filter(user_org_tags::Column::UserId.eq(user.id))
        .filter(user_org_tags::Column::Org.eq(org))
        .filter(user_org_tags::Column::Key.eq(EMAIL_OPT_IN_KEY))
        .one(db)
        .await?;
    let now = Utc::now();
    match existing {
        Some(tag) => {
            let mut active: user_org_tags::ActiveModel = tag.into();
            active.value = Set(value.to_string());
            active.updated_at = Set(now.into());
            active.update(db).await?;
        }
        None => {
            user_org_tags::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.id),
                org: Set(org.to_string()),
                key: Set(EMAIL_OPT_IN_KEY.to_string()),
                value: Set(value.to_string()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

/// 用户所在国家被课程禁止时返回提示页地址
pub async fn embargo_message_url(
    db: &DatabaseConnection,
    user: &users::Model,
    course_key: &str,
) -> Result<Option<String>> {
    let Some(country) = user.country.as_deref().filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let restriction = restricted_courses::Entity::find()
        .filter(restricted_courses::Column::CourseKey.eq(course_key))
        .one(db)
        .await?;
    Ok(restriction.and_then(|restriction| {
        let blocked = restriction
            .blocked_countries
            .as_array()
            .is_some_and(|codes| {
                codes
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .any(|code| code.eq_ignore_ascii_case(country))
            });
        blocked.then_some(restriction.message_url)
    }))
}

// ============ HTTP 层 ============

fn not_found_for_enrollment(course_id: &str) -> AppError {
    AppError::bad_request(format!("No course '{course_id}' found for enrollment"))
}

/// `GET /api/enrollment/v1/enrollment/{user},{course_id}` 或 `.../{course_id}`
pub async fn get_enrollment_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(spec): Path<String>,
) -> ApiResult<Json<Option<EnrollmentInfo>>> {
    caller.require_identified()?;
    let (username, course_id) = match spec.split_once(',') {
        Some((user, course_id)) => (user.to_string(), course_id.to_string()),
        None => (
            caller.username().ok_or(AppError::Unauthorized)?.to_string(),
            spec.clone(),
        ),
    };
    if !caller.can_act_for(&username) {
        return Err(AppError::not_found("enrollment not found"));
    }

    let course_key = CourseKey::parse(&course_id).map_err(|_| {
        AppError::bad_request(format!(
            "An error occurred while retrieving enrollments for user '{username}' in course '{course_id}'"
        ))
    })?;
    let enrollment = get_enrollment(&state.db, &username, &course_key.to_string()).await?;
    Ok(Json(enrollment))
}

/// `GET /api/enrollment/v1/enrollment?user=`
pub async fn list_enrollments(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<EnrollmentListQuery>,
) -> ApiResult<Json<Vec<EnrollmentInfo>>> {
    caller.require_identified()?;
    let Some(username) = params
        .user
        .or_else(|| caller.username().map(str::to_string))
    else {
        return Ok(Json(Vec::new()));
    };
    if !caller.can_act_for(&username) {
        return Err(AppError::not_found("enrollments not found"));
    }
    Ok(Json(get_enrollments(&state.db, &username).await?))
}

/// `POST /api/enrollment/v1/enrollment`
pub async fn create_enrollment(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateEnrollment>,
) -> ApiResult<Json<JsonValue>> {
    caller.require_identified()?;
    let username = payload
        .user
        .clone()
        .filter(|user| !user.is_empty())
        .or_else(|| caller.username().map(str::to_string))
        .unwrap_or_default();
    if !caller.can_act_for(&username) {
        return Err(AppError::not_found("enrollment not found"));
    }

    let Some(course_id) = payload
        .course_details
        .as_ref()
        .and_then(|details| details.course_id.clone())
    else {
        return Err(AppError::bad_request(
            "Course ID must be specified to create a new enrollment.",
        ));
    };
    let course_key = CourseKey::parse(&course_id).map_err(|_| not_found_for_enrollment(&course_id))?;
    let course_id = course_key.to_string();

    if let Some(requester) = &caller.user {
        if let Some(message_url) = embargo_message_url(&state.db, requester, &course_id).await? {
            return Err(AppError::Forbidden {
                message: format!("Users from this location cannot access the course '{course_id}'."),
                extra: json!({"user_message_url": message_url}),
            });
        }
    }

    let creation_failed = || {
        AppError::bad_request(format!(
            "An error occurred while creating the new course enrollment for user '{username}' in course '{course_id}'"
        ))
    };
    let Some(user) = find_user(&state.db, &username).await? else {
        return Err(creation_failed());
    };
    let Some(course) = find_course(&state.db, &course_id).await? else {
        return Err(not_found_for_enrollment(&course_id));
    };

    match add_enrollment(&state.db, &user, &course).await {
        Ok(info) => {
            if let Some(opt_in) = payload.email_opt_in {
                update_email_opt_in(&state.db, &user, &course.org, opt_in).await?;
            }
            Ok(Json(serde_json::to_value(info).map_err(CoursehubError::from)?))
        }
        Err(CoursehubError::EnrollmentExists(existing)) => Ok(Json(*existing)),
        Err(CoursehubError::CourseModeNotFound {
            mode,
            course_id,
            course_details,
        }) => Err(AppError::BadRequestWith {
            message: format!("The course mode '{mode}' is not available for course '{course_id}'."),
            extra: json!({"course_details": course_details}),
        }),
        Err(err @ (CoursehubError::Database(_) | CoursehubError::Internal(_))) => Err(err.into()),
        Err(err) => {
            tracing::warn!(error = %err, username = %username, course_id = %course_id, "enrollment failed");
            Err(creation_failed())
        }
    }
}

/// `GET /api/enrollment/v1/course/{course_id}`，无需登录
pub async fn get_course_details(
    State(state): State<AppState>,
    Path(course_id): Path<String>,
) -> ApiResult<Json<CourseEnrollmentDetails>> {
    let not_found = || AppError::bad_request(format!("No course found for course ID '{course_id}'"));
    let course_key = CourseKey::parse(&course_id).map_err(|_| not_found())?;
    let course = find_course(&state.db, &course_key.to_string())
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(course_details(&state.db, &course).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::test_support::{
        get, post_json, seed_course, seed_enrollment, seed_mode, seed_user, send, test_state,
        with_api_key,
    };
    use axum::http::StatusCode;

    const COURSE: &str = "edX/DemoX/Demo";

    #[tokio::test]
    async fn enroll_and_read_back() {
        let (state, _) = test_state().await;
        seed_user(&state.db, "alice").await;
        seed_course(&state.db, COURSE).await;

        let (status, body) = send(
            router(state.clone()),
            post_json(
                "/api/enrollment/v1/enrollment",
                Some("alice"),
                json!({"course_details": {"course_id": COURSE}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "honor");
        assert_eq!(body["is_active"], true);
        assert_eq!(body["user"], "alice");
        assert_eq!(body["course_details"]["course_id"], COURSE);
        assert_eq!(body["course_details"]["course_modes"][0]["slug"], "honor");

        let (status, body) = send(
            router(state.clone()),
            get("/api/enrollment/v1/enrollment/edX/DemoX/Demo", Some("alice")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "honor");

        let (status, body) = send(
            router(state.clone()),
            get("/api/enrollment/v1/enrollment", Some("alice")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn already_enrolled_returns_existing() {
        let (state, _) = test_state().await;
        let user = seed_user(&state.db, "bob").await;
        let course = seed_course(&state.db, COURSE).await;
        seed_enrollment(&state.db, &user, &course, "honor").await;

        let (status, body) = send(
            router(state),
            post_json(
                "/api/enrollment/v1/enrollment",
                Some("bob"),
                json!({"course_details": {"course_id": COURSE}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], "bob");
    }

    #[tokio::test]
    async fn enrollment_errors() {
        let (state, _) = test_state().await;
        seed_user(&state.db, "carol").await;
        let app = || router(state.clone());

        let (status, body) = send(
            app(),
            post_json("/api/enrollment/v1/enrollment", Some("carol"), json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Course ID must be specified to create a new enrollment."
        );

        let (status, body) = send(
            app(),
            post_json(
                "/api/enrollment/v1/enrollment",
                Some("carol"),
                json!({"course_details": {"course_id": "not a key"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No course 'not a key' found for enrollment");

        let (status, _) = send(
            app(),
            post_json(
                "/api/enrollment/v1/enrollment",
                Some("carol"),
                json!({"course_details": {"course_id": "edX/Missing/Run"}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            app(),
            post_json(
                "/api/enrollment/v1/enrollment",
                None,
                json!({"course_details": {"course_id": COURSE}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn honor_mode_missing_reports_course_details() {
        let (state, _) = test_state().await;
        seed_user(&state.db, "dave").await;
        let course = seed_course(&state.db, COURSE).await;
        seed_mode(&state.db, &course.course_key, "verified").await;

        let (status, body) = send(
            router(state),
            post_json(
                "/api/enrollment/v1/enrollment",
                Some("dave"),
                json!({"course_details": {"course_id": COURSE}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            format!("The course mode 'honor' is not available for course '{COURSE}'.")
        );
        assert_eq!(body["course_details"]["course_modes"][0]["slug"], "verified");
    }

    #[tokio::test]
    async fn other_users_are_hidden_without_api_key() {
        let (state, _) = test_state().await;
        let erin = seed_user(&state.db, "erin").await;
        seed_user(&state.db, "mallory").await;
        let course = seed_course(&state.db, COURSE).await;
        seed_enrollment(&state.db, &erin, &course, "honor").await;

        let (status, _) = send(
            router(state.clone()),
            get("/api/enrollment/v1/enrollment/erin,edX/DemoX/Demo", Some("mallory")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            router(state.clone()),
            with_api_key(get("/api/enrollment/v1/enrollment/erin,edX/DemoX/Demo", None)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"], "erin");

        let (status, _) = send(
            router(state),
            get("/api/enrollment/v1/enrollment?user=erin", Some("mallory")),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn embargoed_country_is_forbidden() {
        let (state, _) = test_state().await;
        let user = seed_user(&state.db, "frank").await;
        let mut active: users::ActiveModel = user.into();
        active.country = Set(Some("IR".to_string()));
        active.update(&state.db).await.unwrap();
        seed_course(&state.db, COURSE).await;
        let now = Utc::now();
        restricted_courses::ActiveModel {
            id: Set(Uuid::new_v4()),
            course_key: Set(COURSE.to_string()),
            blocked_countries: Set(json!(["IR", "CU"])),
            message_url: Set("/embargo/blocked-message/enrollment/default/".to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&state.db)
        .await
        .unwrap();

        let (status, body) = send(
            router(state),
            post_json(
                "/api/enrollment/v1/enrollment",
                Some("frank"),
                json!({"course_details": {"course_id": COURSE}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(
            body["user_message_url"],
            "/embargo/blocked-message/enrollment/default/"
        );
    }

    #[tokio::test]
    async fn email_opt_in_is_stored_per_org() {
        let (state, _) = test_state().await;
        let user = seed_user(&state.db, "gina").await;
        seed_course(&state.db, COURSE).await;

        let (status, _) = send(
            router(state.clone()),
            post_json(
                "/api/enrollment/v1/enrollment",
                Some("gina"),
                json!({"course_details": {"course_id": COURSE}, "email_opt_in": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let tag = user_org_tags::Entity::find()
            .filter(user_org_tags::Column::UserId.eq(user.id))
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tag.org, "edX");
        assert_eq!(tag.key, "email-optin");
        assert_eq!(tag.value, "True");
    }

    #[tokio::test]
    async fn course_details_need_no_auth() {
        let (state, _) = test_state().await;
        seed_course(&state.db, COURSE).await;

        let (status, body) = send(
            router(state.clone()),
            get("/api/enrollment/v1/course/edX/DemoX/Demo", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["course_id"], COURSE);
        assert_eq!(body["invite_only"], false);

        let (status, body) = send(
            router(state),
            get("/api/enrollment/v1/course/edX/Nope/Run", None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No course found for course ID 'edX/Nope/Run'");
    }
}
