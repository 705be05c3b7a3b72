//! 课程成绩写入接口，由评分服务调用

use crate::auth::Caller;
use crate::error::AppError;
use crate::lookup::{require_course, require_user};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use coursehub_common::entities::course_grades;
use coursehub_common::models::GradeUpdate;
use coursehub_common::validation::validate_percent;
use coursehub_common::CoursehubError;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, Set};
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

/// `PUT /api/grades/v1/{course_id}/{username}`
pub async fn put_grade(
    State(state): State<AppState>,
    caller: Caller,
    Path((course_id, username)): Path<(String, String)>,
    Json(payload): Json<GradeUpdate>,
) -> Result<Json<JsonValue>, AppError> {
    caller.require_api_key()?;
    let percent = validate_percent(payload.percent).map_err(CoursehubError::from)?;
    let course = require_course(&state.db, &course_id).await?;
    let user = require_user(&state.db, &username).await?;

    let now = Utc::now();
    let existing = course_grades::Entity::find()
        .filter(course_grades::Column::UserId.eq(user.id))
        .filter(course_grades::Column::CourseKey.eq(course.course_key.as_str()))
        .one(&state.db)
        .await?;
    match existing {
        Some(row) => {
            let mut active = row.into_active_model();
            active.percent = Set(percent);
            active.updated_at = Set(now.into());
            active.update(&state.db).await?;
        }
        None => {
            course_grades::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.id),
                course_key: Set(course.course_key.clone()),
                percent: Set(percent),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&state.db)
            .await?;
        }
    }

    tracing::info!(
        username = %user.username,
        course_id = %course.course_key,
        percent,
        "grade updated"
    );
    Ok(Json(json!({
        "username": user.username,
        "course_id": course.course_key,
        "percent": percent,
    })))
}
