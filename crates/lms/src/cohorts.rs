//! 课程分组
//!
//! 每个用户在同一课程内至多属于一个分组。历史数据里出现的多重归属由
//! `remove-users-from-multiple-cohorts` 命令清理。

use crate::auth::Caller;
use crate::error::AppError;
use crate::lookup::require_course;
use crate::state::AppState;
use crate::txn;
use axum::Json;
use chrono::Utc;
use coursehub_common::entities::course_user_groups::GROUP_TYPE_COHORT;
use coursehub_common::entities::{course_user_group_users, course_user_groups, courses, users};
use coursehub_common::models::{CohortConfig, CohortInfo};
use coursehub_common::{CoursehubError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde_json::{Value as JsonValue, json};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

async fn course_cohorts(
    db: &DatabaseConnection,
    course_key: &str,
) -> Result<Vec<course_user_groups::Model>> {
    Ok(course_user_groups::Entity::find()
        .filter(course_user_groups::Column::CourseKey.eq(course_key))
        .filter(course_user_groups::Column::GroupType.eq(GROUP_TYPE_COHORT))
        .order_by_asc(course_user_groups::Column::Name)
        .all(db)
        .await?)
}

/// 用户在课程中的分组：没有返回 `None`，多于一个返回 `MultipleCohorts`
pub async fn get_cohort(
    db: &DatabaseConnection,
    user: &users::Model,
    course_key: &str,
) -> Result<Option<course_user_groups::Model>> {
    let mut cohorts = course_user_groups::Entity::find()
        .inner_join(course_user_group_users::Entity)
        .filter(course_user_group_users::Column::UserId.eq(user.id))
        .filter(course_user_groups::Column::CourseKey.eq(course_key))
        .filter(course_user_groups::Column::GroupType.eq(GROUP_TYPE_COHORT))
        .all(db)
        .await?;
    match cohorts.len() {
        0 => Ok(None),
        1 => Ok(cohorts.pop()),
        _ => Err(CoursehubError::MultipleCohorts {
            username: user.username.clone(),
            course_id: course_key.to_string(),
        }),
    }
}

/// 按 `cohort_config.auto_cohort_groups` 补齐缺失的自动分组
async fn ensure_auto_cohorts(db: &DatabaseConnection, course: &courses::Model) -> Result<()> {
    let config = CohortConfig::from_json(&course.cohort_config);
    if !config.cohorted || config.auto_cohort_groups.is_empty() {
        return Ok(());
    }
    let existing = course_cohorts(db, &course.course_key).await?;
    for name in &config.auto_cohort_groups {
        if existing.iter().any(|cohort| &cohort.name == name) {
            continue;
        }
        let now = Utc::now();
        course_user_groups::ActiveModel {
            id: Set(Uuid::new_v4()),
            course_key: Set(course.course_key.clone()),
            name: Set(name.clone()),
            group_type: Set(GROUP_TYPE_COHORT.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(db)
        .await?;
        tracing::info!(course_id = %course.course_key, cohort = %name, "auto cohort created");
    }
    Ok(())
}

/// `GET /courses/{course_id}/cohorts`
pub async fn list_cohorts(
    state: &AppState,
    caller: &Caller,
    course_id: &str,
) -> std::result::Result<Json<JsonValue>, AppError> {
    caller.require_staff_or_key()?;
    let course = require_course(&state.db, course_id).await?;
    ensure_auto_cohorts(&state.db, &course).await?;

    let current = match &caller.user {
        Some(user) => get_cohort(&state.db, user, &course.course_key).await?,
        None => None,
    };

    let mut cohorts = Vec::new();
    for cohort in course_cohorts(&state.db, &course.course_key).await? {
        let user_count = course_user_group_users::Entity::find()
            .filter(course_user_group_users::Column::GroupId.eq(cohort.id))
            .count(&state.db)
            .await?;
        cohorts.push(CohortInfo {
            id: cohort.id,
            name: cohort.name,
            user_count,
        });
    }
    Ok(Json(json!({
        "cohorts": cohorts,
        "current_cohort": current.map(|cohort| cohort.name),
    })))
}

/// 把同一课程内属于多个分组的用户从该课程的全部分组移除，返回处理的用户数
pub async fn remove_users_from_multiple_cohorts(db: &DatabaseConnection) -> Result<u64> {
    let removed = txn!(db, |txn| {
        let cohorts = course_user_groups::Entity::find()
            .filter(course_user_groups::Column::GroupType.eq(GROUP_TYPE_COHORT))
            .all(txn)
            .await?;
        let course_of: HashMap<Uuid, String> = cohorts
            .into_iter()
            .map(|cohort| (cohort.id, cohort.course_key))
            .collect();
        let memberships = course_user_group_users::Entity::find()
            .filter(course_user_group_users::Column::GroupId.is_in(course_of.keys().copied()))
            .all(txn)
            .await?;

        let mut grouped: BTreeMap<(String, Uuid), Vec<Uuid>> = BTreeMap::new();
        for membership in memberships {
            if let Some(course_key) = course_of.get(&membership.group_id) {
                grouped
                    .entry((course_key.clone(), membership.user_id))
                    .or_default()
                    .push(membership.id);
            }
        }

        let mut removed = 0u64;
        for ((course_key, user_id), membership_ids) in grouped {
            if membership_ids.len() < 2 {
                continue;
            }
            course_user_group_users::Entity::delete_many()
                .filter(course_user_group_users::Column::Id.is_in(membership_ids.clone()))
                .exec(txn)
                .await?;
            let username = users::Entity::find_by_id(user_id)
                .one(txn)
                .await?
                .map(|user| user.username)
                .unwrap_or_default();
            tracing::info!(
                username = %username,
                course_id = %course_key,
                cohorts = membership_ids.len(),
                "removed user from multiple cohorts"
            );
            removed += 1;
        }
        Ok::<_, CoursehubError>(removed)
    })?;
    tracing::info!(removed, "multiple cohort cleanup finished");
    Ok(removed)
}
