use coursehub_common::entities::{courses, users};
use coursehub_common::{CourseKey, CoursehubError, Result};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

pub async fn find_course(db: &DatabaseConnection, course_key: &str) -> Result<Option<courses::Model>> {
    Ok(courses::Entity::find()
        .filter(courses::Column::CourseKey.eq(course_key))
        .one(db)
        .await?)
}

/// 解析课程标识并加载课程；格式错误与课程不存在分别返回不同错误
pub async fn require_course(db: &DatabaseConnection, raw: &str) -> Result<courses::Model> {
    let key = CourseKey::parse(raw)?;
    find_course(db, &key.to_string())
        .await?
        .ok_or_else(|| CoursehubError::CourseNotFound(key.to_string()))
}

pub async fn find_user(db: &DatabaseConnection, username: &str) -> Result<Option<users::Model>> {
    Ok(users::Entity::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await?)
}

pub async fn require_user(db: &DatabaseConnection, username: &str) -> Result<users::Model> {
    find_user(db, username)
        .await?
        .ok_or_else(|| CoursehubError::UserNotFound(username.to_string()))
}
