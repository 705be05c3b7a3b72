//! 证书配置缓存
//!
//! 全局开关、课程开关与 HTML 视图配置都是“最新一行生效”的配置表，
//! 读取频繁而写入极少，这里用带 TTL 的 moka 缓存，写入后主动失效。

use coursehub_common::entities::{
    certificate_generation_configurations, certificate_generation_course_settings,
    certificate_html_view_configurations,
};
use moka::future::Cache;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const GLOBAL_KEY: &str = "global";

#[derive(Clone)]
pub struct SettingsCache {
    flags: Cache<String, bool>,
    html_view: Cache<(), Arc<JsonValue>>,
    html_view_path: Option<PathBuf>,
}

impl SettingsCache {
    pub fn new(ttl: Duration, html_view_path: Option<PathBuf>) -> Self {
        Self {
            flags: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
            html_view: Cache::builder().max_capacity(1).time_to_live(ttl).build(),
            html_view_path,
        }
    }

    /// 全局证书生成开关，未配置时为关闭
    pub async fn global_generation_enabled(&self, db: &DatabaseConnection) -> Result<bool, DbErr> {
        if let Some(cached) = self.flags.get(GLOBAL_KEY).await {
            return Ok(cached);
        }
        let enabled = certificate_generation_configurations::Entity::find()
            .order_by_desc(certificate_generation_configurations::Column::CreatedAt)
            .one(db)
            .await?
            .is_some_and(|row| row.enabled);
        self.flags.insert(GLOBAL_KEY.to_string(), enabled).await;
        Ok(enabled)
    }

    /// 课程级证书生成开关，取该课程最新一行
    pub async fn course_generation_enabled(
        &self,
        db: &DatabaseConnection,
        course_key: &str,
    ) -> Result<bool, DbErr> {
        let cache_key = course_cache_key(course_key);
        if let Some(cached) = self.flags.get(&cache_key).await {
            return Ok(cached);
        }
        let enabled = certificate_generation_course_settings::Entity::find()
            .filter(certificate_generation_course_settings::Column::CourseKey.eq(course_key))
            .order_by_desc(certificate_generation_course_settings::Column::CreatedAt)
            .one(db)
            .await?
            .is_some_and(|row| row.enabled);
        self.flags.insert(cache_key, enabled).await;
        Ok(enabled)
    }

    pub async fn invalidate_global(&self) {
        self.flags.invalidate(GLOBAL_KEY).await;
    }

    pub async fn invalidate_course(&self, course_key: &str) {
        self.flags.invalidate(&course_cache_key(course_key)).await;
    }

    /// 证书 HTML 视图配置
    ///
    /// 数据库最新一行启用且非空时使用它，否则读取配置文件，文件不可读时返回 `{}`。
    pub async fn html_view_configuration(
        &self,
        db: &DatabaseConnection,
    ) -> Result<Arc<JsonValue>, DbErr> {
        if let Some(cached) = self.html_view.get(&()).await {
            return Ok(cached);
        }

        let latest = certificate_html_view_configurations::Entity::find()
            .order_by_desc(certificate_html_view_configurations::Column::CreatedAt)
            .one(db)
            .await?;
        let from_db = latest
            .filter(|row| row.enabled)
            .and_then(|row| serde_json::from_str::<JsonValue>(&row.configuration).ok())
            .filter(|value| !is_empty_config(value));

        let config = match from_db {
            Some(value) => value,
            None => match &self.html_view_path {
                Some(path) => read_config_file(path).await,
                None => JsonValue::Object(Map::new()),
            },
        };
        let config = Arc::new(config);
        self.html_view.insert((), config.clone()).await;
        Ok(config)
    }

    pub async fn invalidate_html_view(&self) {
        self.html_view.invalidate(&()).await;
    }
}

fn course_cache_key(course_key: &str) -> String {
    format!("course:{course_key}")
}

fn is_empty_config(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Object(map) => map.is_empty(),
        _ => false,
    }
}

async fn read_config_file(path: &Path) -> JsonValue {
    let parsed = match tokio::fs::read_to_string(path).await {
        Ok(text) => serde_json::from_str::<JsonValue>(&text).map_err(|err| err.to_string()),
        Err(err) => Err(err.to_string()),
    };
    match parsed {
        Ok(value) if value.is_object() => value,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "certificate view config is not an object");
            JsonValue::Object(Map::new())
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "unable to read certificate view config");
            JsonValue::Object(Map::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;
    use chrono::{Duration as ChronoDuration, Utc};
    use sea_orm::{ActiveModelTrait, Set};
    use serde_json::json;
    use uuid::Uuid;

    async fn add_global(db: &DatabaseConnection, enabled: bool, offset_secs: i64) {
        certificate_generation_configurations::ActiveModel {
            id: Set(Uuid::new_v4()),
            enabled: Set(enabled),
            changed_by: Set(None),
            created_at: Set((Utc::now() + ChronoDuration::seconds(offset_secs)).into()),
        }
        .insert(db)
        .await
        .unwrap();
    }

    async fn add_html_view(db: &DatabaseConnection, enabled: bool, configuration: &str) {
        certificate_html_view_configurations::ActiveModel {
            id: Set(Uuid::new_v4()),
            enabled: Set(enabled),
            configuration: Set(configuration.to_string()),
            changed_by: Set(None),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn latest_global_row_wins_after_invalidation() {
        let db = setup_db().await;
        let cache = SettingsCache::new(Duration::from_secs(60), None);
        assert!(!cache.global_generation_enabled(&db).await.unwrap());

        add_global(&db, true, 0).await;
        // 缓存仍返回旧值
        assert!(!cache.global_generation_enabled(&db).await.unwrap());
        cache.invalidate_global().await;
        assert!(cache.global_generation_enabled(&db).await.unwrap());

        add_global(&db, false, 5).await;
        cache.invalidate_global().await;
        assert!(!cache.global_generation_enabled(&db).await.unwrap());
    }

    #[tokio::test]
    async fn html_view_prefers_enabled_database_row() {
        let db = setup_db().await;
        let cache = SettingsCache::new(Duration::from_secs(60), None);
        assert_eq!(*cache.html_view_configuration(&db).await.unwrap(), json!({}));

        add_html_view(&db, true, r#"{"default": {"company_name": "CourseHub"}}"#).await;
        cache.invalidate_html_view().await;
        let config = cache.html_view_configuration(&db).await.unwrap();
        assert_eq!(config["default"]["company_name"], "CourseHub");
    }

    #[tokio::test]
    async fn html_view_falls_back_to_file() {
        let db = setup_db().await;
        let path = std::env::temp_dir().join(format!("cert-view-{}.json", Uuid::new_v4()));
        tokio::fs::write(&path, r#"{"default": {"platform_name": "From File"}}"#)
            .await
            .unwrap();
        add_html_view(&db, false, r#"{"default": {"platform_name": "Disabled"}}"#).await;

        let cache = SettingsCache::new(Duration::from_secs(60), Some(path.clone()));
        let config = cache.html_view_configuration(&db).await.unwrap();
        assert_eq!(config["default"]["platform_name"], "From File");

        let missing = SettingsCache::new(
            Duration::from_secs(60),
            Some(std::env::temp_dir().join("does-not-exist.json")),
        );
        assert_eq!(*missing.html_view_configuration(&db).await.unwrap(), json!({}));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
