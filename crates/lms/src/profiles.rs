//! 账户信息与公开资料

use crate::auth::Caller;
use crate::error::AppError;
use crate::lookup::find_user;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use coursehub_common::ProfileVisibility;
use coursehub_common::entities::{user_preferences, users};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::{Map, Value as JsonValue, json};

type ApiResult<T> = std::result::Result<T, AppError>;

pub const PROFILE_VISIBILITY_PREF_KEY: &str = "profile_privacy";

fn non_empty(value: &Option<String>) -> JsonValue {
    match value.as_deref() {
        Some("") | None => JsonValue::Null,
        Some(v) => JsonValue::String(v.to_string()),
    }
}

/// 未设置过的语言列表显示为 null
fn languages(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Array(items) if items.is_empty() => JsonValue::Null,
        other => other.clone(),
    }
}

/// 账户的 11 个字段；`language` 原样返回，其余空字符串显示为 null
fn serialize_account(user: &users::Model) -> Map<String, JsonValue> {
    let account = json!({
        "username": user.username,
        "name": user.name,
        "email": user.email,
        "date_joined": user.date_joined.to_rfc3339(),
        "gender": non_empty(&user.gender),
        "year_of_birth": user.year_of_birth,
        "level_of_education": non_empty(&user.level_of_education),
        "goals": non_empty(&user.goals),
        "country": non_empty(&user.country),
        "language": user.language,
        "mailing_address": non_empty(&user.mailing_address),
    });
    match account {
        JsonValue::Object(fields) => fields,
        _ => Map::new(),
    }
}

fn serialize_profile_source(user: &users::Model) -> Map<String, JsonValue> {
    let mut fields = serialize_account(user);
    fields.insert("profile_image".into(), non_empty(&user.profile_image));
    fields.insert("time_zone".into(), non_empty(&user.time_zone));
    fields.insert("bio".into(), non_empty(&user.bio));
    fields.insert("languages".into(), languages(&user.languages));
    fields
}

async fn profile_visibility(
    db: &DatabaseConnection,
    user: &users::Model,
    default: ProfileVisibility,
) -> ApiResult<ProfileVisibility> {
    let preference = user_preferences::Entity::find()
        .filter(user_preferences::Column::UserId.eq(user.id))
        .filter(user_preferences::Column::Key.eq(PROFILE_VISIBILITY_PREF_KEY))
        .one(db)
        .await?;
    Ok(match preference {
        Some(row) if !row.value.is_empty() => {
            if row.value == ProfileVisibility::AllUsers.as_str() {
                ProfileVisibility::AllUsers
            } else {
                ProfileVisibility::Private
            }
        }
        _ => default,
    })
}

/// `GET /api/user/v0/accounts/{username}`
///
/// 仅本人或管理员可见，其余情况一律 404。
pub async fn get_account(
    State(state): State<AppState>,
    caller: Caller,
    Path(username): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    caller.require_identified()?;
    if !caller.can_act_for(&username) && !caller.is_staff() {
        return Err(AppError::not_found(format!("account '{username}' not found")));
    }
    let user = find_user(&state.db, &username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("account '{username}' not found")))?;
    Ok(Json(JsonValue::Object(serialize_account(&user))))
}

/// `GET /api/user/v0/profiles/{username}`
pub async fn get_profile(
    State(state): State<AppState>,
    caller: Caller,
    Path(username): Path<String>,
) -> ApiResult<Json<JsonValue>> {
    caller.require_user()?;
    let user = find_user(&state.db, &username)
        .await?
        .ok_or_else(|| AppError::not_found(format!("profile '{username}' not found")))?;

    let visibility =
        profile_visibility(&state.db, &user, state.config.default_profile_visibility).await?;
    let public_fields = match visibility {
        ProfileVisibility::AllUsers => &state.config.shared_profile_fields,
        ProfileVisibility::Private => &state.config.private_profile_fields,
    };

    let source = serialize_profile_source(&user);
    let profile: Map<String, JsonValue> = public_fields
        .iter()
        .map(|field| {
            let value = source.get(field).cloned().unwrap_or(JsonValue::Null);
            (field.clone(), value)
        })
        .collect();
    Ok(Json(JsonValue::Object(profile)))
}
