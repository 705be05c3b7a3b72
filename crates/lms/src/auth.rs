//! 请求身份
//!
//! 登录由前置代理完成，代理通过 `X-Remote-User` 传入用户名；
//! 服务间调用携带 `X-Edx-Api-Key`。

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use coursehub_common::AppConfig;
use coursehub_common::entities::users;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

pub const REMOTE_USER_HEADER: &str = "x-remote-user";
pub const API_KEY_HEADER: &str = "x-edx-api-key";

#[derive(Debug, Clone)]
pub struct Caller {
    pub user: Option<users::Model>,
    pub has_api_key: bool,
}

impl Caller {
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }

    pub fn require_user(&self) -> Result<&users::Model, AppError> {
        self.user.as_ref().ok_or(AppError::Unauthorized)
    }

    /// 身份或 API key 至少其一
    pub fn require_identified(&self) -> Result<(), AppError> {
        if self.user.is_some() || self.has_api_key {
            Ok(())
        } else {
            Err(AppError::Unauthorized)
        }
    }

    pub fn is_staff(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.is_staff)
    }

    /// 是否可以代 `username` 操作：本人或持有 API key
    pub fn can_act_for(&self, username: &str) -> bool {
        self.has_api_key || self.username() == Some(username)
    }

    pub fn require_staff_or_key(&self) -> Result<(), AppError> {
        if self.has_api_key || self.is_staff() {
            Ok(())
        } else if self.user.is_none() {
            Err(AppError::Unauthorized)
        } else {
            Err(AppError::forbidden("staff access required"))
        }
    }

    pub fn require_api_key(&self) -> Result<(), AppError> {
        if self.has_api_key {
            Ok(())
        } else if self.user.is_none() {
            Err(AppError::Unauthorized)
        } else {
            Err(AppError::forbidden("API key required"))
        }
    }
}

/// 调试模式且未配置 key 时放行；否则请求头必须与配置一致
pub fn api_key_permitted(config: &AppConfig, presented: Option<&str>) -> bool {
    match &config.api_key {
        None => config.debug,
        Some(key) => presented == Some(key.as_str()),
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());
        let has_api_key = api_key_permitted(&state.config, presented);

        let username = parts
            .headers
            .get(REMOTE_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let user = match username {
            Some(username) => {
                let found = users::Entity::find()
                    .filter(users::Column::Username.eq(username))
                    .filter(users::Column::IsActive.eq(true))
                    .one(&state.db)
                    .await?;
                if found.is_none() {
                    tracing::debug!(username = %username, "remote user not found, treating as anonymous");
                }
                found
            }
            None => None,
        };

        Ok(Self { user, has_api_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_rules() {
        let mut config = AppConfig::for_database("sqlite::memory:");
        assert!(!api_key_permitted(&config, None));

        config.debug = true;
        assert!(api_key_permitted(&config, None));

        config.api_key = Some("secret".to_string());
        assert!(!api_key_permitted(&config, None));
        assert!(!api_key_permitted(&config, Some("wrong")));
        assert!(api_key_permitted(&config, Some("secret")));
    }

    #[test]
    fn staff_or_key_distinguishes_anonymous() {
        let anonymous = Caller {
            user: None,
            has_api_key: false,
        };
        assert!(matches!(
            anonymous.require_staff_or_key(),
            Err(AppError::Unauthorized)
        ));
        let service = Caller {
            user: None,
            has_api_key: true,
        };
        assert!(service.require_staff_or_key().is_ok());
        assert!(service.can_act_for("anyone"));
    }
}
