use crate::status::CertificateStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 每个 (用户, 课程) 至多一张证书
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "generated_certificates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_key: String,
    pub status: String,
    pub mode: String,
    pub grade: String,
    /// 队列任务密钥，回调时校验
    pub key: String,
    pub download_url: String,
    pub download_uuid: String,
    pub verify_uuid: String,
    pub name: String,
    pub distinction: bool,
    pub error_reason: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// 解析状态列，未知值按 `unavailable` 处理
    pub fn status(&self) -> CertificateStatus {
        self.status.parse().unwrap_or(CertificateStatus::Unavailable)
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    User,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::User => Entity::belongs_to(super::users::Entity)
                .from(Column::UserId)
                .to(super::users::Column::Id)
                .into(),
        }
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
