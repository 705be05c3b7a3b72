use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    /// 已完成身份验证，决定 verified 证书模板
    pub is_verified: bool,
    /// 为 false 时（例如受禁运限制）不发放证书
    pub allow_certificate: bool,
    pub gender: Option<String>,
    pub year_of_birth: Option<i32>,
    pub level_of_education: Option<String>,
    pub goals: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub time_zone: Option<String>,
    pub languages: Json,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub mailing_address: Option<String>,
    pub date_joined: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Enrollments,
    Certificates,
    Preferences,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Enrollments => Entity::has_many(super::course_enrollments::Entity).into(),
            Self::Certificates => Entity::has_many(super::generated_certificates::Entity).into(),
            Self::Preferences => Entity::has_many(super::user_preferences::Entity).into(),
        }
    }
}

impl Related<super::course_enrollments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Enrollments.def()
    }
}

impl Related<super::generated_certificates::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Certificates.def()
    }
}

impl Related<super::user_preferences::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Preferences.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
