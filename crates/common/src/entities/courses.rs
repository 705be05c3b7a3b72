use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub course_key: String,
    pub org: String,
    pub number: String,
    pub run: String,
    pub display_name: String,
    pub enrollment_start: Option<DateTimeWithTimeZone>,
    pub enrollment_end: Option<DateTimeWithTimeZone>,
    pub invite_only: bool,
    /// 等级名 → 最低分数
    pub grade_cutoffs: Json,
    pub cert_html_view_overrides: Json,
    /// `{cohorted, auto_cohort_groups}`
    pub cohort_config: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        unreachable!("courses are referenced by course_key only")
    }
}

impl ActiveModelBehavior for ActiveModel {}
