use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 全局证书生成开关，只追加不修改，最新一行生效
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "certificate_generation_configurations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub enabled: bool,
    pub changed_by: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        unreachable!("certificate_generation_configurations has no relations")
    }
}

impl ActiveModelBehavior for ActiveModel {}
