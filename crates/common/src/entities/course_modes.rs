use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "course_modes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub course_key: String,
    pub mode_slug: String,
    pub mode_display_name: String,
    pub min_price: i32,
    pub suggested_prices: String,
    pub currency: String,
    pub expiration_datetime: Option<DateTimeWithTimeZone>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        unreachable!("course_modes has no relations")
    }
}

impl ActiveModelBehavior for ActiveModel {}
