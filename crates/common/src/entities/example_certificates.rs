use crate::status::ExampleCertificateStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "example_certificates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub example_cert_set_id: Uuid,
    /// 课程模式 slug
    pub description: String,
    #[sea_orm(unique)]
    pub uuid: String,
    pub access_key: String,
    pub full_name: String,
    pub template: String,
    pub status: String,
    pub error_reason: Option<String>,
    pub download_url: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn status(&self) -> ExampleCertificateStatus {
        self.status.parse().unwrap_or(ExampleCertificateStatus::Started)
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    CertificateSet,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::CertificateSet => Entity::belongs_to(super::example_certificate_sets::Entity)
                .from(Column::ExampleCertSetId)
                .to(super::example_certificate_sets::Column::Id)
                .into(),
        }
    }
}

impl Related<super::example_certificate_sets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CertificateSet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
