use crate::timestamp;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Users::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(ColumnDef::new(Users::Name).string().not_null().default(""))
                    .col(ColumnDef::new(Users::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Users::IsStaff).boolean().not_null().default(false))
                    .col(ColumnDef::new(Users::IsVerified).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Users::AllowCertificate)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Users::Gender).string())
                    .col(ColumnDef::new(Users::YearOfBirth).integer())
                    .col(ColumnDef::new(Users::LevelOfEducation).string())
                    .col(ColumnDef::new(Users::Goals).text())
                    .col(ColumnDef::new(Users::Country).string_len(2))
                    .col(ColumnDef::new(Users::Language).string())
                    .col(ColumnDef::new(Users::TimeZone).string())
                    .col(ColumnDef::new(Users::Languages).json_binary().not_null())
                    .col(ColumnDef::new(Users::Bio).text())
                    .col(ColumnDef::new(Users::ProfileImage).string())
                    .col(ColumnDef::new(Users::MailingAddress).text())
                    .col(timestamp(Users::DateJoined))
                    .col(timestamp(Users::CreatedAt))
                    .col(timestamp(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserPreferences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserPreferences::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UserPreferences::UserId).uuid().not_null())
                    .col(ColumnDef::new(UserPreferences::Key).string().not_null())
                    .col(ColumnDef::new(UserPreferences::Value).text().not_null())
                    .col(timestamp(UserPreferences::CreatedAt))
                    .col(timestamp(UserPreferences::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_preferences_user")
                            .from(UserPreferences::Table, UserPreferences::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("user_preferences_user_key_uniq")
                    .table(UserPreferences::Table)
                    .col(UserPreferences::UserId)
                    .col(UserPreferences::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserOrgTags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserOrgTags::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(UserOrgTags::UserId).uuid().not_null())
                    .col(ColumnDef::new(UserOrgTags::Org).string().not_null())
                    .col(ColumnDef::new(UserOrgTags::Key).string().not_null())
                    .col(ColumnDef::new(UserOrgTags::Value).text().not_null())
                    .col(timestamp(UserOrgTags::CreatedAt))
                    .col(timestamp(UserOrgTags::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_org_tags_user")
                            .from(UserOrgTags::Table, UserOrgTags::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("user_org_tags_user_org_key_uniq")
                    .table(UserOrgTags::Table)
                    .col(UserOrgTags::UserId)
                    .col(UserOrgTags::Org)
                    .col(UserOrgTags::Key)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserOrgTags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserPreferences::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
pub(crate) enum Users {
    Table,
    Id,
    Username,
    Email,
    Name,
    IsActive,
    IsStaff,
    IsVerified,
    AllowCertificate,
    Gender,
    YearOfBirth,
    LevelOfEducation,
    Goals,
    Country,
    Language,
    TimeZone,
    Languages,
    Bio,
    ProfileImage,
    MailingAddress,
    DateJoined,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum UserPreferences {
    Table,
    Id,
    UserId,
    Key,
    Value,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum UserOrgTags {
    Table,
    Id,
    UserId,
    Org,
    Key,
    Value,
    CreatedAt,
    UpdatedAt,
}
