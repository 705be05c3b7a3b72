use crate::m20260301_000001_accounts::Users;
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
                    .table(CourseUserGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CourseUserGroups::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CourseUserGroups::CourseKey).string().not_null())
                    .col(ColumnDef::new(CourseUserGroups::Name).string().not_null())
                    .col(
                        ColumnDef::new(CourseUserGroups::GroupType)
                            .string_len(20)
                            .not_null()
                            .default("cohort"),
                    )
                    .col(timestamp(CourseUserGroups::CreatedAt))
                    .col(timestamp(CourseUserGroups::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("course_user_groups_course_name_uniq")
                    .table(CourseUserGroups::Table)
                    .col(CourseUserGroups::CourseKey)
                    .col(CourseUserGroups::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CourseUserGroupUsers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CourseUserGroupUsers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CourseUserGroupUsers::GroupId).uuid().not_null())
                    .col(ColumnDef::new(CourseUserGroupUsers::UserId).uuid().not_null())
                    .col(timestamp(CourseUserGroupUsers::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_user_group_users_group")
                            .from(CourseUserGroupUsers::Table, CourseUserGroupUsers::GroupId)
                            .to(CourseUserGroups::Table, CourseUserGroups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_user_group_users_user")
                            .from(CourseUserGroupUsers::Table, CourseUserGroupUsers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("course_user_group_users_group_user_uniq")
                    .table(CourseUserGroupUsers::Table)
                    .col(CourseUserGroupUsers::GroupId)
                    .col(CourseUserGroupUsers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CourseUserGroupUsers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CourseUserGroups::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum CourseUserGroups {
    Table,
    Id,
    CourseKey,
    Name,
    GroupType,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CourseUserGroupUsers {
    Table,
    Id,
    GroupId,
    UserId,
    CreatedAt,
}
