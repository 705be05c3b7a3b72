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
                    .table(Courses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Courses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Courses::CourseKey).string().not_null().unique_key())
                    .col(ColumnDef::new(Courses::Org).string().not_null())
                    .col(ColumnDef::new(Courses::Number).string().not_null())
                    .col(ColumnDef::new(Courses::Run).string().not_null())
                    .col(ColumnDef::new(Courses::DisplayName).string().not_null())
                    .col(ColumnDef::new(Courses::EnrollmentStart).timestamp_with_time_zone())
                    .col(ColumnDef::new(Courses::EnrollmentEnd).timestamp_with_time_zone())
                    .col(ColumnDef::new(Courses::InviteOnly).boolean().not_null().default(false))
                    .col(ColumnDef::new(Courses::GradeCutoffs).json_binary().not_null())
                    .col(
                        ColumnDef::new(Courses::CertHtmlViewOverrides)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Courses::CohortConfig).json_binary().not_null())
                    .col(timestamp(Courses::CreatedAt))
                    .col(timestamp(Courses::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CourseModes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CourseModes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CourseModes::CourseKey).string().not_null())
                    .col(ColumnDef::new(CourseModes::ModeSlug).string().not_null())
                    .col(ColumnDef::new(CourseModes::ModeDisplayName).string().not_null())
                    .col(ColumnDef::new(CourseModes::MinPrice).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(CourseModes::SuggestedPrices)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(CourseModes::Currency)
                            .string()
                            .not_null()
                            .default("usd"),
                    )
                    .col(ColumnDef::new(CourseModes::ExpirationDatetime).timestamp_with_time_zone())
                    .col(ColumnDef::new(CourseModes::Description).text())
                    .col(ColumnDef::new(CourseModes::Sku).string())
                    .col(timestamp(CourseModes::CreatedAt))
                    .col(timestamp(CourseModes::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("course_modes_course_slug_uniq")
                    .table(CourseModes::Table)
                    .col(CourseModes::CourseKey)
                    .col(CourseModes::ModeSlug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CourseEnrollments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CourseEnrollments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CourseEnrollments::UserId).uuid().not_null())
                    .col(ColumnDef::new(CourseEnrollments::CourseKey).string().not_null())
                    .col(ColumnDef::new(CourseEnrollments::Mode).string().not_null())
                    .col(
                        ColumnDef::new(CourseEnrollments::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(timestamp(CourseEnrollments::CreatedAt))
                    .col(timestamp(CourseEnrollments::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_enrollments_user")
                            .from(CourseEnrollments::Table, CourseEnrollments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("course_enrollments_user_course_uniq")
                    .table(CourseEnrollments::Table)
                    .col(CourseEnrollments::UserId)
                    .col(CourseEnrollments::CourseKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CourseGrades::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CourseGrades::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CourseGrades::UserId).uuid().not_null())
                    .col(ColumnDef::new(CourseGrades::CourseKey).string().not_null())
                    .col(ColumnDef::new(CourseGrades::Percent).double().not_null())
                    .col(timestamp(CourseGrades::CreatedAt))
                    .col(timestamp(CourseGrades::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_course_grades_user")
                            .from(CourseGrades::Table, CourseGrades::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("course_grades_user_course_uniq")
                    .table(CourseGrades::Table)
                    .col(CourseGrades::UserId)
                    .col(CourseGrades::CourseKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RestrictedCourses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RestrictedCourses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RestrictedCourses::CourseKey)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(RestrictedCourses::BlockedCountries)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RestrictedCourses::MessageUrl).string().not_null())
                    .col(timestamp(RestrictedCourses::CreatedAt))
                    .col(timestamp(RestrictedCourses::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RestrictedCourses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CourseGrades::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CourseEnrollments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CourseModes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Courses::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Courses {
    Table,
    Id,
    CourseKey,
    Org,
    Number,
    Run,
    DisplayName,
    EnrollmentStart,
    EnrollmentEnd,
    InviteOnly,
    GradeCutoffs,
    CertHtmlViewOverrides,
    CohortConfig,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CourseModes {
    Table,
    Id,
    CourseKey,
    ModeSlug,
    ModeDisplayName,
    MinPrice,
    SuggestedPrices,
    Currency,
    ExpirationDatetime,
    Description,
    Sku,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CourseEnrollments {
    Table,
    Id,
    UserId,
    CourseKey,
    Mode,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CourseGrades {
    Table,
    Id,
    UserId,
    CourseKey,
    Percent,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum RestrictedCourses {
    Table,
    Id,
    CourseKey,
    BlockedCountries,
    MessageUrl,
    CreatedAt,
    UpdatedAt,
}
