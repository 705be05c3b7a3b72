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
                    .table(GeneratedCertificates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GeneratedCertificates::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GeneratedCertificates::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(GeneratedCertificates::CourseKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GeneratedCertificates::Status)
                            .string_len(32)
                            .not_null()
                            .default("unavailable"),
                    )
                    .col(
                        ColumnDef::new(GeneratedCertificates::Mode)
                            .string_len(32)
                            .not_null()
                            .default("honor"),
                    )
                    .col(text_col(GeneratedCertificates::Grade))
                    .col(text_col(GeneratedCertificates::Key))
                    .col(text_col(GeneratedCertificates::DownloadUrl))
                    .col(text_col(GeneratedCertificates::DownloadUuid))
                    .col(text_col(GeneratedCertificates::VerifyUuid))
                    .col(text_col(GeneratedCertificates::Name))
                    .col(
                        ColumnDef::new(GeneratedCertificates::Distinction)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(text_col(GeneratedCertificates::ErrorReason))
                    .col(timestamp(GeneratedCertificates::CreatedAt))
                    .col(timestamp(GeneratedCertificates::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_generated_certificates_user")
                            .from(GeneratedCertificates::Table, GeneratedCertificates::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("generated_certificates_user_course_uniq")
                    .table(GeneratedCertificates::Table)
                    .col(GeneratedCertificates::UserId)
                    .col(GeneratedCertificates::CourseKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CertificateWhitelist::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CertificateWhitelist::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CertificateWhitelist::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(CertificateWhitelist::CourseKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CertificateWhitelist::Whitelist)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(timestamp(CertificateWhitelist::CreatedAt))
                    .col(timestamp(CertificateWhitelist::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_certificate_whitelist_user")
                            .from(CertificateWhitelist::Table, CertificateWhitelist::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("certificate_whitelist_user_course_idx")
                    .table(CertificateWhitelist::Table)
                    .col(CertificateWhitelist::UserId)
                    .col(CertificateWhitelist::CourseKey)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExampleCertificateSets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExampleCertificateSets::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExampleCertificateSets::CourseKey)
                            .string()
                            .not_null(),
                    )
                    .col(timestamp(ExampleCertificateSets::CreatedAt))
                    .col(timestamp(ExampleCertificateSets::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("example_certificate_sets_course_idx")
                    .table(ExampleCertificateSets::Table)
                    .col(ExampleCertificateSets::CourseKey)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ExampleCertificates::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExampleCertificates::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExampleCertificates::ExampleCertSetId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExampleCertificates::Description)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExampleCertificates::Uuid)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ExampleCertificates::AccessKey)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExampleCertificates::FullName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExampleCertificates::Template)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExampleCertificates::Status)
                            .string_len(32)
                            .not_null()
                            .default("started"),
                    )
                    .col(ColumnDef::new(ExampleCertificates::ErrorReason).text())
                    .col(ColumnDef::new(ExampleCertificates::DownloadUrl).string())
                    .col(timestamp(ExampleCertificates::CreatedAt))
                    .col(timestamp(ExampleCertificates::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_example_certificates_set")
                            .from(
                                ExampleCertificates::Table,
                                ExampleCertificates::ExampleCertSetId,
                            )
                            .to(ExampleCertificateSets::Table, ExampleCertificateSets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("example_certificates_uuid_key_idx")
                    .table(ExampleCertificates::Table)
                    .col(ExampleCertificates::Uuid)
                    .col(ExampleCertificates::AccessKey)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CertificateGenerationConfigurations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CertificateGenerationConfigurations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CertificateGenerationConfigurations::Enabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(CertificateGenerationConfigurations::ChangedBy).string())
                    .col(timestamp(CertificateGenerationConfigurations::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CertificateGenerationCourseSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CertificateGenerationCourseSettings::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CertificateGenerationCourseSettings::CourseKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CertificateGenerationCourseSettings::Enabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(timestamp(CertificateGenerationCourseSettings::CreatedAt))
                    .col(timestamp(CertificateGenerationCourseSettings::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("certificate_generation_course_settings_course_idx")
                    .table(CertificateGenerationCourseSettings::Table)
                    .col(CertificateGenerationCourseSettings::CourseKey)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CertificateHtmlViewConfigurations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CertificateHtmlViewConfigurations::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CertificateHtmlViewConfigurations::Enabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CertificateHtmlViewConfigurations::Configuration)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CertificateHtmlViewConfigurations::ChangedBy).string())
                    .col(timestamp(CertificateHtmlViewConfigurations::CreatedAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            CertificateHtmlViewConfigurations::Table.into_iden(),
            CertificateGenerationCourseSettings::Table.into_iden(),
            CertificateGenerationConfigurations::Table.into_iden(),
            ExampleCertificates::Table.into_iden(),
            ExampleCertificateSets::Table.into_iden(),
            CertificateWhitelist::Table.into_iden(),
            GeneratedCertificates::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        Ok(())
    }
}

fn text_col<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col).string().not_null().default("").to_owned()
}

#[derive(Iden)]
enum GeneratedCertificates {
    Table,
    Id,
    UserId,
    CourseKey,
    Status,
    Mode,
    Grade,
    Key,
    DownloadUrl,
    DownloadUuid,
    VerifyUuid,
    Name,
    Distinction,
    ErrorReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CertificateWhitelist {
    Table,
    Id,
    UserId,
    CourseKey,
    Whitelist,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ExampleCertificateSets {
    Table,
    Id,
    CourseKey,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ExampleCertificates {
    Table,
    Id,
    ExampleCertSetId,
    Description,
    Uuid,
    AccessKey,
    FullName,
    Template,
    Status,
    ErrorReason,
    DownloadUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CertificateGenerationConfigurations {
    Table,
    Id,
    Enabled,
    ChangedBy,
    CreatedAt,
}

#[derive(Iden)]
enum CertificateGenerationCourseSettings {
    Table,
    Id,
    CourseKey,
    Enabled,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum CertificateHtmlViewConfigurations {
    Table,
    Id,
    Enabled,
    Configuration,
    ChangedBy,
    CreatedAt,
}
