use sea_orm_migration::prelude::*;

mod m20260301_000001_accounts;
mod m20260301_000002_courses;
mod m20260301_000003_certificates;
mod m20260301_000004_cohorts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_accounts::Migration),
            Box::new(m20260301_000002_courses::Migration),
            Box::new(m20260301_000003_certificates::Migration),
            Box::new(m20260301_000004_cohorts::Migration),
        ]
    }
}

/// 带默认值的时间戳列，应用写入时总是显式赋值
pub(crate) fn timestamp<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}
