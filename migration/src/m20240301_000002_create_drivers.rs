use sea_orm_migration::{prelude::*, schema::*};

use super::m20240301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Driver::Table)
                    .if_not_exists()
                    .col(uuid(Driver::Id).primary_key())
                    .col(uuid(Driver::UserId).not_null().unique_key())
                    .col(string_len(Driver::LicenseNumber, 50).not_null())
                    .col(date(Driver::LicenseExpiry).not_null())
                    .col(integer(Driver::ExperienceYears).not_null().default(0))
                    .col(double(Driver::Rating).not_null().default(5.0))
                    .col(boolean(Driver::IsAvailable).not_null().default(true))
                    .col(
                        timestamp_with_time_zone(Driver::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_driver_user")
                            .from(Driver::Table, Driver::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Driver::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Driver {
    #[sea_orm(iden = "drivers")]
    Table,
    Id,
    UserId,
    LicenseNumber,
    LicenseExpiry,
    ExperienceYears,
    Rating,
    IsAvailable,
    CreatedAt,
}
