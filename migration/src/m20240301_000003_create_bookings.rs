use sea_orm_migration::{
    prelude::*,
    schema::*,
    sea_orm::sea_query::extension::postgres::{Type, TypeDropStatement},
};

use super::m20240301_000001_create_users::User;
use super::m20240301_000002_create_drivers::Driver;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(BookingStatus::Enum)
                    .values([
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                        BookingStatus::InProgress,
                        BookingStatus::Completed,
                        BookingStatus::Cancelled,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(ServiceType::Enum)
                    .values([
                        ServiceType::AirportTransfer,
                        ServiceType::Corporate,
                        ServiceType::Wedding,
                        ServiceType::Hourly,
                        ServiceType::Outstation,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(VehicleType::Enum)
                    .values([
                        VehicleType::Sedan,
                        VehicleType::Suv,
                        VehicleType::Hatchback,
                        VehicleType::Luxury,
                        VehicleType::Van,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::CustomerId).not_null())
                    .col(uuid_null(Booking::DriverId))
                    .col(string_len(Booking::PickupLocation, 500).not_null())
                    .col(string_len(Booking::DropoffLocation, 500).not_null())
                    .col(timestamp_with_time_zone(Booking::PickupDatetime).not_null())
                    .col(
                        ColumnDef::new(Booking::ServiceType)
                            .custom(ServiceType::Enum)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Booking::VehicleType)
                            .custom(VehicleType::Enum)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Booking::Status)
                            .custom(BookingStatus::Enum)
                            .not_null(),
                    )
                    .col(double(Booking::DistanceKm).not_null())
                    .col(double_null(Booking::DurationHours))
                    .col(double(Booking::EstimatedFare).not_null())
                    .col(double_null(Booking::ActualFare))
                    .col(text_null(Booking::SpecialInstructions))
                    .col(integer_null(Booking::Rating))
                    .col(text_null(Booking::Feedback))
                    .col(
                        timestamp_with_time_zone(Booking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Booking::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .check(
                        Expr::col(Booking::Rating)
                            .is_null()
                            .or(Expr::col(Booking::Rating).between(1, 5)),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_customer")
                            .from(Booking::Table, Booking::CustomerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_driver")
                            .from(Booking::Table, Booking::DriverId)
                            .to(Driver::Table, Driver::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Dashboards and the request queue filter on these
        for (name, column) in [
            ("idx_booking_customer", Booking::CustomerId),
            ("idx_booking_driver", Booking::DriverId),
            ("idx_booking_status", Booking::Status),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Booking::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await?;

        for statement in drop_enum_types() {
            manager.drop_type(statement).await?;
        }

        Ok(())
    }
}

/// Enum types are dropped after the table that uses them.
fn drop_enum_types() -> [TypeDropStatement; 3] {
    [
        Type::drop().name(BookingStatus::Enum).to_owned(),
        Type::drop().name(ServiceType::Enum).to_owned(),
        Type::drop().name(VehicleType::Enum).to_owned(),
    ]
}

#[derive(DeriveIden)]
pub enum Booking {
    #[sea_orm(iden = "bookings")]
    Table,
    Id,
    CustomerId,
    DriverId,
    PickupLocation,
    DropoffLocation,
    PickupDatetime,
    ServiceType,
    VehicleType,
    Status,
    DistanceKm,
    DurationHours,
    EstimatedFare,
    ActualFare,
    SpecialInstructions,
    Rating,
    Feedback,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum BookingStatus {
    #[sea_orm(iden = "booking_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "confirmed")]
    Confirmed,
    #[sea_orm(iden = "in_progress")]
    InProgress,
    #[sea_orm(iden = "completed")]
    Completed,
    #[sea_orm(iden = "cancelled")]
    Cancelled,
}

#[derive(DeriveIden)]
pub enum ServiceType {
    #[sea_orm(iden = "service_type")]
    Enum,
    #[sea_orm(iden = "airport_transfer")]
    AirportTransfer,
    #[sea_orm(iden = "corporate")]
    Corporate,
    #[sea_orm(iden = "wedding")]
    Wedding,
    #[sea_orm(iden = "hourly")]
    Hourly,
    #[sea_orm(iden = "outstation")]
    Outstation,
}

#[derive(DeriveIden)]
pub enum VehicleType {
    #[sea_orm(iden = "vehicle_type")]
    Enum,
    #[sea_orm(iden = "sedan")]
    Sedan,
    #[sea_orm(iden = "suv")]
    Suv,
    #[sea_orm(iden = "hatchback")]
    Hatchback,
    #[sea_orm(iden = "luxury")]
    Luxury,
    #[sea_orm(iden = "van")]
    Van,
}
