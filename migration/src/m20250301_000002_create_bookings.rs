use sea_orm_migration::{prelude::*, schema::*, sea_orm::sea_query::extension::postgres::Type};

use super::m20250301_000001_create_users::User;

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
                        BookingStatus::Requested,
                        BookingStatus::PendingPayment,
                        BookingStatus::Accepted,
                        BookingStatus::Started,
                        BookingStatus::Completed,
                        BookingStatus::Cancelled,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(RideType::Enum)
                    .values([RideType::Economy, RideType::Standard, RideType::Premium])
                    .to_owned(),
            )
            .await?;

        manager
            .create_type(
                Type::create()
                    .as_enum(PaymentMethod::Enum)
                    .values([PaymentMethod::Online, PaymentMethod::Cash])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::RiderId).not_null())
                    .col(uuid_null(Booking::DriverId))
                    .col(string_len(Booking::PickupAddress, 255).not_null())
                    .col(double(Booking::PickupLng).not_null())
                    .col(double(Booking::PickupLat).not_null())
                    .col(string_len(Booking::DestAddress, 255).not_null())
                    .col(double(Booking::DestLng).not_null())
                    .col(double(Booking::DestLat).not_null())
                    .col(
                        ColumnDef::new(Booking::RideType)
                            .custom(RideType::Enum)
                            .not_null(),
                    )
                    .col(big_integer(Booking::Fare).not_null().default(0))
                    .col(double(Booking::DistanceKm).not_null().default(0.0))
                    .col(integer(Booking::EstimatedTimeMin).not_null().default(0))
                    .col(
                        ColumnDef::new(Booking::PaymentMethod)
                            .custom(PaymentMethod::Enum)
                            .not_null(),
                    )
                    .col(uuid_null(Booking::PaymentId))
                    .col(
                        ColumnDef::new(Booking::Status)
                            .custom(BookingStatus::Enum)
                            .not_null(),
                    )
                    .col(string_len_null(Booking::Otp, 6))
                    .col(timestamp_with_time_zone_null(Booking::OtpExpiresAt))
                    .col(boolean(Booking::OtpVerified).not_null().default(false))
                    .col(
                        timestamp_with_time_zone(Booking::RequestedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Booking::StartedAt))
                    .col(timestamp_with_time_zone_null(Booking::CompletedAt))
                    .col(timestamp_with_time_zone_null(Booking::CancelledAt))
                    .col(string_len_null(Booking::CancellationReason, 255))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_rider")
                            .from(Booking::Table, Booking::RiderId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_driver")
                            .from(Booking::Table, Booking::DriverId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Driver dashboard aggregates over (driver, status, completed_at)
        manager
            .create_index(
                Index::create()
                    .name("idx_booking_driver_status")
                    .table(Booking::Table)
                    .col(Booking::DriverId)
                    .col(Booking::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_booking_rider")
                    .table(Booking::Table)
                    .col(Booking::RiderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(BookingStatus::Enum).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(RideType::Enum).to_owned())
            .await?;
        manager
            .drop_type(Type::drop().name(PaymentMethod::Enum).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    RiderId,
    DriverId,
    PickupAddress,
    PickupLng,
    PickupLat,
    DestAddress,
    DestLng,
    DestLat,
    RideType,
    Fare,
    DistanceKm,
    EstimatedTimeMin,
    PaymentMethod,
    PaymentId,
    Status,
    Otp,
    OtpExpiresAt,
    OtpVerified,
    RequestedAt,
    StartedAt,
    CompletedAt,
    CancelledAt,
    CancellationReason,
}

#[derive(DeriveIden)]
pub enum BookingStatus {
    #[sea_orm(iden = "booking_status")]
    Enum,
    #[sea_orm(iden = "requested")]
    Requested,
    #[sea_orm(iden = "pending_payment")]
    PendingPayment,
    #[sea_orm(iden = "accepted")]
    Accepted,
    #[sea_orm(iden = "started")]
    Started,
    #[sea_orm(iden = "completed")]
    Completed,
    #[sea_orm(iden = "cancelled")]
    Cancelled,
}

#[derive(DeriveIden)]
pub enum RideType {
    #[sea_orm(iden = "ride_type")]
    Enum,
    #[sea_orm(iden = "economy")]
    Economy,
    #[sea_orm(iden = "standard")]
    Standard,
    #[sea_orm(iden = "premium")]
    Premium,
}

#[derive(DeriveIden)]
pub enum PaymentMethod {
    #[sea_orm(iden = "payment_method")]
    Enum,
    #[sea_orm(iden = "online")]
    Online,
    #[sea_orm(iden = "cash")]
    Cash,
}
