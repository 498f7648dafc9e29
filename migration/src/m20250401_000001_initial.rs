use sea_orm_migration::prelude::*;

/// 营地
#[derive(DeriveIden)]
enum Camps {
    Table,
    Id,
    OwnerId,
    Name,
    Address,
    District,
    Province,
    PostalCode,
    Region,
    Tel,
    CreatedAt,
}

/// 营地预订（主单）
#[derive(DeriveIden)]
enum Bookings {
    Table,
    Id,
    UserId,
    CampId,
    Name,
    Surname,
    StartDate,
    EndDate,
    Status,
    CreatedAt,
    UpdatedAt,
}

/// 营地设施目录，amount_booked 为冗余累计值
#[derive(DeriveIden)]
enum CampgroundAmenities {
    Table,
    Id,
    CampgroundId,
    Name,
    Description,
    Quantity,
    Price,
    Status,
    AmountBooked,
    Revision,
    CreatedAt,
    UpdatedAt,
}

/// 设施预订明细
#[derive(DeriveIden)]
enum AmenityBookings {
    Table,
    Id,
    BookingId,
    UserId,
    AmenityId,
    Amount,
    StartDate,
    EndDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Camps::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Camps::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Camps::OwnerId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Camps::Name)
                            .string_len(50)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Camps::Address).string_len(500).not_null())
                    .col(ColumnDef::new(Camps::District).string_len(100).not_null())
                    .col(ColumnDef::new(Camps::Province).string_len(100).not_null())
                    .col(ColumnDef::new(Camps::PostalCode).string_len(5).not_null())
                    .col(ColumnDef::new(Camps::Region).string_len(50).not_null())
                    .col(ColumnDef::new(Camps::Tel).string_len(20).not_null())
                    .col(
                        ColumnDef::new(Camps::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Bookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Bookings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Bookings::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Bookings::CampId).big_integer().not_null())
                    .col(ColumnDef::new(Bookings::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Bookings::Surname).string_len(100).not_null())
                    .col(ColumnDef::new(Bookings::StartDate).date().not_null())
                    .col(ColumnDef::new(Bookings::EndDate).date().not_null())
                    .col(
                        ColumnDef::new(Bookings::Status)
                            .string_len(16)
                            .not_null()
                            .default("booked"),
                    )
                    .col(
                        ColumnDef::new(Bookings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Bookings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bookings_camp")
                            .from(Bookings::Table, Bookings::CampId)
                            .to(Camps::Table, Camps::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bookings_user")
                    .table(Bookings::Table)
                    .col(Bookings::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CampgroundAmenities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CampgroundAmenities::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CampgroundAmenities::CampgroundId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampgroundAmenities::Name)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(CampgroundAmenities::Description).text().null())
                    .col(
                        ColumnDef::new(CampgroundAmenities::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(CampgroundAmenities::Price)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CampgroundAmenities::Status)
                            .string_len(16)
                            .not_null()
                            .default("available"),
                    )
                    .col(
                        ColumnDef::new(CampgroundAmenities::AmountBooked)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CampgroundAmenities::Revision)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CampgroundAmenities::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CampgroundAmenities::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_campground_amenities_camp")
                            .from(CampgroundAmenities::Table, CampgroundAmenities::CampgroundId)
                            .to(Camps::Table, Camps::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_campground_amenities_camp")
                    .table(CampgroundAmenities::Table)
                    .col(CampgroundAmenities::CampgroundId)
                    .to_owned(),
            )
            .await?;

        // 明细不做 ON DELETE CASCADE：删除必须经过台账以同步 amount_booked
        manager
            .create_table(
                Table::create()
                    .table(AmenityBookings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AmenityBookings::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AmenityBookings::BookingId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AmenityBookings::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(AmenityBookings::AmenityId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AmenityBookings::Amount)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(AmenityBookings::StartDate).date().not_null())
                    .col(ColumnDef::new(AmenityBookings::EndDate).date().not_null())
                    .col(
                        ColumnDef::new(AmenityBookings::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AmenityBookings::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_amenity_bookings_booking")
                            .from(AmenityBookings::Table, AmenityBookings::BookingId)
                            .to(Bookings::Table, Bookings::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_amenity_bookings_amenity")
                            .from(AmenityBookings::Table, AmenityBookings::AmenityId)
                            .to(CampgroundAmenities::Table, CampgroundAmenities::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // 区间重叠汇总查询索引
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_amenity_bookings_amenity_range")
                    .table(AmenityBookings::Table)
                    .col(AmenityBookings::AmenityId)
                    .col(AmenityBookings::StartDate)
                    .col(AmenityBookings::EndDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_amenity_bookings_booking")
                    .table(AmenityBookings::Table)
                    .col(AmenityBookings::BookingId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 删除顺序：明细 -> 设施 -> 预订 -> 营地
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(AmenityBookings::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(CampgroundAmenities::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Bookings::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().if_exists().table(Camps::Table).to_owned())
            .await?;

        Ok(())
    }
}
