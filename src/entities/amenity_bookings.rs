use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;

/// 设施预订明细, 日期区间为闭区间 [start_date, end_date]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "amenity_bookings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub booking_id: i64,
    pub user_id: i64,
    pub amenity_id: i64,
    pub amount: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bookings::Entity",
        from = "Column::BookingId",
        to = "super::bookings::Column::Id"
    )]
    Booking,
    #[sea_orm(
        belongs_to = "super::campground_amenities::Entity",
        from = "Column::AmenityId",
        to = "super::campground_amenities::Column::Id"
    )]
    Amenity,
}

impl Related<super::bookings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl Related<super::campground_amenities::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Amenity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
