use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::amenity_booking_entity;

use super::{AmenityResponse, BookingResponse};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateAmenityBookingRequest {
    /// 预订数量 (默认 1)
    pub amount: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// 未提供的字段沿用当前值
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateAmenityBookingRequest {
    pub amount: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub amenity_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AmenityBookingResponse {
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

impl From<amenity_booking_entity::Model> for AmenityBookingResponse {
    fn from(m: amenity_booking_entity::Model) -> Self {
        AmenityBookingResponse {
            id: m.id,
            booking_id: m.booking_id,
            user_id: m.user_id,
            amenity_id: m.amenity_id,
            amount: m.amount,
            start_date: m.start_date,
            end_date: m.end_date,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// 单条明细详情, 附带所属预订与设施
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AmenityBookingDetailResponse {
    #[serde(flatten)]
    pub entry: AmenityBookingResponse,
    pub booking: Option<BookingResponse>,
    pub amenity: Option<AmenityResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreatedAmenityBookingResponse {
    #[serde(rename = "_id")]
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReleasedAmenityBookingsResponse {
    pub count: u64,
    pub message: String,
}
