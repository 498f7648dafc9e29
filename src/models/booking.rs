use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{BookingStatus, booking_entity};

/// 预订列表查询参数
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct BookingQuery {
    /// 按营地过滤 (admin / owner 可用)
    pub camp_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateBookingRequest {
    pub name: String,
    pub surname: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateBookingRequest {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingResponse {
    pub id: i64,
    pub user_id: i64,
    pub camp_id: i64,
    pub name: String,
    pub surname: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl From<booking_entity::Model> for BookingResponse {
    fn from(m: booking_entity::Model) -> Self {
        BookingResponse {
            id: m.id,
            user_id: m.user_id,
            camp_id: m.camp_id,
            name: m.name,
            surname: m.surname,
            start_date: m.start_date,
            end_date: m.end_date,
            status: m.status,
            created_at: m.created_at,
        }
    }
}
