use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{AmenityStatus, amenity_entity};

/// 单个设施可售总量与单条预订数量的上限
pub const MAX_QUANTITY: i32 = 1_000_000;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateAmenityRequest {
    pub name: String,
    pub description: Option<String>,
    /// 可售总量 (默认 1)
    pub quantity: Option<i32>,
    /// 单价 (最小货币单位, 默认 0)
    pub price: Option<i64>,
    pub status: Option<AmenityStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateAmenityRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i32>,
    pub price: Option<i64>,
    pub status: Option<AmenityStatus>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AmenityResponse {
    pub id: i64,
    pub campground_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub price: i64,
    pub status: AmenityStatus,
    /// 已订总量 (冗余缓存)
    pub amount_booked: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<amenity_entity::Model> for AmenityResponse {
    fn from(m: amenity_entity::Model) -> Self {
        AmenityResponse {
            id: m.id,
            campground_id: m.campground_id,
            name: m.name,
            description: m.description,
            quantity: m.quantity,
            price: m.price,
            status: m.status,
            amount_booked: m.amount_booked,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// 可用量查询参数, 缺省端视为无界
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct AvailabilityQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub amenity_id: i64,
    pub name: String,
    pub total_quantity: i32,
    pub total_booked: i64,
    pub available: i32,
}

/// 计数器对账结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    pub amenity_id: i64,
    /// 对账前的缓存值
    pub cached: i64,
    /// 按明细重新汇总的实际值
    pub actual: i64,
    /// 是否发生了修正
    pub corrected: bool,
}
