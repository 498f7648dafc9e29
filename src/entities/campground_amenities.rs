use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum AmenityStatus {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "maintenance")]
    Maintenance,
    #[sea_orm(string_value = "unavailable")]
    Unavailable,
}

impl std::fmt::Display for AmenityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AmenityStatus::Available => write!(f, "available"),
            AmenityStatus::Maintenance => write!(f, "maintenance"),
            AmenityStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// 营地设施目录
/// 概念说明:
/// - quantity: 可售总量
/// - amount_booked: 所有设施预订明细 amount 之和的冗余缓存, 只由台账在事务内维护
/// - revision: 乐观锁版本号, 每次写 amount_booked 时 +1
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "campground_amenities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub campground_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub price: i64,
    pub status: AmenityStatus,
    pub amount_booked: i64,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// 指定已订数量下的剩余可订量, 取值范围 [0, quantity]
    pub fn headroom(&self, booked: i64) -> i32 {
        let quantity = i64::from(self.quantity);
        i32::try_from((quantity - booked).min(quantity).max(0)).unwrap_or(0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::camps::Entity",
        from = "Column::CampgroundId",
        to = "super::camps::Column::Id"
    )]
    Camp,
}

impl Related<super::camps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Camp.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
