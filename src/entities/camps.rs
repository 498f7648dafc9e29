use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "camps")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// 营地所有者 (owner 角色用户)
    pub owner_id: i64,
    #[sea_orm(unique)]
    pub name: String,
    pub address: String,
    pub district: String,
    pub province: String,
    pub postal_code: String,
    pub region: String,
    pub tel: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
