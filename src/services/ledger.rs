//! 设施可用量台账的事务内原语
//!
//! 所有写操作遵循同一顺序: 锁定设施行 -> 在事务内重算区间已订量 -> 写明细 ->
//! 以 revision 做 CAS 写回 amount_booked。CAS 失败说明有并发写入, 调用方回滚并重试。

use crate::entities::{amenity_booking_entity as entries, amenity_entity as amenities};
use crate::error::{AppError, AppResult};
use crate::utils::DateWindow;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect, SqlErr,
};
use std::future::Future;

/// 与窗口重叠的明细 amount 之和
/// 闭区间 [s,e] 与窗口 [ws,we] 重叠: s <= we && e >= ws, 缺省端不加条件
pub async fn booked_amount<C: ConnectionTrait>(
    conn: &C,
    amenity_id: i64,
    window: &DateWindow,
    exclude_entry: Option<i64>,
) -> Result<i64, DbErr> {
    #[derive(Debug, sea_orm::FromQueryResult)]
    struct SumRow {
        total: Option<i64>,
    }

    let mut query = entries::Entity::find().filter(entries::Column::AmenityId.eq(amenity_id));
    if let Some(end) = window.end {
        query = query.filter(entries::Column::StartDate.lte(end));
    }
    if let Some(start) = window.start {
        query = query.filter(entries::Column::EndDate.gte(start));
    }
    if let Some(id) = exclude_entry {
        query = query.filter(entries::Column::Id.ne(id));
    }

    let total = query
        .select_only()
        .column_as(Expr::col(entries::Column::Amount).sum(), "total")
        .into_model::<SumRow>()
        .one(conn)
        .await?
        .and_then(|r| r.total)
        .unwrap_or(0);

    Ok(total)
}

/// 读取并锁定设施行 (PostgreSQL: SELECT ... FOR UPDATE)
pub async fn lock_amenity<C: ConnectionTrait>(
    conn: &C,
    amenity_id: i64,
) -> Result<Option<amenities::Model>, DbErr> {
    amenities::Entity::find_by_id(amenity_id)
        .lock_exclusive()
        .one(conn)
        .await
}

/// 按 id 升序锁定多个设施, 避免两个事务交叉加锁
pub async fn lock_amenities<C: ConnectionTrait>(
    conn: &C,
    ids: &[i64],
) -> Result<Vec<amenities::Model>, DbErr> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut locked = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(model) = lock_amenity(conn, id).await? {
            locked.push(model);
        }
    }
    Ok(locked)
}

/// 以 revision 为条件写入新的 amount_booked
/// 返回 false 表示 revision 已被其他事务推进
pub async fn swap_counter<C: ConnectionTrait>(
    conn: &C,
    observed: &amenities::Model,
    amount_booked: i64,
) -> Result<bool, DbErr> {
    let result = amenities::Entity::update_many()
        .col_expr(amenities::Column::AmountBooked, Expr::value(amount_booked))
        .col_expr(
            amenities::Column::Revision,
            Expr::col(amenities::Column::Revision).add(1),
        )
        .col_expr(amenities::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(amenities::Column::Id.eq(observed.id))
        .filter(amenities::Column::Revision.eq(observed.revision))
        .exec(conn)
        .await?;

    Ok(result.rows_affected == 1)
}

/// 按增量调整计数器, 结果不低于 0
pub async fn apply_delta<C: ConnectionTrait>(
    conn: &C,
    observed: &amenities::Model,
    delta: i32,
) -> AppResult<bool> {
    let next = observed
        .amount_booked
        .checked_add(i64::from(delta))
        .ok_or_else(|| {
            AppError::InternalError(format!(
                "Amenity {} counter overflow ({} {:+})",
                observed.id, observed.amount_booked, delta
            ))
        })?;
    if next < 0 {
        log::warn!(
            "Amenity {} counter would drop below zero ({} {:+}), clamping to 0",
            observed.id,
            observed.amount_booked,
            delta
        );
    }
    Ok(swap_counter(conn, observed, next.max(0)).await?)
}

/// 重复执行一次事务性尝试, 直到成功或次数用尽
/// 尝试返回 Ok(None) 表示 CAS 失败且已回滚; 用尽后返回 Conflict
pub async fn retry_on_conflict<T, F, Fut>(
    max_attempts: usize,
    subject: &str,
    mut attempt: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<Option<T>>>,
{
    for n in 1..=max_attempts {
        if let Some(value) = attempt().await? {
            return Ok(value);
        }
        log::warn!("{subject} changed concurrently, retrying (attempt {n}/{max_attempts})");
    }

    Err(AppError::Conflict(format!(
        "{subject} is being modified concurrently, please retry"
    )))
}

/// 删除仍被引用的行 (例如释放后又有新的设施预订写入)
pub fn is_still_referenced(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_pool;
    use crate::entities::AmenityStatus;

    fn amenity(amount_booked: i64, revision: i64) -> amenities::Model {
        amenities::Model {
            id: 1,
            campground_id: 1,
            name: "Tent".into(),
            description: None,
            quantity: 5,
            price: 0,
            status: AmenityStatus::Available,
            amount_booked,
            revision,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_lost_swaps() {
        let mut calls = 0;
        let result = retry_on_conflict(3, "Amenity 1", || {
            calls += 1;
            let n = calls;
            async move { Ok((n == 3).then_some(n)) }
        })
        .await
        .unwrap();
        assert_eq!(result, 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_is_conflict() {
        let mut calls = 0;
        let result: AppResult<()> = retry_on_conflict(2, "Amenity 1", || {
            calls += 1;
            async { Ok(None) }
        })
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_retry_stops_on_hard_error() {
        let mut calls = 0;
        let result: AppResult<()> = retry_on_conflict(5, "Amenity 1", || {
            calls += 1;
            async {
                Err(AppError::CapacityExceeded {
                    requested: 1,
                    available: 0,
                })
            }
        })
        .await;
        assert!(matches!(result, Err(AppError::CapacityExceeded { .. })));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_counter_overflow_is_reported() {
        let pool = memory_pool().await;
        let observed = amenity(i64::MAX, 0);
        assert!(matches!(
            apply_delta(&pool, &observed, 1).await,
            Err(AppError::InternalError(_))
        ));
    }
}
