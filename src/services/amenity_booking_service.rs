use crate::config::LedgerConfig;
use crate::entities::{
    amenity_booking_entity as entries, amenity_entity as amenities, booking_entity as bookings,
    camp_entity as camps,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    AmenityBookingDetailResponse, AmenityBookingResponse, AvailabilityResponse,
    CreateAmenityBookingRequest, CurrentUser, MAX_QUANTITY, ReconcileReport,
    UpdateAmenityBookingRequest,
};
use crate::services::ledger;
use crate::utils::DateWindow;
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashMap;

/// 合并后的修改内容 (未提供的字段沿用当前值)
#[derive(Debug, Clone, PartialEq, Eq)]
struct MergedPatch {
    amount: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    amenity_id: i64,
}

impl MergedPatch {
    fn merge(current: &entries::Model, request: &UpdateAmenityBookingRequest) -> AppResult<Self> {
        let patch = MergedPatch {
            amount: request.amount.unwrap_or(current.amount),
            start_date: request.start_date.unwrap_or(current.start_date),
            end_date: request.end_date.unwrap_or(current.end_date),
            amenity_id: request.amenity_id.unwrap_or(current.amenity_id),
        };
        validate_amount(patch.amount)?;
        patch.window()?;
        Ok(patch)
    }

    fn window(&self) -> AppResult<DateWindow> {
        DateWindow::bounded(self.start_date, self.end_date)
    }
}

fn validate_amount(amount: i32) -> AppResult<()> {
    if amount <= 0 {
        return Err(AppError::ValidationError(
            "Amount must be a positive integer".to_string(),
        ));
    }
    if amount > MAX_QUANTITY {
        return Err(AppError::ValidationError(format!(
            "Amount cannot be more than {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

fn entry_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("No amenity booking with the id of {id}"))
}

fn amenity_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("No amenity with the id of {id}"))
}

/// 设施预订台账
///
/// 维护两条不变量:
/// - 任一设施在任一天被覆盖的明细数量之和不超过 quantity
/// - amount_booked 等于引用该设施的全部明细 amount 之和
#[derive(Clone)]
pub struct AmenityBookingService {
    pool: DatabaseConnection,
    max_write_attempts: usize,
}

impl AmenityBookingService {
    pub fn new(pool: DatabaseConnection, config: &LedgerConfig) -> Self {
        Self {
            pool,
            max_write_attempts: config.max_write_attempts.max(1),
        }
    }

    /// 全部设施预订
    pub fn max_write_attempts(&self) -> usize {
        self.max_write_attempts
    }

    pub async fn list_entries(&self) -> AppResult<Vec<AmenityBookingResponse>> {
        let list = entries::Entity::find()
            .order_by_asc(entries::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    /// 某个预订下的设施预订
    pub async fn list_for_booking(&self, booking_id: i64) -> AppResult<Vec<AmenityBookingResponse>> {
        let list = entries::Entity::find()
            .filter(entries::Column::BookingId.eq(booking_id))
            .order_by_asc(entries::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(Into::into).collect())
    }

    /// 单条详情 (附带预订与设施)
    pub async fn get_entry(&self, id: i64) -> AppResult<AmenityBookingDetailResponse> {
        let entry = entries::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| entry_not_found(id))?;

        let booking = bookings::Entity::find_by_id(entry.booking_id)
            .one(&self.pool)
            .await?;
        let amenity = amenities::Entity::find_by_id(entry.amenity_id)
            .one(&self.pool)
            .await?;

        Ok(AmenityBookingDetailResponse {
            entry: entry.into(),
            booking: booking.map(Into::into),
            amenity: amenity.map(Into::into),
        })
    }

    /// 区间内已订数量
    pub async fn booked_amount(&self, amenity_id: i64, window: &DateWindow) -> AppResult<i64> {
        Ok(ledger::booked_amount(&self.pool, amenity_id, window, None).await?)
    }

    /// 区间内可用量, available = max(0, quantity - booked)
    pub async fn available_quantity(
        &self,
        amenity_id: i64,
        window: &DateWindow,
    ) -> AppResult<AvailabilityResponse> {
        let amenity = amenities::Entity::find_by_id(amenity_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| amenity_not_found(amenity_id))?;
        let booked = ledger::booked_amount(&self.pool, amenity_id, window, None).await?;

        Ok(AvailabilityResponse {
            amenity_id,
            available: amenity.headroom(booked),
            name: amenity.name,
            total_quantity: amenity.quantity,
            total_booked: booked,
        })
    }

    /// 新建设施预订
    ///
    /// 校验顺序:
    /// 1. amount > 0 且 start <= end
    /// 2. 预订存在
    /// 3. 请求者可操作该预订
    /// 4. 设施属于该预订的营地
    /// 5. 区间可用量足够
    ///
    /// 明细写入与计数器递增在同一事务内提交
    pub async fn create_amenity_booking(
        &self,
        current: &CurrentUser,
        booking_id: i64,
        amenity_id: i64,
        request: &CreateAmenityBookingRequest,
    ) -> AppResult<entries::Model> {
        let amount = request.amount.unwrap_or(1);
        validate_amount(amount)?;
        let window = DateWindow::bounded(request.start_date, request.end_date)?;

        let booking = bookings::Entity::find_by_id(booking_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No booking with the id of {booking_id}")))?;

        let camp_owner = self.camp_owner(booking.camp_id).await?;
        current.ensure_can_manage(camp_owner, booking.user_id)?;

        let belongs = amenities::Entity::find_by_id(amenity_id)
            .filter(amenities::Column::CampgroundId.eq(booking.camp_id))
            .one(&self.pool)
            .await?;
        if belongs.is_none() {
            return Err(AppError::InvalidReference(
                "Amenity does not belong to this camp".to_string(),
            ));
        }

        // 明细归属于预订本身的用户, 管理员或营地主代为操作时也不变
        let user_id = booking.user_id;
        let window = &window;
        let entry = ledger::retry_on_conflict(
            self.max_write_attempts,
            &format!("Amenity {amenity_id}"),
            move || self.try_admit(user_id, booking_id, amenity_id, amount, window, request),
        )
        .await?;

        log::info!(
            "Amenity booking {} created: amenity {}, amount {}, {}..{}",
            entry.id,
            amenity_id,
            amount,
            entry.start_date,
            entry.end_date
        );
        Ok(entry)
    }

    async fn try_admit(
        &self,
        user_id: i64,
        booking_id: i64,
        amenity_id: i64,
        amount: i32,
        window: &DateWindow,
        request: &CreateAmenityBookingRequest,
    ) -> AppResult<Option<entries::Model>> {
        let txn = self.pool.begin().await?;

        let amenity = ledger::lock_amenity(&txn, amenity_id)
            .await?
            .ok_or_else(|| amenity_not_found(amenity_id))?;
        let booked = ledger::booked_amount(&txn, amenity_id, window, None).await?;
        let available = amenity.headroom(booked);
        if amount > available {
            // txn 在 drop 时回滚
            return Err(AppError::CapacityExceeded {
                requested: amount,
                available,
            });
        }

        let now = Utc::now();
        let entry = entries::ActiveModel {
            booking_id: Set(booking_id),
            user_id: Set(user_id),
            amenity_id: Set(amenity_id),
            amount: Set(amount),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if !ledger::apply_delta(&txn, &amenity, amount).await? {
            txn.rollback().await?;
            return Ok(None);
        }

        txn.commit().await?;
        Ok(Some(entry))
    }

    /// 修改设施预订
    ///
    /// 可用量按 "除自身以外" 的重叠明细重算; 计数器:
    /// - 同一设施: += new - old
    /// - 更换设施: 旧设施 -= old, 新设施 += new
    pub async fn update_amenity_booking(
        &self,
        current: &CurrentUser,
        id: i64,
        request: &UpdateAmenityBookingRequest,
    ) -> AppResult<entries::Model> {
        let existing = entries::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| entry_not_found(id))?;

        let camp_owner = self.amenity_camp_owner(existing.amenity_id).await?;
        current.ensure_can_manage(camp_owner, existing.user_id)?;

        let patch = MergedPatch::merge(&existing, request)?;

        if patch.amenity_id != existing.amenity_id {
            let booking = bookings::Entity::find_by_id(existing.booking_id)
                .one(&self.pool)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("No booking with the id of {}", existing.booking_id))
                })?;
            let target = amenities::Entity::find_by_id(patch.amenity_id)
                .one(&self.pool)
                .await?
                .ok_or_else(|| amenity_not_found(patch.amenity_id))?;
            if target.campground_id != booking.camp_id {
                return Err(AppError::InvalidReference(
                    "Amenity does not belong to this camp".to_string(),
                ));
            }
        }

        let updated = ledger::retry_on_conflict(
            self.max_write_attempts,
            &format!("Amenity booking {id}"),
            move || self.try_update(id, request),
        )
        .await?;

        log::info!(
            "Amenity booking {} updated: amenity {} -> {}, amount {} -> {}",
            id,
            existing.amenity_id,
            updated.amenity_id,
            existing.amount,
            updated.amount
        );
        Ok(updated)
    }

    async fn try_update(
        &self,
        id: i64,
        request: &UpdateAmenityBookingRequest,
    ) -> AppResult<Option<entries::Model>> {
        let txn = self.pool.begin().await?;

        let before_lock = entries::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| entry_not_found(id))?;
        let target_id = request.amenity_id.unwrap_or(before_lock.amenity_id);
        let locked = ledger::lock_amenities(&txn, &[before_lock.amenity_id, target_id]).await?;

        // 加锁后重读, 明细在加锁前被移到其他设施则重试
        let current = entries::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| entry_not_found(id))?;
        if current.amenity_id != before_lock.amenity_id {
            txn.rollback().await?;
            return Ok(None);
        }

        let patch = MergedPatch::merge(&current, request)?;
        let window = patch.window()?;
        let source = locked
            .iter()
            .find(|a| a.id == current.amenity_id)
            .ok_or_else(|| amenity_not_found(current.amenity_id))?;
        let target = locked
            .iter()
            .find(|a| a.id == patch.amenity_id)
            .ok_or_else(|| amenity_not_found(patch.amenity_id))?;

        let booked = ledger::booked_amount(&txn, target.id, &window, Some(current.id)).await?;
        let available = target.headroom(booked);
        if patch.amount > available {
            return Err(AppError::CapacityExceeded {
                requested: patch.amount,
                available,
            });
        }

        let old_amount = current.amount;
        let mut model = current.into_active_model();
        model.amount = Set(patch.amount);
        model.start_date = Set(patch.start_date);
        model.end_date = Set(patch.end_date);
        model.amenity_id = Set(patch.amenity_id);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&txn).await?;

        let adjustments = if source.id == target.id {
            vec![(target, patch.amount - old_amount)]
        } else {
            vec![(source, -old_amount), (target, patch.amount)]
        };
        for (amenity, delta) in adjustments {
            if !ledger::apply_delta(&txn, amenity, delta).await? {
                txn.rollback().await?;
                return Ok(None);
            }
        }

        txn.commit().await?;
        Ok(Some(updated))
    }

    /// 删除单条设施预订 (不存在返回 NotFound)
    pub async fn delete_amenity_booking(&self, current: &CurrentUser, id: i64) -> AppResult<()> {
        let entry = entries::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| entry_not_found(id))?;

        let camp_owner = self.amenity_camp_owner(entry.amenity_id).await?;
        current.ensure_can_manage(camp_owner, entry.user_id)?;

        self.remove_entry(id).await?;
        Ok(())
    }

    /// 删除某个预订下的全部设施预订, 返回删除条数
    /// 没有明细时视为成功 (幂等); 任一条无权限则一条都不删
    pub async fn delete_for_booking(&self, current: &CurrentUser, booking_id: i64) -> AppResult<u64> {
        let list = entries::Entity::find()
            .filter(entries::Column::BookingId.eq(booking_id))
            .all(&self.pool)
            .await?;
        if list.is_empty() {
            return Ok(0);
        }

        let mut owners: HashMap<i64, i64> = HashMap::new();
        for entry in &list {
            let camp_owner = match owners.get(&entry.amenity_id) {
                Some(owner) => *owner,
                None => {
                    let owner = self.amenity_camp_owner(entry.amenity_id).await?;
                    owners.insert(entry.amenity_id, owner);
                    owner
                }
            };
            current.ensure_can_manage(camp_owner, entry.user_id)?;
        }

        self.remove_entries(list.iter().map(|e| e.id)).await
    }

    /// 预订主单删除时的级联释放 (调用方已完成权限校验)
    pub async fn release_booking(&self, booking_id: i64) -> AppResult<u64> {
        let ids: Vec<i64> = entries::Entity::find()
            .select_only()
            .column(entries::Column::Id)
            .filter(entries::Column::BookingId.eq(booking_id))
            .into_tuple()
            .all(&self.pool)
            .await?;

        self.remove_entries(ids).await
    }

    /// 逐条删除, 每条一个事务
    async fn remove_entries(&self, ids: impl IntoIterator<Item = i64>) -> AppResult<u64> {
        let mut removed = 0;
        for id in ids {
            if self.remove_entry(id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// 删除明细并扣减计数器; 返回 false 表示明细已被并发删除
    async fn remove_entry(&self, id: i64) -> AppResult<bool> {
        let removed = ledger::retry_on_conflict(
            self.max_write_attempts,
            &format!("Amenity booking {id}"),
            move || self.try_remove(id),
        )
        .await?;
        if removed {
            log::info!("Amenity booking {id} removed");
        }
        Ok(removed)
    }

    async fn try_remove(&self, id: i64) -> AppResult<Option<bool>> {
        let txn = self.pool.begin().await?;

        let Some(before_lock) = entries::Entity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(Some(false));
        };
        let amenity = ledger::lock_amenity(&txn, before_lock.amenity_id)
            .await?
            .ok_or_else(|| amenity_not_found(before_lock.amenity_id))?;

        let Some(entry) = entries::Entity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(Some(false));
        };
        if entry.amenity_id != amenity.id {
            txn.rollback().await?;
            return Ok(None);
        }

        let deleted = entries::Entity::delete_by_id(id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(Some(false));
        }

        if !ledger::apply_delta(&txn, &amenity, -entry.amount).await? {
            txn.rollback().await?;
            return Ok(None);
        }

        txn.commit().await?;
        Ok(Some(true))
    }

    /// 按明细重新汇总并修正 amount_booked
    pub async fn reconcile_amenity(&self, amenity_id: i64) -> AppResult<ReconcileReport> {
        let report = ledger::retry_on_conflict(
            self.max_write_attempts,
            &format!("Amenity {amenity_id}"),
            move || self.try_reconcile(amenity_id),
        )
        .await?;
        if report.corrected {
            log::warn!(
                "Amenity {} counter drift corrected: cached {}, actual {}",
                amenity_id,
                report.cached,
                report.actual
            );
        }
        Ok(report)
    }

    async fn try_reconcile(&self, amenity_id: i64) -> AppResult<Option<ReconcileReport>> {
        let txn = self.pool.begin().await?;

        let amenity = ledger::lock_amenity(&txn, amenity_id)
            .await?
            .ok_or_else(|| amenity_not_found(amenity_id))?;
        let actual =
            ledger::booked_amount(&txn, amenity_id, &DateWindow::unbounded(), None).await?;

        let report = ReconcileReport {
            amenity_id,
            cached: amenity.amount_booked,
            actual,
            corrected: amenity.amount_booked != actual,
        };

        if report.corrected && !ledger::swap_counter(&txn, &amenity, actual).await? {
            txn.rollback().await?;
            return Ok(None);
        }

        txn.commit().await?;
        Ok(Some(report))
    }

    /// 对全部设施执行对账
    pub async fn reconcile_all(&self) -> AppResult<Vec<ReconcileReport>> {
        let ids: Vec<i64> = amenities::Entity::find()
            .select_only()
            .column(amenities::Column::Id)
            .order_by_asc(amenities::Column::Id)
            .into_tuple()
            .all(&self.pool)
            .await?;

        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            reports.push(self.reconcile_amenity(id).await?);
        }
        log::info!(
            "Reconciled {} amenities, {} corrected",
            reports.len(),
            reports.iter().filter(|r| r.corrected).count()
        );
        Ok(reports)
    }

    async fn camp_owner(&self, camp_id: i64) -> AppResult<i64> {
        let camp = camps::Entity::find_by_id(camp_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No camp with the id of {camp_id}")))?;
        Ok(camp.owner_id)
    }

    async fn amenity_camp_owner(&self, amenity_id: i64) -> AppResult<i64> {
        let amenity = amenities::Entity::find_by_id(amenity_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| amenity_not_found(amenity_id))?;
        self.camp_owner(amenity.campground_id).await
    }
}
