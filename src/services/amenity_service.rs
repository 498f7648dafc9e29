use crate::entities::{
    AmenityStatus, amenity_booking_entity as entries, amenity_entity as amenities,
    camp_entity as camps,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::ledger;
use crate::utils::DateWindow;
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

/// 设施目录
#[derive(Clone)]
pub struct AmenityService {
    pool: DatabaseConnection,
}

impl AmenityService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn list_for_camp(&self, camp_id: i64) -> AppResult<Vec<AmenityResponse>> {
        self.find_camp(camp_id).await?;
        let list = amenities::Entity::find()
            .filter(amenities::Column::CampgroundId.eq(camp_id))
            .order_by_asc(amenities::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(AmenityResponse::from).collect())
    }

    pub async fn create_amenity(
        &self,
        current: &CurrentUser,
        camp_id: i64,
        request: CreateAmenityRequest,
    ) -> AppResult<AmenityResponse> {
        let camp = self.find_camp(camp_id).await?;
        current.ensure_camp_owner(camp.owner_id)?;

        let name = validate_name(&request.name)?;
        let quantity = request.quantity.unwrap_or(1);
        let price = request.price.unwrap_or(0);
        validate_stock(quantity, price)?;

        let now = Utc::now();
        let amenity = amenities::ActiveModel {
            campground_id: Set(camp_id),
            name: Set(name),
            description: Set(request.description),
            quantity: Set(quantity),
            price: Set(price),
            status: Set(request.status.unwrap_or(AmenityStatus::Available)),
            amount_booked: Set(0),
            revision: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("Amenity {} created in camp {}", amenity.id, camp_id);
        Ok(amenity.into())
    }

    /// 修改目录信息; quantity 不能低于任一天已被占用的数量
    pub async fn update_amenity(
        &self,
        current: &CurrentUser,
        camp_id: i64,
        id: i64,
        request: UpdateAmenityRequest,
    ) -> AppResult<AmenityResponse> {
        let camp = self.find_camp(camp_id).await?;
        current.ensure_camp_owner(camp.owner_id)?;

        let txn = self.pool.begin().await?;
        let amenity = ledger::lock_amenity(&txn, id)
            .await?
            .filter(|a| a.campground_id == camp_id)
            .ok_or_else(|| AppError::NotFound(format!("No amenity with the id of {id}")))?;

        let quantity = request.quantity.unwrap_or(amenity.quantity);
        let price = request.price.unwrap_or(amenity.price);
        validate_stock(quantity, price)?;
        if quantity < amenity.quantity {
            let peak = peak_daily_booked(&txn, id).await?;
            if i64::from(quantity) < peak {
                return Err(AppError::ValidationError(format!(
                    "Quantity cannot be lower than {peak}, the amount already booked on a single day"
                )));
            }
        }

        let mut model = amenity.into_active_model();
        if let Some(name) = request.name {
            model.name = Set(validate_name(&name)?);
        }
        if let Some(description) = request.description {
            model.description = Set(Some(description));
        }
        if let Some(status) = request.status {
            model.status = Set(status);
        }
        model.quantity = Set(quantity);
        model.price = Set(price);
        model.updated_at = Set(Utc::now());
        let updated = model.update(&txn).await?;
        txn.commit().await?;

        Ok(updated.into())
    }

    /// 仍有设施预订引用时拒绝删除
    pub async fn delete_amenity(&self, current: &CurrentUser, camp_id: i64, id: i64) -> AppResult<()> {
        let camp = self.find_camp(camp_id).await?;
        current.ensure_camp_owner(camp.owner_id)?;

        let txn = self.pool.begin().await?;
        ledger::lock_amenity(&txn, id)
            .await?
            .filter(|a| a.campground_id == camp_id)
            .ok_or_else(|| AppError::NotFound(format!("No amenity with the id of {id}")))?;

        let references = entries::Entity::find()
            .filter(entries::Column::AmenityId.eq(id))
            .count(&txn)
            .await?;
        if references > 0 {
            return Err(AppError::ValidationError(format!(
                "Amenity {id} still has {references} amenity bookings"
            )));
        }

        amenities::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        log::info!("Amenity {id} deleted from camp {camp_id}");
        Ok(())
    }

    async fn find_camp(&self, camp_id: i64) -> AppResult<camps::Model> {
        camps::Entity::find_by_id(camp_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No camp with the id of {camp_id}")))
    }
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError("Please add a name".to_string()));
    }
    Ok(name.to_string())
}

fn validate_stock(quantity: i32, price: i64) -> AppResult<()> {
    if quantity < 0 {
        return Err(AppError::ValidationError(
            "Quantity cannot be negative".to_string(),
        ));
    }
    if quantity > MAX_QUANTITY {
        return Err(AppError::ValidationError(format!(
            "Quantity cannot be more than {MAX_QUANTITY}"
        )));
    }
    if price < 0 {
        return Err(AppError::ValidationError("Price cannot be negative".to_string()));
    }
    Ok(())
}

/// 单日最大占用量; 峰值必然出现在某条明细的开始日
async fn peak_daily_booked<C: ConnectionTrait>(conn: &C, amenity_id: i64) -> Result<i64, DbErr> {
    let list = entries::Entity::find()
        .filter(entries::Column::AmenityId.eq(amenity_id))
        .all(conn)
        .await?;
    Ok(peak_coverage(&list))
}

fn peak_coverage(list: &[entries::Model]) -> i64 {
    let covering = |day: NaiveDate| -> i64 {
        let window = DateWindow {
            start: Some(day),
            end: Some(day),
        };
        list.iter()
            .filter(|e| window.overlaps(e.start_date, e.end_date))
            .map(|e| i64::from(e.amount))
            .sum()
    };
    list.iter().map(|e| covering(e.start_date)).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::database::memory_pool;
    use crate::services::AmenityBookingService;
    use crate::entities::{BookingStatus, booking_entity as bookings};

    const OWNER_ID: i64 = 10;

    fn owner() -> CurrentUser {
        CurrentUser {
            id: OWNER_ID,
            role: UserRole::Owner,
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn seed_camp(pool: &DatabaseConnection) -> i64 {
        camps::ActiveModel {
            owner_id: Set(OWNER_ID),
            name: Set("Khao Yai Camp".into()),
            address: Set("1 Forest Rd".into()),
            district: Set("Pak Chong".into()),
            province: Set("Nakhon Ratchasima".into()),
            postal_code: Set("30130".into()),
            region: Set("Northeast".into()),
            tel: Set("044-000-000".into()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(pool)
        .await
        .unwrap()
        .id
    }

    fn tent(quantity: i32) -> CreateAmenityRequest {
        CreateAmenityRequest {
            name: "Tent".into(),
            description: Some("4-person dome".into()),
            quantity: Some(quantity),
            price: Some(350),
            status: None,
        }
    }

    #[tokio::test]
    async fn test_only_camp_owner_manages_catalog() {
        let pool = memory_pool().await;
        let camp_id = seed_camp(&pool).await;
        let service = AmenityService::new(pool);

        let stranger = CurrentUser {
            id: 99,
            role: UserRole::Owner,
        };
        assert!(matches!(
            service.create_amenity(&stranger, camp_id, tent(2)).await,
            Err(AppError::UnauthorizedAccess(_))
        ));
        assert!(matches!(
            service.create_amenity(&owner(), camp_id, tent(-1)).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.create_amenity(&owner(), camp_id, tent(MAX_QUANTITY + 1)).await,
            Err(AppError::ValidationError(_))
        ));

        let created = service.create_amenity(&owner(), camp_id, tent(2)).await.unwrap();
        assert_eq!(created.status, AmenityStatus::Available);
        assert_eq!(created.amount_booked, 0);

        let listed = service.list_for_camp(camp_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(
            service.list_for_camp(camp_id + 1).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_quantity_cannot_drop_below_booked_peak_and_delete_refused() {
        let pool = memory_pool().await;
        let camp_id = seed_camp(&pool).await;
        let service = AmenityService::new(pool.clone());
        let ledger = AmenityBookingService::new(pool.clone(), &LedgerConfig::default());
        let amenity = service.create_amenity(&owner(), camp_id, tent(5)).await.unwrap();

        let booking_id = bookings::ActiveModel {
            user_id: Set(20),
            camp_id: Set(camp_id),
            name: Set("Somchai".into()),
            surname: Set("Jaidee".into()),
            start_date: Set(d("2025-06-01")),
            end_date: Set(d("2025-06-10")),
            status: Set(BookingStatus::Booked),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&pool)
        .await
        .unwrap()
        .id;

        for (amount, start, end) in [(2, "2025-06-01", "2025-06-03"), (1, "2025-06-03", "2025-06-05")] {
            let request = CreateAmenityBookingRequest {
                amount: Some(amount),
                start_date: d(start),
                end_date: d(end),
            };
            ledger
                .create_amenity_booking(&owner(), booking_id, amenity.id, &request)
                .await
                .unwrap();
        }

        let shrink = |quantity| UpdateAmenityRequest {
            quantity: Some(quantity),
            ..Default::default()
        };
        assert!(matches!(
            service.update_amenity(&owner(), camp_id, amenity.id, shrink(2)).await,
            Err(AppError::ValidationError(_))
        ));
        let updated = service
            .update_amenity(&owner(), camp_id, amenity.id, shrink(3))
            .await
            .unwrap();
        assert_eq!(updated.quantity, 3);
        assert_eq!(updated.amount_booked, 3);

        assert!(matches!(
            service.delete_amenity(&owner(), camp_id, amenity.id).await,
            Err(AppError::ValidationError(_))
        ));
        ledger.release_booking(booking_id).await.unwrap();
        service.delete_amenity(&owner(), camp_id, amenity.id).await.unwrap();
        assert!(service.list_for_camp(camp_id).await.unwrap().is_empty());
    }

    #[test]
    fn test_peak_coverage_sums_without_overflow() {
        let entry = |id, amount| entries::Model {
            id,
            booking_id: 1,
            user_id: 20,
            amenity_id: 1,
            amount,
            start_date: d("2025-06-01"),
            end_date: d("2025-06-03"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let list = vec![entry(1, i32::MAX), entry(2, i32::MAX), entry(3, 1)];
        assert_eq!(peak_coverage(&list), 2 * i64::from(i32::MAX) + 1);
        assert_eq!(peak_coverage(&[]), 0);
    }
}
