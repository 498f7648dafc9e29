use crate::entities::{
    amenity_entity as amenities, booking_entity as bookings, camp_entity as camps,
};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{BookingService, ledger};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::cell::Cell;

#[derive(Clone)]
pub struct CampService {
    pool: DatabaseConnection,
    bookings: BookingService,
}

impl CampService {
    pub fn new(pool: DatabaseConnection, bookings: BookingService) -> Self {
        Self { pool, bookings }
    }

    pub async fn list_camps(&self, query: &CampQuery) -> AppResult<PaginatedResponse<CampResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let total = camps::Entity::find().count(&self.pool).await?;
        let list = camps::Entity::find()
            .order_by_asc(camps::Column::Id)
            .offset(params.get_offset())
            .limit(params.get_limit())
            .all(&self.pool)
            .await?;

        let items = list.into_iter().map(CampResponse::from).collect();
        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get_camp(&self, id: i64) -> AppResult<CampResponse> {
        camps::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .map(CampResponse::from)
            .ok_or_else(|| AppError::NotFound(format!("No camp with the id of {id}")))
    }

    /// 新建营地, 请求者即为所有者
    pub async fn create_camp(
        &self,
        current: &CurrentUser,
        request: CreateCampRequest,
    ) -> AppResult<CampResponse> {
        current.ensure_role(&[UserRole::Admin, UserRole::Owner])?;
        request.validate()?;

        let name = request.name.trim().to_string();
        let duplicate = camps::Entity::find()
            .filter(camps::Column::Name.eq(name.as_str()))
            .one(&self.pool)
            .await?;
        if duplicate.is_some() {
            return Err(AppError::ValidationError(format!(
                "Camp name {name} is already taken"
            )));
        }

        let camp = camps::ActiveModel {
            owner_id: Set(current.id),
            name: Set(name),
            address: Set(request.address.trim().to_string()),
            district: Set(request.district.trim().to_string()),
            province: Set(request.province.trim().to_string()),
            postal_code: Set(request.postal_code.trim().to_string()),
            region: Set(request.region.trim().to_string()),
            tel: Set(request.tel.trim().to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!("Camp {} created by user {}", camp.id, current.id);
        Ok(camp.into())
    }

    /// 修改营地信息 (admin 或营地所有者)
    pub async fn update_camp(
        &self,
        current: &CurrentUser,
        id: i64,
        request: UpdateCampRequest,
    ) -> AppResult<CampResponse> {
        let camp = self.find_camp(id).await?;
        current.ensure_camp_owner(camp.owner_id)?;
        request.validate()?;

        let mut model = camp.into_active_model();
        if let Some(name) = request.name {
            let name = name.trim().to_string();
            let duplicate = camps::Entity::find()
                .filter(camps::Column::Name.eq(name.as_str()))
                .filter(camps::Column::Id.ne(id))
                .one(&self.pool)
                .await?;
            if duplicate.is_some() {
                return Err(AppError::ValidationError(format!(
                    "Camp name {name} is already taken"
                )));
            }
            model.name = Set(name);
        }
        if let Some(address) = request.address {
            model.address = Set(address.trim().to_string());
        }
        if let Some(district) = request.district {
            model.district = Set(district.trim().to_string());
        }
        if let Some(province) = request.province {
            model.province = Set(province.trim().to_string());
        }
        if let Some(postal_code) = request.postal_code {
            model.postal_code = Set(postal_code.trim().to_string());
        }
        if let Some(region) = request.region {
            model.region = Set(region.trim().to_string());
        }
        if let Some(tel) = request.tel {
            model.tel = Set(tel.trim().to_string());
        }

        let updated = model.update(&self.pool).await?;
        log::info!("Camp {id} updated by user {}", current.id);
        Ok(updated.into())
    }

    /// 删除营地: 逐个删除预订 (经台账释放设施预订), 再删设施目录和营地本身
    /// 返回删除的预订数
    pub async fn delete_camp(&self, current: &CurrentUser, id: i64) -> AppResult<u64> {
        let camp = self.find_camp(id).await?;
        current.ensure_camp_owner(camp.owner_id)?;

        let removed = Cell::new(0);
        let removed_ref = &removed;
        ledger::retry_on_conflict(
            self.bookings.max_write_attempts(),
            &format!("Camp {id}"),
            move || async move {
                let count = self.delete_camp_bookings(current, id).await?;
                removed_ref.set(removed_ref.get() + count);
                self.try_delete_camp_rows(id).await
            },
        )
        .await?;

        let removed = removed.get();
        log::info!("Camp {id} deleted by user {}, {removed} bookings removed", current.id);
        Ok(removed)
    }

    async fn delete_camp_bookings(&self, current: &CurrentUser, camp_id: i64) -> AppResult<u64> {
        let ids: Vec<i64> = bookings::Entity::find()
            .select_only()
            .column(bookings::Column::Id)
            .filter(bookings::Column::CampId.eq(camp_id))
            .into_tuple()
            .all(&self.pool)
            .await?;

        let mut removed = 0;
        for booking_id in ids {
            match self.bookings.delete_booking(current, booking_id).await {
                Ok(_) => removed += 1,
                // 已被并发删除
                Err(AppError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    /// 设施目录与营地在同一事务内删除; 返回 None 表示期间又有预订写入, 需要重新清理
    async fn try_delete_camp_rows(&self, id: i64) -> AppResult<Option<()>> {
        let txn = self.pool.begin().await?;
        match delete_camp_rows(&txn, id).await {
            Ok(()) => {
                txn.commit().await?;
                Ok(Some(()))
            }
            Err(err) if ledger::is_still_referenced(&err) => {
                txn.rollback().await?;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_camp(&self, id: i64) -> AppResult<camps::Model> {
        camps::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No camp with the id of {id}")))
    }
}

async fn delete_camp_rows<C: ConnectionTrait>(conn: &C, id: i64) -> Result<(), DbErr> {
    amenities::Entity::delete_many()
        .filter(amenities::Column::CampgroundId.eq(id))
        .exec(conn)
        .await?;
    camps::Entity::delete_by_id(id).exec(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::database::memory_pool;
    use crate::entities::{AmenityStatus, amenity_booking_entity as entries};
    use crate::services::AmenityBookingService;
    use chrono::NaiveDate;

    const OWNER_ID: i64 = 10;
    const RENTER_ID: i64 = 20;

    fn request(name: &str) -> CreateCampRequest {
        CreateCampRequest {
            name: name.into(),
            address: "1 Forest Rd".into(),
            district: "Pak Chong".into(),
            province: "Nakhon Ratchasima".into(),
            postal_code: "30130".into(),
            region: "Northeast".into(),
            tel: "044-000-000".into(),
        }
    }

    fn as_role(id: i64, role: UserRole) -> CurrentUser {
        CurrentUser { id, role }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn service(pool: &DatabaseConnection) -> CampService {
        let ledger = AmenityBookingService::new(pool.clone(), &LedgerConfig::default());
        CampService::new(pool.clone(), BookingService::new(pool.clone(), ledger))
    }

    #[tokio::test]
    async fn test_create_and_page_camps() {
        let service = service(&memory_pool().await);
        let owner = as_role(OWNER_ID, UserRole::Owner);

        for name in ["Alpha", "Bravo", "Charlie"] {
            service.create_camp(&owner, request(name)).await.unwrap();
        }
        assert!(matches!(
            service.create_camp(&owner, request("Alpha")).await,
            Err(AppError::ValidationError(_))
        ));

        let page = service
            .list_camps(&CampQuery {
                page: Some(2),
                per_page: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].name, "Charlie");
        assert_eq!(page.data[0].owner_id, OWNER_ID);
    }

    #[tokio::test]
    async fn test_plain_user_cannot_create_camp() {
        let service = service(&memory_pool().await);
        let user = as_role(RENTER_ID, UserRole::User);
        assert!(matches!(
            service.create_camp(&user, request("Alpha")).await,
            Err(AppError::UnauthorizedAccess(_))
        ));
        assert!(matches!(
            service.get_camp(1).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_camp_by_owner_or_admin() {
        let service = service(&memory_pool().await);
        let owner = as_role(OWNER_ID, UserRole::Owner);
        let camp = service.create_camp(&owner, request("Alpha")).await.unwrap();
        service.create_camp(&owner, request("Bravo")).await.unwrap();

        let rename = |name: &str| UpdateCampRequest {
            name: Some(name.into()),
            ..Default::default()
        };

        let other_owner = as_role(11, UserRole::Owner);
        assert!(matches!(
            service.update_camp(&other_owner, camp.id, rename("Delta")).await,
            Err(AppError::UnauthorizedAccess(_))
        ));
        assert!(matches!(
            service.update_camp(&owner, camp.id, rename("Bravo")).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            service.update_camp(&owner, 999, rename("Delta")).await,
            Err(AppError::NotFound(_))
        ));

        // 名称不变视为合法
        let updated = service
            .update_camp(
                &owner,
                camp.id,
                UpdateCampRequest {
                    name: Some("Alpha".into()),
                    tel: Some(" 044-111-111 ".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.tel, "044-111-111");
        assert_eq!(updated.address, "1 Forest Rd");

        let admin = as_role(1, UserRole::Admin);
        let updated = service.update_camp(&admin, camp.id, rename("Echo")).await.unwrap();
        assert_eq!(updated.name, "Echo");
        assert_eq!(updated.owner_id, OWNER_ID);
    }

    #[tokio::test]
    async fn test_delete_camp_cascades_through_ledger() {
        let pool = memory_pool().await;
        let service = service(&pool);
        let owner = as_role(OWNER_ID, UserRole::Owner);
        let renter = as_role(RENTER_ID, UserRole::User);
        let camp = service.create_camp(&owner, request("Alpha")).await.unwrap();
        let keep = service.create_camp(&owner, request("Bravo")).await.unwrap();

        let amenity = amenities::ActiveModel {
            campground_id: Set(camp.id),
            name: Set("Kayak".into()),
            description: Set(None),
            quantity: Set(4),
            price: Set(200),
            status: Set(AmenityStatus::Available),
            amount_booked: Set(0),
            revision: Set(0),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&pool)
        .await
        .unwrap();

        let booking_request = |start: &str, end: &str| CreateBookingRequest {
            name: "Somchai".into(),
            surname: "Jaidee".into(),
            start_date: d(start),
            end_date: d(end),
        };
        let first = service
            .bookings
            .create_booking(&renter, camp.id, booking_request("2025-06-01", "2025-06-03"))
            .await
            .unwrap();
        service
            .bookings
            .create_booking(&renter, camp.id, booking_request("2025-06-10", "2025-06-12"))
            .await
            .unwrap();
        service
            .bookings
            .create_booking(&renter, keep.id, booking_request("2025-06-01", "2025-06-03"))
            .await
            .unwrap();

        let ledger = AmenityBookingService::new(pool.clone(), &LedgerConfig::default());
        ledger
            .create_amenity_booking(
                &renter,
                first.id,
                amenity.id,
                &CreateAmenityBookingRequest {
                    amount: Some(2),
                    start_date: d("2025-06-01"),
                    end_date: d("2025-06-02"),
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            service.delete_camp(&as_role(11, UserRole::Owner), camp.id).await,
            Err(AppError::UnauthorizedAccess(_))
        ));
        assert!(matches!(
            service.delete_camp(&renter, camp.id).await,
            Err(AppError::UnauthorizedAccess(_))
        ));

        assert_eq!(service.delete_camp(&owner, camp.id).await.unwrap(), 2);
        assert!(matches!(
            service.get_camp(camp.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(entries::Entity::find().count(&pool).await.unwrap(), 0);
        assert!(amenities::Entity::find_by_id(amenity.id)
            .one(&pool)
            .await
            .unwrap()
            .is_none());
        let left = bookings::Entity::find().all(&pool).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].camp_id, keep.id);

        assert!(matches!(
            service.delete_camp(&owner, camp.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
