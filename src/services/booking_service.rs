use crate::entities::{BookingStatus, booking_entity as bookings, camp_entity as camps};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::{AmenityBookingService, ledger};
use crate::utils::DateWindow;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::cell::Cell;

/// 非 admin 用户同时持有的预订上限
const MAX_BOOKINGS_PER_USER: u64 = 3;

/// 营地预订主单
#[derive(Clone)]
pub struct BookingService {
    pool: DatabaseConnection,
    amenity_bookings: AmenityBookingService,
}

impl BookingService {
    pub fn new(pool: DatabaseConnection, amenity_bookings: AmenityBookingService) -> Self {
        Self {
            pool,
            amenity_bookings,
        }
    }

    pub fn max_write_attempts(&self) -> usize {
        self.amenity_bookings.max_write_attempts()
    }

    /// 按角色限定可见范围:
    /// - admin: 全部 (可按营地过滤)
    /// - owner: 指定的自有营地, 或名下全部营地
    /// - user: 仅自己的
    pub async fn list_bookings(
        &self,
        current: &CurrentUser,
        query: &BookingQuery,
    ) -> AppResult<Vec<BookingResponse>> {
        let mut select = bookings::Entity::find();

        match current.role {
            UserRole::Admin => {
                if let Some(camp_id) = query.camp_id {
                    select = select.filter(bookings::Column::CampId.eq(camp_id));
                }
            }
            UserRole::Owner => {
                let owned: Vec<i64> = camps::Entity::find()
                    .select_only()
                    .column(camps::Column::Id)
                    .filter(camps::Column::OwnerId.eq(current.id))
                    .into_tuple()
                    .all(&self.pool)
                    .await?;
                match query.camp_id {
                    Some(camp_id) if !owned.contains(&camp_id) => {
                        return Err(AppError::UnauthorizedAccess(format!(
                            "User {} does not own camp {camp_id}",
                            current.id
                        )));
                    }
                    Some(camp_id) => select = select.filter(bookings::Column::CampId.eq(camp_id)),
                    None => select = select.filter(bookings::Column::CampId.is_in(owned)),
                }
            }
            UserRole::User => {
                select = select.filter(bookings::Column::UserId.eq(current.id));
            }
        }

        let list = select
            .order_by_asc(bookings::Column::StartDate)
            .order_by_asc(bookings::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(BookingResponse::from).collect())
    }

    pub async fn get_booking(&self, current: &CurrentUser, id: i64) -> AppResult<BookingResponse> {
        let booking = self.find_authorized(current, id).await?;
        Ok(booking.into())
    }

    pub async fn create_booking(
        &self,
        current: &CurrentUser,
        camp_id: i64,
        request: CreateBookingRequest,
    ) -> AppResult<BookingResponse> {
        camps::Entity::find_by_id(camp_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No camp with the id of {camp_id}")))?;

        DateWindow::bounded(request.start_date, request.end_date)?;
        let name = required(&request.name, "name")?;
        let surname = required(&request.surname, "surname")?;

        if !current.is_admin() {
            let held = bookings::Entity::find()
                .filter(bookings::Column::UserId.eq(current.id))
                .count(&self.pool)
                .await?;
            if held >= MAX_BOOKINGS_PER_USER {
                return Err(AppError::ValidationError(format!(
                    "The user with ID {} has already made {MAX_BOOKINGS_PER_USER} bookings",
                    current.id
                )));
            }
        }

        let now = Utc::now();
        let booking = bookings::ActiveModel {
            user_id: Set(current.id),
            camp_id: Set(camp_id),
            name: Set(name),
            surname: Set(surname),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            status: Set(BookingStatus::Booked),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!(
            "Booking {} created for camp {} by user {}",
            booking.id,
            camp_id,
            current.id
        );
        Ok(booking.into())
    }

    pub async fn update_booking(
        &self,
        current: &CurrentUser,
        id: i64,
        request: UpdateBookingRequest,
    ) -> AppResult<BookingResponse> {
        let booking = self.find_authorized(current, id).await?;

        let start = request.start_date.unwrap_or(booking.start_date);
        let end = request.end_date.unwrap_or(booking.end_date);
        DateWindow::bounded(start, end)?;

        let mut model = booking.into_active_model();
        if let Some(name) = request.name {
            model.name = Set(required(&name, "name")?);
        }
        if let Some(surname) = request.surname {
            model.surname = Set(required(&surname, "surname")?);
        }
        if let Some(status) = request.status {
            model.status = Set(status);
        }
        model.start_date = Set(start);
        model.end_date = Set(end);
        model.updated_at = Set(Utc::now());

        let updated = model.update(&self.pool).await?;
        Ok(updated.into())
    }

    /// 删除主单前先经台账释放全部设施预订
    /// 释放与删除之间若有新的设施预订写入, 删除会触发外键约束, 此时重新释放后再删
    pub async fn delete_booking(&self, current: &CurrentUser, id: i64) -> AppResult<u64> {
        self.find_authorized(current, id).await?;

        let released = Cell::new(0);
        let released_ref = &released;
        ledger::retry_on_conflict(
            self.amenity_bookings.max_write_attempts(),
            &format!("Booking {id}"),
            move || async move {
                let count = self.amenity_bookings.release_booking(id).await?;
                released_ref.set(released_ref.get() + count);
                self.try_delete_header(id).await
            },
        )
        .await?;

        let released = released.get();
        log::info!("Booking {id} deleted, {released} amenity bookings released");
        Ok(released)
    }

    /// 返回 None 表示仍有设施预订引用该主单
    async fn try_delete_header(&self, id: i64) -> AppResult<Option<()>> {
        match bookings::Entity::delete_by_id(id).exec(&self.pool).await {
            Ok(_) => Ok(Some(())),
            Err(err) if ledger::is_still_referenced(&err) => {
                log::warn!("Booking {id} received new amenity bookings while being deleted");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_authorized(&self, current: &CurrentUser, id: i64) -> AppResult<bookings::Model> {
        let booking = bookings::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No booking with the id of {id}")))?;

        let camp_owner = camps::Entity::find_by_id(booking.camp_id)
            .one(&self.pool)
            .await?
            .map(|c| c.owner_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("No camp with the id of {}", booking.camp_id))
            })?;
        current.ensure_can_manage(camp_owner, booking.user_id)?;

        Ok(booking)
    }
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::ValidationError(format!("Please add a {field}")));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::database::memory_pool;
    use crate::entities::{AmenityStatus, amenity_booking_entity as entries, amenity_entity as amenities};
    use chrono::NaiveDate;
    use sea_orm::ConnectionTrait;

    const OWNER_ID: i64 = 10;
    const RENTER_ID: i64 = 20;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn as_role(id: i64, role: UserRole) -> CurrentUser {
        CurrentUser { id, role }
    }

    async fn seed_camp(pool: &DatabaseConnection, name: &str, owner_id: i64) -> i64 {
        camps::ActiveModel {
            owner_id: Set(owner_id),
            name: Set(name.into()),
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

    fn request(start: &str, end: &str) -> CreateBookingRequest {
        CreateBookingRequest {
            name: "Somchai".into(),
            surname: "Jaidee".into(),
            start_date: d(start),
            end_date: d(end),
        }
    }

    fn service(pool: &DatabaseConnection) -> BookingService {
        let ledger = AmenityBookingService::new(pool.clone(), &LedgerConfig::default());
        BookingService::new(pool.clone(), ledger)
    }

    #[tokio::test]
    async fn test_non_admin_limited_to_three_bookings() {
        let pool = memory_pool().await;
        let camp_id = seed_camp(&pool, "Khao Yai Camp", OWNER_ID).await;
        let service = service(&pool);
        let renter = as_role(RENTER_ID, UserRole::User);

        for _ in 0..3 {
            service
                .create_booking(&renter, camp_id, request("2025-06-01", "2025-06-02"))
                .await
                .unwrap();
        }
        assert!(matches!(
            service
                .create_booking(&renter, camp_id, request("2025-06-01", "2025-06-02"))
                .await,
            Err(AppError::ValidationError(_))
        ));

        let admin = as_role(1, UserRole::Admin);
        for _ in 0..4 {
            service
                .create_booking(&admin, camp_id, request("2025-06-01", "2025-06-02"))
                .await
                .unwrap();
        }

        assert!(matches!(
            service
                .create_booking(&admin, camp_id, request("2025-06-03", "2025-06-02"))
                .await,
            Err(AppError::InvalidRange(_))
        ));
        assert!(matches!(
            service
                .create_booking(&admin, 999, request("2025-06-01", "2025-06-02"))
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_scoped_by_role() {
        let pool = memory_pool().await;
        let mine = seed_camp(&pool, "Khao Yai Camp", OWNER_ID).await;
        let theirs = seed_camp(&pool, "Doi Inthanon Camp", 11).await;
        let service = service(&pool);

        let renter = as_role(RENTER_ID, UserRole::User);
        let other = as_role(21, UserRole::User);
        service.create_booking(&renter, mine, request("2025-06-01", "2025-06-02")).await.unwrap();
        service.create_booking(&other, theirs, request("2025-06-01", "2025-06-02")).await.unwrap();

        let owner = as_role(OWNER_ID, UserRole::Owner);
        let seen = service.list_bookings(&owner, &BookingQuery::default()).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].camp_id, mine);
        assert!(matches!(
            service
                .list_bookings(&owner, &BookingQuery { camp_id: Some(theirs) })
                .await,
            Err(AppError::UnauthorizedAccess(_))
        ));

        let seen = service.list_bookings(&other, &BookingQuery::default()).await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].user_id, 21);

        let admin = as_role(1, UserRole::Admin);
        assert_eq!(
            service.list_bookings(&admin, &BookingQuery::default()).await.unwrap().len(),
            2
        );
        assert_eq!(
            service
                .list_bookings(&admin, &BookingQuery { camp_id: Some(theirs) })
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_releases_amenity_bookings() {
        let pool = memory_pool().await;
        let camp_id = seed_camp(&pool, "Khao Yai Camp", OWNER_ID).await;
        let service = service(&pool);
        let renter = as_role(RENTER_ID, UserRole::User);
        let booking = service
            .create_booking(&renter, camp_id, request("2025-06-01", "2025-06-05"))
            .await
            .unwrap();

        let amenity = amenities::ActiveModel {
            campground_id: Set(camp_id),
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

        let entry = CreateAmenityBookingRequest {
            amount: Some(3),
            start_date: d("2025-06-02"),
            end_date: d("2025-06-03"),
        };
        service
            .amenity_bookings
            .create_amenity_booking(&renter, booking.id, amenity.id, &entry)
            .await
            .unwrap();

        let stranger = as_role(21, UserRole::User);
        assert!(matches!(
            service.delete_booking(&stranger, booking.id).await,
            Err(AppError::UnauthorizedAccess(_))
        ));

        assert_eq!(service.delete_booking(&renter, booking.id).await.unwrap(), 1);
        let after = amenities::Entity::find_by_id(amenity.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.amount_booked, 0);
        assert!(matches!(
            service.get_booking(&renter, booking.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_patches_fields() {
        let pool = memory_pool().await;
        let camp_id = seed_camp(&pool, "Khao Yai Camp", OWNER_ID).await;
        let service = service(&pool);
        let renter = as_role(RENTER_ID, UserRole::User);
        let booking = service
            .create_booking(&renter, camp_id, request("2025-06-01", "2025-06-05"))
            .await
            .unwrap();

        let owner = as_role(OWNER_ID, UserRole::Owner);
        let updated = service
            .update_booking(
                &owner,
                booking.id,
                UpdateBookingRequest {
                    status: Some(BookingStatus::CheckedIn),
                    end_date: Some(d("2025-06-07")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, BookingStatus::CheckedIn);
        assert_eq!(updated.end_date, d("2025-06-07"));
        assert_eq!(updated.name, "Somchai");

        assert!(matches!(
            service
                .update_booking(
                    &renter,
                    booking.id,
                    UpdateBookingRequest {
                        start_date: Some(d("2025-06-09")),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::InvalidRange(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_retries_when_amenity_booking_lands_mid_release() {
        let pool = memory_pool().await;
        let camp_id = seed_camp(&pool, "Khao Yai Camp", OWNER_ID).await;
        let service = service(&pool);
        let renter = as_role(RENTER_ID, UserRole::User);
        let booking = service
            .create_booking(&renter, camp_id, request("2025-06-01", "2025-06-05"))
            .await
            .unwrap();

        let amenity = amenities::ActiveModel {
            campground_id: Set(camp_id),
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
        let entry = CreateAmenityBookingRequest {
            amount: Some(2),
            start_date: d("2025-06-02"),
            end_date: d("2025-06-03"),
        };
        service
            .amenity_bookings
            .create_amenity_booking(&renter, booking.id, amenity.id, &entry)
            .await
            .unwrap();

        // 第一次释放提交时, 另一笔设施预订随计数器一起写入, 只发生一次
        pool.execute_unprepared("CREATE TABLE late_admissions (n INTEGER)")
            .await
            .unwrap();
        pool.execute_unprepared(&format!(
            "CREATE TRIGGER late_admission AFTER UPDATE OF amount_booked ON campground_amenities \
             WHEN (SELECT count(*) FROM late_admissions) = 0 \
             BEGIN \
               INSERT INTO late_admissions VALUES (1); \
               INSERT INTO amenity_bookings \
                 (booking_id, user_id, amenity_id, amount, start_date, end_date, created_at, updated_at) \
                 VALUES ({}, {RENTER_ID}, NEW.id, 1, '2025-06-04', '2025-06-04', \
                         '2025-06-01T00:00:00+00:00', '2025-06-01T00:00:00+00:00'); \
               UPDATE campground_amenities \
                 SET amount_booked = amount_booked + 1, revision = revision + 1 \
                 WHERE id = NEW.id; \
             END",
            booking.id
        ))
        .await
        .unwrap();

        assert_eq!(service.delete_booking(&renter, booking.id).await.unwrap(), 2);

        assert!(matches!(
            service.get_booking(&renter, booking.id).await,
            Err(AppError::NotFound(_))
        ));
        let left = entries::Entity::find()
            .filter(entries::Column::BookingId.eq(booking.id))
            .count(&pool)
            .await
            .unwrap();
        assert_eq!(left, 0);
        let after = amenities::Entity::find_by_id(amenity.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.amount_booked, 0);
    }
}
