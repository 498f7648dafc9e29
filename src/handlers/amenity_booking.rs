use super::current_user;
use crate::models::*;
use crate::services::AmenityBookingService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/amenitybookings",
    tag = "amenity_booking",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取全部设施预订成功", body = [AmenityBookingResponse]),
        (status = 500, description = "服务器错误")
    )
)]
pub async fn list_amenity_bookings(ledger: web::Data<AmenityBookingService>) -> Result<HttpResponse> {
    match ledger.list_entries().await {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "count": list.len(),
            "data": list
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/amenitybookings/{id}",
    tag = "amenity_booking",
    params(("id" = i64, Path, description = "设施预订ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取设施预订成功", body = AmenityBookingDetailResponse),
        (status = 404, description = "设施预订不存在")
    )
)]
pub async fn get_amenity_booking(
    ledger: web::Data<AmenityBookingService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match ledger.get_entry(path.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": detail
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/bookings/{booking_id}/amenities/{amenity_id}/amenitybookings",
    tag = "amenity_booking",
    params(
        ("booking_id" = i64, Path, description = "预订ID"),
        ("amenity_id" = i64, Path, description = "设施ID")
    ),
    request_body = CreateAmenityBookingRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "创建设施预订成功", body = CreatedAmenityBookingResponse),
        (status = 400, description = "数量/日期无效, 设施不属于该营地, 或可用量不足"),
        (status = 403, description = "无权操作该预订"),
        (status = 404, description = "预订或设施不存在"),
        (status = 409, description = "并发写入冲突, 可重试")
    )
)]
pub async fn create_amenity_booking(
    ledger: web::Data<AmenityBookingService>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
    request: web::Json<CreateAmenityBookingRequest>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;
    let (booking_id, amenity_id) = path.into_inner();

    match ledger
        .create_amenity_booking(&current, booking_id, amenity_id, &request)
        .await
    {
        Ok(entry) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": CreatedAmenityBookingResponse { id: entry.id }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/amenitybookings/{id}",
    tag = "amenity_booking",
    params(("id" = i64, Path, description = "设施预订ID")),
    request_body = UpdateAmenityBookingRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "修改设施预订成功", body = AmenityBookingResponse),
        (status = 400, description = "数量/日期无效, 设施不属于该营地, 或可用量不足"),
        (status = 403, description = "无权操作该设施预订"),
        (status = 404, description = "设施预订不存在"),
        (status = 409, description = "并发写入冲突, 可重试")
    )
)]
pub async fn update_amenity_booking(
    ledger: web::Data<AmenityBookingService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateAmenityBookingRequest>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match ledger
        .update_amenity_booking(&current, path.into_inner(), &request)
        .await
    {
        Ok(entry) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": AmenityBookingResponse::from(entry)
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/amenitybookings/{id}",
    tag = "amenity_booking",
    params(("id" = i64, Path, description = "设施预订ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除设施预订成功"),
        (status = 403, description = "无权操作该设施预订"),
        (status = 404, description = "设施预订不存在")
    )
)]
pub async fn delete_amenity_booking(
    ledger: web::Data<AmenityBookingService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match ledger.delete_amenity_booking(&current, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {}
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/amenitybookings/bookings/{booking_id}",
    tag = "amenity_booking",
    params(("booking_id" = i64, Path, description = "预订ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取预订下的设施预订成功", body = [AmenityBookingResponse]),
        (status = 500, description = "服务器错误")
    )
)]
pub async fn list_for_booking(
    ledger: web::Data<AmenityBookingService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match ledger.list_for_booking(path.into_inner()).await {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "count": list.len(),
            "data": list
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/amenitybookings/bookings/{booking_id}",
    tag = "amenity_booking",
    params(("booking_id" = i64, Path, description = "预订ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除预订下的全部设施预订", body = ReleasedAmenityBookingsResponse),
        (status = 403, description = "无权操作其中的设施预订")
    )
)]
pub async fn delete_for_booking(
    ledger: web::Data<AmenityBookingService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match ledger.delete_for_booking(&current, path.into_inner()).await {
        Ok(count) => {
            let message = if count == 0 {
                "No amenity bookings found for this booking".to_string()
            } else {
                format!("Deleted {count} amenity bookings")
            };
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": ReleasedAmenityBookingsResponse { count, message }
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn amenity_booking_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/amenitybookings")
            .route("", web::get().to(list_amenity_bookings))
            .route("/bookings/{booking_id}", web::get().to(list_for_booking))
            .route("/bookings/{booking_id}", web::delete().to(delete_for_booking))
            .route("/{id}", web::get().to(get_amenity_booking))
            .route("/{id}", web::put().to(update_amenity_booking))
            .route("/{id}", web::delete().to(delete_amenity_booking)),
    )
    .service(
        web::resource("/bookings/{booking_id}/amenities/{amenity_id}/amenitybookings")
            .route(web::post().to(create_amenity_booking)),
    );
}
