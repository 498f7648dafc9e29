use super::current_user;
use crate::models::*;
use crate::services::BookingService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/bookings",
    tag = "booking",
    params(
        ("camp_id" = Option<i64>, Query, description = "按营地过滤 (admin/owner)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取预订列表成功", body = [BookingResponse]),
        (status = 401, description = "未授权"),
        (status = 403, description = "无权查看该营地")
    )
)]
pub async fn list_bookings(
    booking_service: web::Data<BookingService>,
    req: HttpRequest,
    query: web::Query<BookingQuery>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match booking_service.list_bookings(&current, &query).await {
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
    path = "/bookings/{id}",
    tag = "booking",
    params(("id" = i64, Path, description = "预订ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取预订成功", body = BookingResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "预订不存在")
    )
)]
pub async fn get_booking(
    booking_service: web::Data<BookingService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match booking_service.get_booking(&current, path.into_inner()).await {
        Ok(booking) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": booking
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/camps/{camp_id}/bookings",
    tag = "booking",
    params(("camp_id" = i64, Path, description = "营地ID")),
    request_body = CreateBookingRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "创建预订成功", body = BookingResponse),
        (status = 400, description = "日期无效或超过预订上限"),
        (status = 404, description = "营地不存在")
    )
)]
pub async fn create_booking(
    booking_service: web::Data<BookingService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match booking_service
        .create_booking(&current, path.into_inner(), request.into_inner())
        .await
    {
        Ok(booking) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": booking
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/bookings/{id}",
    tag = "booking",
    params(("id" = i64, Path, description = "预订ID")),
    request_body = UpdateBookingRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "修改预订成功", body = BookingResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "无权限"),
        (status = 404, description = "预订不存在")
    )
)]
pub async fn update_booking(
    booking_service: web::Data<BookingService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateBookingRequest>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match booking_service
        .update_booking(&current, path.into_inner(), request.into_inner())
        .await
    {
        Ok(booking) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": booking
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/bookings/{id}",
    tag = "booking",
    params(("id" = i64, Path, description = "预订ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除预订并释放设施预订"),
        (status = 403, description = "无权限"),
        (status = 404, description = "预订不存在")
    )
)]
pub async fn delete_booking(
    booking_service: web::Data<BookingService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match booking_service.delete_booking(&current, path.into_inner()).await {
        Ok(released) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "released_amenity_bookings": released
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn booking_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/bookings").route(web::get().to(list_bookings)))
        .service(
            web::resource("/bookings/{id}")
                .route(web::get().to(get_booking))
                .route(web::put().to(update_booking))
                .route(web::delete().to(delete_booking)),
        )
        .service(web::resource("/camps/{camp_id}/bookings").route(web::post().to(create_booking)));
}
