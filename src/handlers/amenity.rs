use super::current_user;
use crate::models::*;
use crate::services::{AmenityBookingService, AmenityService};
use crate::utils::DateWindow;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/camps/{camp_id}/amenities",
    tag = "amenity",
    params(("camp_id" = i64, Path, description = "营地ID")),
    responses(
        (status = 200, description = "获取设施列表成功", body = [AmenityResponse]),
        (status = 404, description = "营地不存在")
    )
)]
pub async fn list_amenities(
    amenity_service: web::Data<AmenityService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match amenity_service.list_for_camp(path.into_inner()).await {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "count": list.len(),
            "data": list
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/camps/{camp_id}/amenities",
    tag = "amenity",
    params(("camp_id" = i64, Path, description = "营地ID")),
    request_body = CreateAmenityRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "创建设施成功", body = AmenityResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "非营地所有者")
    )
)]
pub async fn create_amenity(
    amenity_service: web::Data<AmenityService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CreateAmenityRequest>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match amenity_service
        .create_amenity(&current, path.into_inner(), request.into_inner())
        .await
    {
        Ok(amenity) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": amenity
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/camps/{camp_id}/amenities/{id}",
    tag = "amenity",
    params(
        ("camp_id" = i64, Path, description = "营地ID"),
        ("id" = i64, Path, description = "设施ID")
    ),
    request_body = UpdateAmenityRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "修改设施成功", body = AmenityResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "非营地所有者"),
        (status = 404, description = "设施不存在")
    )
)]
pub async fn update_amenity(
    amenity_service: web::Data<AmenityService>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
    request: web::Json<UpdateAmenityRequest>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;
    let (camp_id, id) = path.into_inner();

    match amenity_service
        .update_amenity(&current, camp_id, id, request.into_inner())
        .await
    {
        Ok(amenity) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": amenity
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/camps/{camp_id}/amenities/{id}",
    tag = "amenity",
    params(
        ("camp_id" = i64, Path, description = "营地ID"),
        ("id" = i64, Path, description = "设施ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除设施成功"),
        (status = 400, description = "仍有设施预订引用"),
        (status = 403, description = "非营地所有者"),
        (status = 404, description = "设施不存在")
    )
)]
pub async fn delete_amenity(
    amenity_service: web::Data<AmenityService>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;
    let (camp_id, id) = path.into_inner();

    match amenity_service.delete_amenity(&current, camp_id, id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {}
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/amenities/{id}/availability",
    tag = "amenity",
    params(
        ("id" = i64, Path, description = "设施ID"),
        ("start_date" = Option<String>, Query, description = "开始日期 (YYYY-MM-DD), 缺省表示无下界"),
        ("end_date" = Option<String>, Query, description = "结束日期 (YYYY-MM-DD), 缺省表示无上界")
    ),
    responses(
        (status = 200, description = "查询可用量成功", body = AvailabilityResponse),
        (status = 400, description = "日期区间无效"),
        (status = 404, description = "设施不存在")
    )
)]
pub async fn get_availability(
    ledger: web::Data<AmenityBookingService>,
    path: web::Path<i64>,
    query: web::Query<AvailabilityQuery>,
) -> Result<HttpResponse> {
    let window = match DateWindow::new(query.start_date, query.end_date) {
        Ok(window) => window,
        Err(e) => return Ok(e.error_response()),
    };

    match ledger.available_quantity(path.into_inner(), &window).await {
        Ok(availability) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": availability
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn amenity_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/camps/{camp_id}/amenities")
            .route(web::get().to(list_amenities))
            .route(web::post().to(create_amenity)),
    )
    .service(
        web::resource("/camps/{camp_id}/amenities/{id}")
            .route(web::put().to(update_amenity))
            .route(web::delete().to(delete_amenity)),
    )
    .service(web::resource("/amenities/{id}/availability").route(web::get().to(get_availability)));
}
