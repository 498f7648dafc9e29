use super::current_user;
use crate::models::*;
use crate::services::CampService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/camps",
    tag = "camp",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量")
    ),
    responses(
        (status = 200, description = "获取营地列表成功")
    )
)]
pub async fn list_camps(
    camp_service: web::Data<CampService>,
    query: web::Query<CampQuery>,
) -> Result<HttpResponse> {
    match camp_service.list_camps(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/camps/{id}",
    tag = "camp",
    params(("id" = i64, Path, description = "营地ID")),
    responses(
        (status = 200, description = "获取营地成功", body = CampResponse),
        (status = 404, description = "营地不存在")
    )
)]
pub async fn get_camp(
    camp_service: web::Data<CampService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match camp_service.get_camp(path.into_inner()).await {
        Ok(camp) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": camp
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/camps",
    tag = "camp",
    request_body = CreateCampRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "创建营地成功", body = CampResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "无权限")
    )
)]
pub async fn create_camp(
    camp_service: web::Data<CampService>,
    req: HttpRequest,
    request: web::Json<CreateCampRequest>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match camp_service.create_camp(&current, request.into_inner()).await {
        Ok(camp) => Ok(HttpResponse::Created().json(json!({
            "success": true,
            "data": camp
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/camps/{id}",
    tag = "camp",
    params(("id" = i64, Path, description = "营地ID")),
    request_body = UpdateCampRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "修改营地成功", body = CampResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "不是营地所有者"),
        (status = 404, description = "营地不存在")
    )
)]
pub async fn update_camp(
    camp_service: web::Data<CampService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateCampRequest>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match camp_service
        .update_camp(&current, path.into_inner(), request.into_inner())
        .await
    {
        Ok(camp) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": camp
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/camps/{id}",
    tag = "camp",
    params(("id" = i64, Path, description = "营地ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "删除营地及其预订、设施"),
        (status = 403, description = "不是营地所有者"),
        (status = 404, description = "营地不存在"),
        (status = 409, description = "并发写入冲突, 可重试")
    )
)]
pub async fn delete_camp(
    camp_service: web::Data<CampService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;

    match camp_service.delete_camp(&current, path.into_inner()).await {
        Ok(_) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {}
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn camp_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/camps")
            .route(web::get().to(list_camps))
            .route(web::post().to(create_camp)),
    )
    .service(
        web::resource("/camps/{id}")
            .route(web::get().to(get_camp))
            .route(web::put().to(update_camp))
            .route(web::delete().to(delete_camp)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::database::memory_pool;
    use crate::middlewares::AuthMiddleware;
    use crate::services::{AmenityBookingService, BookingService};
    use crate::utils::JwtService;
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_camp_update_and_delete_routes() {
        let pool = memory_pool().await;
        let jwt = JwtService::new("test-secret", 3600);
        let ledger = AmenityBookingService::new(pool.clone(), &LedgerConfig::default());
        let camps = CampService::new(pool.clone(), BookingService::new(pool, ledger));

        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt.clone()))
                .app_data(web::Data::new(camps))
                .service(web::scope("/api/v1").configure(camp_config)),
        )
        .await;

        let owner = jwt.generate_access_token(10, UserRole::Owner).unwrap();
        let stranger = jwt.generate_access_token(11, UserRole::Owner).unwrap();
        let bearer = |token: &str| ("Authorization", format!("Bearer {token}"));

        let req = test::TestRequest::post()
            .uri("/api/v1/camps")
            .insert_header(bearer(&owner))
            .set_json(json!({
                "name": "Khao Yai Camp",
                "address": "1 Forest Rd",
                "district": "Pak Chong",
                "province": "Nakhon Ratchasima",
                "postal_code": "30130",
                "region": "Northeast",
                "tel": "044-000-000"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_i64().unwrap();
        let uri = format!("/api/v1/camps/{id}");

        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&stranger))
            .set_json(json!({"tel": "044-111-111"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(&owner))
            .set_json(json!({"tel": "044-111-111"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["tel"], "044-111-111");

        let req = test::TestRequest::delete()
            .uri(&uri)
            .insert_header(bearer(&owner))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri(&uri).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
