use super::current_user;
use crate::models::*;
use crate::services::AmenityBookingService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/admin/amenities/{id}/reconcile",
    tag = "admin",
    params(("id" = i64, Path, description = "设施ID")),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "对账完成", body = ReconcileReport),
        (status = 403, description = "仅限管理员"),
        (status = 404, description = "设施不存在")
    )
)]
pub async fn reconcile_amenity(
    ledger: web::Data<AmenityBookingService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;
    current.ensure_role(&[UserRole::Admin])?;

    match ledger.reconcile_amenity(path.into_inner()).await {
        Ok(report) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": report
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/amenities/reconcile",
    tag = "admin",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "全部设施对账完成", body = [ReconcileReport]),
        (status = 403, description = "仅限管理员")
    )
)]
pub async fn reconcile_all(
    ledger: web::Data<AmenityBookingService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let current = current_user(&req)?;
    current.ensure_role(&[UserRole::Admin])?;

    match ledger.reconcile_all().await {
        Ok(reports) => {
            let corrected = reports.iter().filter(|r| r.corrected).count();
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "data": reports,
                "message": format!("{corrected} amenity counters corrected")
            })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/amenities/reconcile", web::post().to(reconcile_all))
            .route("/amenities/{id}/reconcile", web::post().to(reconcile_amenity)),
    );
}
