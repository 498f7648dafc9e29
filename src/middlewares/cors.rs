use actix_cors::Cors;
use actix_web::http::header;

/// 前端跨域访问; 令牌放在 Authorization 头, 不依赖 Cookie
pub fn create_cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}
