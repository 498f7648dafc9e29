pub mod admin;
pub mod amenity;
pub mod amenity_booking;
pub mod booking;
pub mod camp;

pub use admin::admin_config;
pub use amenity::amenity_config;
pub use amenity_booking::amenity_booking_config;
pub use booking::booking_config;
pub use camp::camp_config;

use crate::error::{AppError, AppResult};
use crate::models::CurrentUser;
use actix_web::{HttpMessage, HttpRequest};

/// 鉴权中间件注入的当前用户
fn current_user(req: &HttpRequest) -> AppResult<CurrentUser> {
    req.extensions()
        .get::<CurrentUser>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}
