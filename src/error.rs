use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded { requested: i32, available: i32 },

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized access: {0}")]
    UnauthorizedAccess(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::InvalidRange(_) => "INVALID_RANGE",
            AppError::InvalidReference(_) => "INVALID_REFERENCE",
            AppError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            AppError::AuthError(_) | AppError::JwtError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::UnauthorizedAccess(_) => "FORBIDDEN",
            AppError::Conflict(_) => "CONFLICT",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::ConfigError(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidRange(_)
            | AppError::InvalidReference(_)
            | AppError::CapacityExceeded { .. } => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UnauthorizedAccess(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::ConfigError(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::ValidationError(msg)
            | AppError::InvalidRange(msg)
            | AppError::InvalidReference(msg) => {
                log::warn!("Validation error: {msg}");
                msg.clone()
            }
            AppError::CapacityExceeded {
                requested,
                available,
            } => {
                log::warn!("Capacity exceeded: requested {requested}, available {available}");
                format!("Requested amount {requested} exceeds available quantity {available}")
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                msg.clone()
            }
            AppError::JwtError(err) => {
                log::warn!("JWT error: {err}");
                "Invalid access token".to_string()
            }
            AppError::NotFound(msg) => msg.clone(),
            AppError::UnauthorizedAccess(msg) => {
                log::warn!("Forbidden access: {msg}");
                msg.clone()
            }
            AppError::Conflict(msg) => {
                log::warn!("Write conflict: {msg}");
                msg.clone()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        let mut error = json!({
            "code": self.code(),
            "message": message,
        });
        if let AppError::CapacityExceeded {
            requested,
            available,
        } = self
        {
            error["details"] = json!({
                "requested": requested,
                "available": available,
            });
        }

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": error
        }))
    }
}
