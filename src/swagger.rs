use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::entities::{AmenityStatus, BookingStatus};
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::camp::list_camps,
        handlers::camp::get_camp,
        handlers::camp::create_camp,
        handlers::camp::update_camp,
        handlers::camp::delete_camp,
        handlers::amenity::list_amenities,
        handlers::amenity::create_amenity,
        handlers::amenity::update_amenity,
        handlers::amenity::delete_amenity,
        handlers::amenity::get_availability,
        handlers::booking::list_bookings,
        handlers::booking::get_booking,
        handlers::booking::create_booking,
        handlers::booking::update_booking,
        handlers::booking::delete_booking,
        handlers::amenity_booking::list_amenity_bookings,
        handlers::amenity_booking::get_amenity_booking,
        handlers::amenity_booking::create_amenity_booking,
        handlers::amenity_booking::update_amenity_booking,
        handlers::amenity_booking::delete_amenity_booking,
        handlers::amenity_booking::list_for_booking,
        handlers::amenity_booking::delete_for_booking,
        handlers::admin::reconcile_amenity,
        handlers::admin::reconcile_all,
    ),
    components(
        schemas(
            UserRole,
            BookingStatus,
            AmenityStatus,
            CampQuery,
            CreateCampRequest,
            UpdateCampRequest,
            CampResponse,
            CreateAmenityRequest,
            UpdateAmenityRequest,
            AmenityResponse,
            AvailabilityQuery,
            AvailabilityResponse,
            ReconcileReport,
            BookingQuery,
            CreateBookingRequest,
            UpdateBookingRequest,
            BookingResponse,
            CreateAmenityBookingRequest,
            UpdateAmenityBookingRequest,
            AmenityBookingResponse,
            AmenityBookingDetailResponse,
            CreatedAmenityBookingResponse,
            ReleasedAmenityBookingsResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "camp", description = "Campground API"),
        (name = "amenity", description = "Amenity catalog and availability API"),
        (name = "booking", description = "Campground booking API"),
        (name = "amenity_booking", description = "Amenity booking ledger API"),
        (name = "admin", description = "Ledger maintenance API"),
    ),
    info(
        title = "Campground Booking API",
        version = "1.0.0",
        description = "Campground booking REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
