pub mod amenity_booking_service;
pub mod amenity_service;
pub mod booking_service;
pub mod camp_service;
pub mod ledger;

pub use amenity_booking_service::*;
pub use amenity_service::*;
pub use booking_service::*;
pub use camp_service::*;
