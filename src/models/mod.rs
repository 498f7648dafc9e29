pub mod amenity;
pub mod amenity_booking;
pub mod auth;
pub mod booking;
pub mod camp;
pub mod pagination;

pub use amenity::*;
pub use amenity_booking::*;
pub use auth::*;
pub use booking::*;
pub use camp::*;
pub use pagination::*;
