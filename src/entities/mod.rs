pub mod amenity_bookings;
pub mod bookings;
pub mod campground_amenities;
pub mod camps;

pub use amenity_bookings as amenity_booking_entity;
pub use bookings as booking_entity;
pub use campground_amenities as amenity_entity;
pub use camps as camp_entity;

pub use bookings::BookingStatus;
pub use campground_amenities::AmenityStatus;
