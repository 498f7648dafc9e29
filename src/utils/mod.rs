pub mod date_range;
pub mod jwt;

pub use date_range::DateWindow;
pub use jwt::*;
