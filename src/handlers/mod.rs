pub mod auth;
pub mod booking;
pub mod driver;
pub mod payment;
pub mod rides;
