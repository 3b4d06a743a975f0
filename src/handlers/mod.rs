pub mod auth;
pub mod bookings;
pub mod health;
pub mod stats;
pub mod workshops;
