pub mod accounts;
pub mod booking;
pub mod validation;
pub mod workshop;
