pub mod booking;
pub mod lifecycle;
pub mod requests;
pub mod user;
pub mod workshop;

pub use booking::{
    Booking, BookingDetails, BookingPage, BookingStatus, CustomerSummary, DashboardStats,
    PageMeta, Pagination, PopularWorkshop, SlotTimes, WorkshopSummary,
};
pub use lifecycle::Lifecycle;
pub use user::{Identity, PublicUser, Role, User};
pub use workshop::{NewTimeSlot, NewWorkshop, TimeSlot, Workshop, WorkshopPatch, WorkshopWithSlots};
