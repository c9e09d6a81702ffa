pub mod booking;
pub mod booking_id;
pub mod datetime;
pub mod eligibility;
pub mod handshake;
pub mod lifecycle;
pub mod pricing;
pub mod store;

pub use booking::AppointmentBookingService;
pub use booking_id::{BookingIdSource, RandomBookingIds};
pub use store::{AppointmentStore, InsertError, InMemoryAppointmentStore, SupabaseAppointmentStore};
