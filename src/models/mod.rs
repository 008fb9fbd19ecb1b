pub mod booking;
pub mod calendar;
pub mod instructor;
pub mod payload;
pub mod time;

#[cfg(test)]
pub(crate) mod fixtures;

pub use booking::{Booking, BookingStatus, Participant, PaymentStatus, Placement};
pub use calendar::CalendarView;
pub use instructor::{Instructor, InstructorDirectory};
pub use payload::{BookingPatch, NewBooking, SwapConflict, SwapRequest, SwapSide, SwapTarget};
