pub mod availability;
pub mod booking;
pub mod notification;
pub mod schedule_board;
pub mod session;
pub mod store;

pub use availability::{booking_capacity, compute_availability, count_in_window, is_slot_free, SlotScope};
pub use booking::{BookingOrchestrator, BookingOutcome, BookingState};
pub use notification::{DoctorNotifier, Notifier, RestNotifier};
pub use schedule_board::{load_schedule_board, ScheduleBoardEntry};
pub use session::{AttemptToken, AvailabilitySession};
pub use store::{AppointmentStore, RestAppointmentStore};
