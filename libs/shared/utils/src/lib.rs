pub mod clock;
pub mod test_utils;
pub mod time_slots;

pub use clock::{Clock, FixedClock, SystemClock};
pub use time_slots::{generate_slots, is_quantized, quantize, TimeSlots};
