pub mod error;
pub mod time;
pub mod wire;

pub use error::AppError;
pub use time::{TimeOfDay, TimeParseError, SLOT_STEP_MINUTES};
