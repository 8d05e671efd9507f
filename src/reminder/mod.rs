pub mod bridge;
pub mod engine;

pub use bridge::run_source_bridge;
pub use engine::{ReminderEngine, DEFAULT_DEPARTURE_THRESHOLD_METERS, REMINDER_TITLE};
