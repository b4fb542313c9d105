pub mod activity;
pub mod record;

pub use activity::ActivityLevel;
pub use record::{SessionRecord, Timestamp, IDLE_PROCESS, TIMESTAMP_FORMAT};
