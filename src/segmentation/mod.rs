pub mod config;
pub mod identity;
pub mod state;
pub mod tracker;

pub use config::SegmentationConfig;
pub use identity::{BrowserSet, TaskIdentity};
pub use state::{ClosedSpan, Observation, SessionState, Span, Transition};
pub use tracker::Tracker;
