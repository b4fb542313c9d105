pub mod clock;
pub mod controller;
pub mod input;
pub mod loop_worker;
pub mod window;

pub use clock::TickTime;
pub use controller::TrackerController;
pub use input::{
    spawn_event_listener, spawn_idle_listener, ActivitySource, InputMonitor, XprintidleProbe,
};
pub use window::{WindowSample, WindowSensor, X11WindowSensor};
