use std::time::Duration;

use chrono::TimeDelta;

/// Configuration for session detection with tunable thresholds.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Debounce: a candidate task must persist longer than this before it replaces the stable one
    pub check_interval_secs: u64,

    /// No physical input for longer than this enters the idle window
    pub idle_timeout_secs: u64,

    /// While idle, input more recent than this ends the idle window
    pub idle_exit_threshold_secs: u64,

    /// Tick-to-tick monotonic gap above this is treated as suspend/resume
    pub sleep_threshold_secs: u64,

    /// Records shorter than this are noise and never emitted
    pub min_record_duration_secs: u64,

    /// Wall clock drifting from the monotonic clock by more than this between
    /// two ticks is a clock step (NTP, manual change), not elapsed time
    pub clock_step_tolerance_secs: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            idle_timeout_secs: 300,
            idle_exit_threshold_secs: 5,
            sleep_threshold_secs: 120,
            min_record_duration_secs: 2,
            clock_step_tolerance_secs: 5,
        }
    }
}

impl SegmentationConfig {
    pub fn check_interval(&self) -> TimeDelta {
        wall_secs(self.check_interval_secs)
    }

    pub fn min_record_duration(&self) -> TimeDelta {
        wall_secs(self.min_record_duration_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn idle_exit_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_exit_threshold_secs)
    }

    pub fn sleep_threshold(&self) -> Duration {
        Duration::from_secs(self.sleep_threshold_secs)
    }

    pub fn clock_step_tolerance(&self) -> TimeDelta {
        wall_secs(self.clock_step_tolerance_secs)
    }
}

fn wall_secs(secs: u64) -> TimeDelta {
    TimeDelta::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
}

/// Convert a monotonic duration into a wall-clock offset, saturating on overflow.
pub fn wall_delta(duration: Duration) -> TimeDelta {
    let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX / 1_000);
    TimeDelta::milliseconds(millis.min(i64::MAX / 1_000))
}
