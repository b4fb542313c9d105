use std::sync::OnceLock;
use std::time::{Duration, Instant};

use chrono::Local;

use crate::models::Timestamp;

/// Wall and monotonic readings taken together at the top of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTime {
    pub wall: Timestamp,
    pub monotonic: Duration,
}

impl TickTime {
    pub fn now() -> Self {
        Self {
            wall: wall_now(),
            monotonic: monotonic_now(),
        }
    }
}

/// Current instant in the local UTC offset in force right now.
pub fn wall_now() -> Timestamp {
    Local::now().fixed_offset()
}

/// Monotonic clock that keeps counting while the machine is suspended, so a
/// suspend shows up as a gap between ticks.
#[cfg(target_os = "linux")]
pub fn monotonic_now() -> Duration {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_BOOTTIME, &mut ts) };
    if rc != 0 {
        return process_elapsed();
    }
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

#[cfg(not(target_os = "linux"))]
pub fn monotonic_now() -> Duration {
    process_elapsed()
}

fn process_elapsed() -> Duration {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    ORIGIN.get_or_init(Instant::now).elapsed()
}
