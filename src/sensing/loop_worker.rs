use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::dispatch::BatchDispatcher;
use crate::segmentation::Tracker;

use super::clock::{wall_now, TickTime};
use super::input::ActivitySource;
use super::window::WindowSensor;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::log_info;

const TICK_INTERVAL_MILLIS: u64 = 1_000;

/// Samples once per second until cancelled, then commits the open span and
/// flushes whatever is still buffered.
///
/// The tick body shells out to the sensors, so it runs under `block_in_place`
/// and needs the multi-threaded runtime.
pub async fn tracking_loop<A, S>(
    mut tracker: Tracker<A>,
    mut sensor: S,
    mut dispatcher: BatchDispatcher,
    cancel_token: CancellationToken,
) where
    A: ActivitySource,
    S: WindowSensor,
{
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MILLIS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::task::block_in_place(|| {
                    for record in tracker.tick(TickTime::now(), &mut sensor) {
                        dispatcher.append(record);
                    }
                });
            }
            _ = cancel_token.cancelled() => {
                log_info!(
                    "tracking loop shutting down (idle: {}, buffered: {})",
                    tracker.is_idle(),
                    dispatcher.pending()
                );
                for record in tracker.finish(wall_now()) {
                    dispatcher.append(record);
                }
                dispatcher.flush();
                break;
            }
        }
    }
}
