use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};

use crate::models::ActivityLevel;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Read side of the input sensor as seen by the tracker.
pub trait ActivitySource {
    /// Consuming read: classifies the events counted since the previous call and resets the count.
    fn activity_level(&self) -> ActivityLevel;
    /// Time since the last physical input. Does not reset anything.
    fn idle_duration(&self) -> Duration;
    /// Drop accumulated counts without touching the idle timer.
    fn reset_counters(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Click,
    Key,
    /// Pointer motion or scrolling. Refreshes the idle timer but is not counted as activity.
    Move,
}

struct Counters {
    clicks: u64,
    keys: u64,
    last_input: Instant,
    idle_tracking: bool,
}

/// Counters shared between the listener thread(s) and the sampling loop.
#[derive(Clone)]
pub struct InputMonitor {
    inner: Arc<Mutex<Counters>>,
}

impl InputMonitor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Counters {
                clicks: 0,
                keys: 0,
                last_input: Instant::now(),
                idle_tracking: true,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn record(&self, event: InputEvent) {
        let mut counters = self.lock();
        match event {
            InputEvent::Click => counters.clicks += 1,
            InputEvent::Key => counters.keys += 1,
            InputEvent::Move => {}
        }
        counters.last_input = Instant::now();
    }

    /// Align the idle timer with an idle time reported by the platform.
    pub fn sync_idle(&self, idle: Duration) {
        let now = Instant::now();
        let mut counters = self.lock();
        counters.last_input = now.checked_sub(idle).unwrap_or(now);
    }

    /// Without a working idle source the tracker must never believe the user left.
    pub fn disable_idle_tracking(&self) {
        self.lock().idle_tracking = false;
    }

    #[cfg(test)]
    fn event_count(&self) -> u64 {
        let counters = self.lock();
        counters.clicks + counters.keys
    }
}

impl Default for InputMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivitySource for InputMonitor {
    fn activity_level(&self) -> ActivityLevel {
        let total = {
            let mut counters = self.lock();
            let total = counters.clicks + counters.keys;
            counters.clicks = 0;
            counters.keys = 0;
            total
        };
        ActivityLevel::from_event_count(total)
    }

    fn idle_duration(&self) -> Duration {
        let counters = self.lock();
        if !counters.idle_tracking {
            return Duration::ZERO;
        }
        counters.last_input.elapsed()
    }

    fn reset_counters(&self) {
        let mut counters = self.lock();
        counters.clicks = 0;
        counters.keys = 0;
    }
}

/// Platform source of "time since last input".
pub trait IdleProbe: Send {
    fn idle_time(&mut self) -> Result<Duration>;
}

/// `xprintidle` prints the X server idle time in milliseconds.
#[derive(Debug, Default)]
pub struct XprintidleProbe;

impl IdleProbe for XprintidleProbe {
    fn idle_time(&mut self) -> Result<Duration> {
        let output = Command::new("xprintidle")
            .output()
            .context("failed to run xprintidle")?;
        if !output.status.success() {
            bail!("xprintidle exited with {}", output.status);
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let millis: u64 = text
            .trim()
            .parse()
            .map_err(|err| anyhow!("unexpected xprintidle output '{}': {err}", text.trim()))?;
        Ok(Duration::from_millis(millis))
    }
}

/// Poll `probe` on a background thread and keep the monitor's idle timer in
/// step with it. The poller cannot tell a key from a nudge of the mouse, so it
/// never counts events; that is left to [`spawn_event_listener`].
///
/// The first probe runs on the caller's thread so a missing probe is reported
/// before the listener is detached.
pub fn spawn_idle_listener<P>(
    monitor: InputMonitor,
    mut probe: P,
    poll_interval: Duration,
) -> Result<JoinHandle<()>>
where
    P: IdleProbe + 'static,
{
    let initial = probe.idle_time().context("idle probe unavailable")?;
    monitor.sync_idle(initial);

    thread::Builder::new()
        .name("tasklog-idle".into())
        .spawn(move || {
            log_info!("idle listener started (poll every {}ms)", poll_interval.as_millis());
            let mut failures: u32 = 0;
            loop {
                thread::sleep(poll_interval);
                match probe.idle_time() {
                    Ok(idle) => {
                        failures = 0;
                        monitor.sync_idle(idle);
                    }
                    Err(err) => {
                        failures += 1;
                        if failures == 1 {
                            log_warn!("idle probe failed: {err:#}");
                        }
                    }
                }
            }
        })
        .context("failed to spawn idle listener thread")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Xi2Kind {
    KeyPress,
    ButtonPress,
    Motion,
}

/// Line parser for `xinput test-xi2 --root`.
///
/// Raw events arrive for both the physical (slave) device and its master, so
/// only events whose device is their own source are kept. Releases are ignored.
#[derive(Debug, Default)]
pub struct Xi2Parser {
    kind: Option<Xi2Kind>,
    from_source: bool,
}

impl Xi2Parser {
    pub fn feed(&mut self, line: &str) -> Option<InputEvent> {
        let line = line.trim();

        if let Some(header) = line.strip_prefix("EVENT type") {
            self.kind = if header.ends_with("(RawKeyPress)") {
                Some(Xi2Kind::KeyPress)
            } else if header.ends_with("(RawButtonPress)") {
                Some(Xi2Kind::ButtonPress)
            } else if header.ends_with("(RawMotion)") {
                Some(Xi2Kind::Motion)
            } else {
                None
            };
            self.from_source = false;
            return None;
        }

        if let Some(ids) = line.strip_prefix("device:") {
            // "device: <device> (<source>)"
            let mut ids = ids
                .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
                .filter(|id| !id.is_empty());
            self.from_source = match (ids.next(), ids.next()) {
                (Some(device), Some(source)) => device == source,
                _ => false,
            };
            return None;
        }

        let detail = line.strip_prefix("detail:")?.trim();
        let kind = self.kind.take()?;
        if !self.from_source {
            return None;
        }

        match kind {
            Xi2Kind::KeyPress => Some(InputEvent::Key),
            Xi2Kind::Motion => Some(InputEvent::Move),
            // X11 reports wheel steps as buttons 4 to 7.
            Xi2Kind::ButtonPress => match detail.parse::<u32>() {
                Ok(4..=7) => Some(InputEvent::Move),
                _ => Some(InputEvent::Click),
            },
        }
    }
}

/// Feed every event parsed from `reader` into the monitor until end of input.
pub fn pump_events<R: BufRead>(reader: R, monitor: &InputMonitor) -> Result<u64> {
    let mut parser = Xi2Parser::default();
    let mut seen = 0;
    for line in reader.lines() {
        let line = line.context("failed to read input event stream")?;
        if let Some(event) = parser.feed(&line) {
            monitor.record(event);
            seen += 1;
        }
    }
    Ok(seen)
}

/// Count clicks and keys from `xinput test-xi2 --root` on a background thread.
pub fn spawn_event_listener(monitor: InputMonitor) -> Result<JoinHandle<()>> {
    let mut child = Command::new("xinput")
        .args(["test-xi2", "--root"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to run xinput")?;
    let stdout = child
        .stdout
        .take()
        .context("xinput stdout was not captured")?;

    thread::Builder::new()
        .name("tasklog-input".into())
        .spawn(move || {
            log_info!("input listener started");
            match pump_events(BufReader::new(stdout), &monitor) {
                Ok(seen) => {
                    log_warn!("xinput event stream ended after {seen} events");
                }
                Err(err) => {
                    log_warn!("input listener stopped: {err:#}");
                }
            }
            if let Err(err) = child.wait() {
                log_warn!("failed to reap xinput: {err}");
            }
        })
        .context("failed to spawn input listener thread")
}
