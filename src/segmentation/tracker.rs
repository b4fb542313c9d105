use std::mem;
use std::time::Duration;

use crate::models::{SessionRecord, Timestamp};
use crate::sensing::{ActivitySource, TickTime, WindowSensor};

use super::config::{wall_delta, SegmentationConfig};
use super::identity::{BrowserSet, TaskIdentity};
use super::state::{ClosedSpan, Observation, SessionState, Transition};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Process name used when the sensor could not resolve one.
const UNKNOWN_PROCESS: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    /// No valid sample yet. `resume_at` is set when a reseed failed and keeps
    /// the reseed instant as the start of the next span.
    Waiting { resume_at: Option<Timestamp> },
    Tracking(SessionState),
    Idle { since: Timestamp },
}

/// Drives [`SessionState`] once per tick and handles the two interruptions that
/// take priority over switch detection: a suspend gap and an idle window.
pub struct Tracker<A> {
    config: SegmentationConfig,
    browsers: BrowserSet,
    activity: A,
    phase: Phase,
    last_tick: Option<TickTime>,
}

impl<A: ActivitySource> Tracker<A> {
    pub fn new(config: SegmentationConfig, browsers: BrowserSet, activity: A) -> Self {
        Self {
            config,
            browsers,
            activity,
            phase: Phase::Waiting { resume_at: None },
            last_tick: None,
        }
    }

    pub fn session(&self) -> Option<&SessionState> {
        match &self.phase {
            Phase::Tracking(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle { .. })
    }

    /// Process one tick. Returned records are in increasing start order.
    pub fn tick<S>(&mut self, at: TickTime, sensor: &mut S) -> Vec<SessionRecord>
    where
        S: WindowSensor + ?Sized,
    {
        let mut records = Vec::new();

        if let Some(previous) = self.last_tick.replace(at) {
            let gap = at.monotonic.saturating_sub(previous.monotonic);
            if gap > self.config.sleep_threshold() {
                self.resume_after_sleep(previous, at, gap, sensor, &mut records);
                return records;
            }

            let drift = (at.wall - previous.wall) - wall_delta(gap);
            if drift.abs() > self.config.clock_step_tolerance() {
                log_warn!("Wall clock stepped by {}s", drift.num_seconds());
                let stepped_at = previous.wall + wall_delta(gap);
                self.resume_after_clock_step(stepped_at, at.wall, sensor, &mut records);
                return records;
            }
        }

        if self.handle_idle(at.wall, sensor, &mut records) {
            return records;
        }

        self.observe(at.wall, sensor, &mut records);
        records
    }

    /// Forced commit on shutdown: the current span, or the idle window, ends at `now`.
    pub fn finish(&mut self, now: Timestamp) -> Vec<SessionRecord> {
        let mut records = Vec::new();
        match mem::replace(&mut self.phase, Phase::Waiting { resume_at: None }) {
            Phase::Tracking(state) => self.commit(state.close(now), &mut records),
            Phase::Idle { since } => self.emit(SessionRecord::idle(since, now), &mut records),
            Phase::Waiting { .. } => {}
        }
        records
    }

    /// The suspend instant is `now - gap`, but never before the last tick seen
    /// awake: a wall clock set back during the suspend must not end the span
    /// before it started.
    fn resume_after_sleep<S>(
        &mut self,
        previous: TickTime,
        at: TickTime,
        gap: Duration,
        sensor: &mut S,
        records: &mut Vec<SessionRecord>,
    ) where
        S: WindowSensor + ?Sized,
    {
        let suspended_at = (at.wall - wall_delta(gap)).max(previous.wall);
        log_info!("Sleep detected: {}s gap", gap.as_secs());

        match mem::replace(&mut self.phase, Phase::Waiting { resume_at: None }) {
            Phase::Tracking(state) => self.commit(state.close(suspended_at), records),
            Phase::Idle { since } => self.emit(SessionRecord::idle(since, suspended_at), records),
            Phase::Waiting { .. } => {}
        }

        self.activity.reset_counters();
        self.reseed(at.wall, sensor);
    }

    /// The wall clock jumped without matching monotonic time. Whatever was open
    /// ends at `stepped_at`, the last tick's instant advanced by the monotonic
    /// gap on the old clock, and restarts at `now` on the new one.
    fn resume_after_clock_step<S>(
        &mut self,
        stepped_at: Timestamp,
        now: Timestamp,
        sensor: &mut S,
        records: &mut Vec<SessionRecord>,
    ) where
        S: WindowSensor + ?Sized,
    {
        match mem::replace(&mut self.phase, Phase::Waiting { resume_at: None }) {
            Phase::Tracking(state) => {
                self.commit(state.close(stepped_at), records);
                self.reseed(now, sensor);
            }
            Phase::Idle { since } => {
                self.emit(SessionRecord::idle(since, stepped_at), records);
                self.phase = Phase::Idle { since: now };
            }
            Phase::Waiting { resume_at } => {
                self.phase = Phase::Waiting {
                    resume_at: resume_at.map(|_| now),
                };
            }
        }
    }

    /// Returns true when the tick is consumed by idle handling.
    fn handle_idle<S>(
        &mut self,
        now: Timestamp,
        sensor: &mut S,
        records: &mut Vec<SessionRecord>,
    ) -> bool
    where
        S: WindowSensor + ?Sized,
    {
        let idle = self.activity.idle_duration();

        match mem::replace(&mut self.phase, Phase::Waiting { resume_at: None }) {
            Phase::Idle { since } => {
                if idle < self.config.idle_exit_threshold() {
                    log_info!("Idle end: {}s", (now - since).num_seconds());
                    self.emit(SessionRecord::idle(since, now), records);
                    self.activity.reset_counters();
                    self.reseed(now, sensor);
                } else {
                    self.phase = Phase::Idle { since };
                }
                true
            }
            Phase::Tracking(state) if idle > self.config.idle_timeout() => {
                // Never start the idle window before the task it interrupts.
                let since = (now - wall_delta(idle)).max(state.stable().start);
                log_info!("Idle start: no input for {}s", idle.as_secs());
                self.commit(state.close(since), records);
                self.phase = Phase::Idle { since };
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    fn observe<S>(&mut self, now: Timestamp, sensor: &mut S, records: &mut Vec<SessionRecord>)
    where
        S: WindowSensor + ?Sized,
    {
        let Some(mut observation) = read_observation(sensor) else {
            return;
        };

        self.phase = match mem::replace(&mut self.phase, Phase::Waiting { resume_at: None }) {
            Phase::Waiting { resume_at } => {
                log_info!(
                    "Tracking: {} - {}",
                    observation.identity.process,
                    observation.title
                );
                Phase::Tracking(SessionState::seed(observation, resume_at.unwrap_or(now)))
            }
            Phase::Tracking(state) => {
                self.fill_missing_url(&mut observation, &state);
                let (next, transition) =
                    state.step(observation, now, &self.config, &self.browsers);
                match transition {
                    Transition::RolledBack { excursion } => {
                        log_info!("Skip short switch: {}", excursion.process);
                    }
                    Transition::Committed(closed) => {
                        log_info!(
                            "Switch: {} -> {}",
                            closed.identity.process,
                            next.stable().identity.process
                        );
                        self.commit(closed, records);
                    }
                    _ => {}
                }
                Phase::Tracking(next)
            }
            idle @ Phase::Idle { .. } => idle,
        };
    }

    fn reseed<S>(&mut self, now: Timestamp, sensor: &mut S)
    where
        S: WindowSensor + ?Sized,
    {
        self.phase = match read_observation(sensor) {
            Some(observation) => {
                log_info!(
                    "Tracking: {} - {}",
                    observation.identity.process,
                    observation.title
                );
                Phase::Tracking(SessionState::seed(observation, now))
            }
            None => Phase::Waiting {
                resume_at: Some(now),
            },
        };
    }

    /// A browser that reported no URL inherits the URL of the span with the same
    /// process, stable first. The inherited URL may be stale.
    fn fill_missing_url(&self, observation: &mut Observation, state: &SessionState) {
        let identity = &observation.identity;
        if !identity.url.is_empty() || !self.browsers.contains(&identity.process) {
            return;
        }

        let stable = state.stable();
        let source = if stable.identity.process == identity.process {
            Some(stable)
        } else {
            state
                .pending()
                .filter(|pending| pending.identity.process == identity.process)
        };

        if let Some(span) = source {
            observation.identity.url = span.identity.url.clone();
        }
    }

    /// Short spans are dropped before the activity counters are consumed, so
    /// their input carries over into the next record.
    fn commit(&mut self, span: ClosedSpan, records: &mut Vec<SessionRecord>) {
        if span.end - span.start < self.config.min_record_duration() {
            return;
        }
        let level = self.activity.activity_level();
        self.emit(span.into_record(level), records);
    }

    fn emit(&self, record: SessionRecord, records: &mut Vec<SessionRecord>) {
        let min = self.config.min_record_duration();
        let parts = record.split_at_midnight();
        if parts.len() > 1 {
            log_info!("Day split: {} parts", parts.len());
        }

        for part in parts {
            if part.duration() < min {
                continue;
            }
            log_info!(
                "Record: {} ({}s) [{}]",
                part.process,
                part.duration().num_seconds(),
                part.activity_level.as_str()
            );
            records.push(part);
        }
    }
}

fn read_observation<S>(sensor: &mut S) -> Option<Observation>
where
    S: WindowSensor + ?Sized,
{
    let sample = sensor.active_window()?;
    let title = sample.title.trim();
    if title.is_empty() {
        return None;
    }

    let process = match sample.process.trim() {
        "" => UNKNOWN_PROCESS,
        name => name,
    };

    Some(Observation {
        identity: TaskIdentity::new(process, sample.url.trim()),
        title: title.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityLevel, IDLE_PROCESS};
    use crate::sensing::WindowSample;
    use chrono::{FixedOffset, TimeDelta, TimeZone};
    use std::cell::Cell;

    #[derive(Default)]
    struct FakeActivity {
        level: Cell<Option<ActivityLevel>>,
        idle: Cell<Duration>,
        resets: Cell<u32>,
    }

    impl ActivitySource for FakeActivity {
        fn activity_level(&self) -> ActivityLevel {
            self.level.get().unwrap_or(ActivityLevel::Medium)
        }

        fn idle_duration(&self) -> Duration {
            self.idle.get()
        }

        fn reset_counters(&self) {
            self.resets.set(self.resets.get() + 1);
        }
    }

    struct FakeSensor {
        current: Option<WindowSample>,
    }

    impl FakeSensor {
        fn showing(title: &str, process: &str, url: &str) -> Self {
            Self {
                current: Some(WindowSample::new(title, process, url)),
            }
        }

        fn show(&mut self, title: &str, process: &str, url: &str) {
            self.current = Some(WindowSample::new(title, process, url));
        }
    }

    impl WindowSensor for FakeSensor {
        fn active_window(&mut self) -> Option<WindowSample> {
            self.current.clone()
        }
    }

    fn utc(hour: u32, min: u32) -> Timestamp {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 2, hour, min, 0)
            .unwrap()
    }

    fn base() -> Timestamp {
        utc(9, 0)
    }

    fn t(secs: u64) -> Timestamp {
        base() + TimeDelta::seconds(secs as i64)
    }

    fn at(secs: u64) -> TickTime {
        TickTime {
            wall: t(secs),
            monotonic: Duration::from_secs(secs),
        }
    }

    fn tracker() -> Tracker<FakeActivity> {
        Tracker::new(
            SegmentationConfig::default(),
            BrowserSet::new(["chrome.exe", "firefox.exe"]),
            FakeActivity::default(),
        )
    }

    fn run(
        tracker: &mut Tracker<FakeActivity>,
        sensor: &mut FakeSensor,
        ticks: impl IntoIterator<Item = u64>,
    ) -> Vec<SessionRecord> {
        ticks
            .into_iter()
            .flat_map(|secs| tracker.tick(at(secs), sensor))
            .collect()
    }

    #[test]
    fn short_excursion_then_sustained_switch() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");

        assert!(run(&mut tracker, &mut sensor, 0..5).is_empty());

        sensor.show("Example", "chrome.exe", "x");
        assert!(run(&mut tracker, &mut sensor, 5..12).is_empty());

        sensor.show("notes.txt - Notepad", "notepad.exe", "");
        assert!(run(&mut tracker, &mut sensor, 12..40).is_empty());
        let state = tracker.session().unwrap();
        assert_eq!(state.stable().start, t(0));
        assert!(state.pending().is_none());

        sensor.show("Example", "chrome.exe", "x");
        let records = run(&mut tracker, &mut sensor, 40..=71);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].process, "notepad.exe");
        assert_eq!(records[0].start, t(0));
        assert_eq!(records[0].end, t(40));
        assert_eq!(records[0].activity_level, ActivityLevel::Medium);

        let stable = tracker.session().unwrap().stable();
        assert_eq!(stable.identity, TaskIdentity::new("chrome.exe", "x"));
        assert_eq!(stable.start, t(40));
    }

    #[test]
    fn sleep_gap_commits_up_to_suspend_and_reseeds() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        assert!(run(&mut tracker, &mut sensor, 0..=10).is_empty());

        sensor.show("main.rs - tasklog", "code.exe", "");
        let records = tracker.tick(at(310), &mut sensor);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].process, "notepad.exe");
        assert_eq!(records[0].end, t(10));
        assert_eq!(tracker.activity.resets.get(), 1);

        let state = tracker.session().unwrap();
        assert_eq!(state.stable().identity.process, "code.exe");
        assert_eq!(state.stable().start, t(310));
    }

    #[test]
    fn failed_reseed_keeps_resume_instant() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        run(&mut tracker, &mut sensor, 0..=10);

        sensor.current = None;
        tracker.tick(at(310), &mut sensor);
        assert!(tracker.session().is_none());

        sensor.show("main.rs - tasklog", "code.exe", "");
        tracker.tick(at(313), &mut sensor);
        assert_eq!(tracker.session().unwrap().stable().start, t(310));
    }

    #[test]
    fn idle_round_trip_emits_one_idle_record() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        let mut records = run(&mut tracker, &mut sensor, 0..=100);

        for secs in 101..500 {
            tracker.activity.idle.set(Duration::from_secs(secs - 100));
            records.extend(tracker.tick(at(secs), &mut sensor));
        }
        assert!(tracker.is_idle());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].process, "notepad.exe");
        assert_eq!(records[0].end, t(100));

        tracker.activity.idle.set(Duration::from_secs(1));
        records.extend(tracker.tick(at(500), &mut sensor));

        let idle: Vec<_> = records.iter().filter(|r| r.is_idle()).collect();
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].process, IDLE_PROCESS);
        assert_eq!(idle[0].start, t(100));
        assert_eq!(idle[0].end, t(500));
        assert_eq!(idle[0].activity_level, ActivityLevel::Low);

        assert!(!tracker.is_idle());
        assert_eq!(tracker.session().unwrap().stable().start, t(500));
    }

    #[test]
    fn idle_start_never_precedes_stable_start() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        run(&mut tracker, &mut sensor, 0..=10);

        tracker.activity.idle.set(Duration::from_secs(400));
        assert!(tracker.tick(at(11), &mut sensor).is_empty());
        assert!(tracker.is_idle());

        let records = tracker.finish(t(50));
        assert_eq!(records.len(), 1);
        assert!(records[0].is_idle());
        assert_eq!(records[0].start, t(0));
    }

    #[test]
    fn sleep_while_idle_closes_idle_window() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        run(&mut tracker, &mut sensor, 0..=400);

        tracker.activity.idle.set(Duration::from_secs(301));
        let entered = run(&mut tracker, &mut sensor, [401, 402]);
        assert_eq!(entered.len(), 1);
        assert_eq!(entered[0].end, t(100));
        assert!(tracker.is_idle());

        tracker.activity.idle.set(Duration::ZERO);
        let records = tracker.tick(at(1_402), &mut sensor);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_idle());
        assert_eq!(records[0].start, t(100));
        assert_eq!(records[0].end, t(402));
        assert_eq!(tracker.session().unwrap().stable().start, t(1_402));
    }

    #[test]
    fn short_stable_is_dropped_but_candidate_promoted() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        run(&mut tracker, &mut sensor, [0]);

        sensor.show("Example", "chrome.exe", "x");
        let records = run(&mut tracker, &mut sensor, 1..=32);
        assert!(records.is_empty());

        let stable = tracker.session().unwrap().stable();
        assert_eq!(stable.identity.process, "chrome.exe");
        assert_eq!(stable.start, t(1));
    }

    #[test]
    fn empty_browser_url_inherits_pending_url() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        run(&mut tracker, &mut sensor, [0]);

        sensor.show("GitHub", "chrome.exe", "github.com");
        run(&mut tracker, &mut sensor, [5]);
        sensor.show("GitHub", "chrome.exe", "");
        run(&mut tracker, &mut sensor, [6]);

        let pending = tracker.session().unwrap().pending().unwrap();
        assert_eq!(pending.start, t(5));
        assert_eq!(pending.identity.url, "github.com");
    }

    #[test]
    fn blank_title_is_skipped() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("   ", "notepad.exe", "");
        run(&mut tracker, &mut sensor, 0..3);
        assert!(tracker.session().is_none());

        sensor.show(" notes.txt ", "", "");
        run(&mut tracker, &mut sensor, [3]);
        let stable = tracker.session().unwrap().stable();
        assert_eq!(stable.title, "notes.txt");
        assert_eq!(stable.identity.process, UNKNOWN_PROCESS);
        assert_eq!(stable.start, t(3));
    }

    #[test]
    fn finish_splits_at_midnight() {
        let late = utc(23, 59);
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        tracker.tick(
            TickTime {
                wall: late,
                monotonic: Duration::ZERO,
            },
            &mut sensor,
        );

        let records = tracker.finish(late + TimeDelta::minutes(2));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].start, late);
        assert_eq!(records[0].end, records[1].start);
        assert_eq!(records[1].start.date_naive(), late.date_naive().succ_opt().unwrap());
        assert_eq!(records[1].end, late + TimeDelta::minutes(2));
    }

    #[test]
    fn finish_while_idle_emits_idle_record() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        run(&mut tracker, &mut sensor, 0..=100);
        tracker.activity.idle.set(Duration::from_secs(301));
        run(&mut tracker, &mut sensor, [101]);

        let records = tracker.finish(t(200));
        assert_eq!(records.len(), 1);
        assert!(records[0].is_idle());
        assert_eq!(records[0].end, t(200));
        assert!(tracker.session().is_none());
    }

    /// Ticks `from..to` with the wall clock `offset_secs` away from the
    /// monotonic one.
    fn run_shifted(
        tracker: &mut Tracker<FakeActivity>,
        sensor: &mut FakeSensor,
        origin: Timestamp,
        ticks: std::ops::Range<u64>,
        offset_secs: i64,
    ) -> Vec<SessionRecord> {
        ticks
            .flat_map(|secs| {
                let at = TickTime {
                    wall: origin + TimeDelta::seconds(secs as i64 + offset_secs),
                    monotonic: Duration::from_secs(secs),
                };
                tracker.tick(at, sensor)
            })
            .collect()
    }

    #[test]
    fn dst_fall_back_keeps_the_whole_span() {
        let summer = FixedOffset::east_opt(3_600).unwrap();
        let winter = FixedOffset::east_opt(0).unwrap();
        let start = summer.with_ymd_and_hms(2026, 10, 25, 1, 30, 0).unwrap();
        let tick = |secs: u64| TickTime {
            wall: (start + TimeDelta::seconds(secs as i64))
                .with_timezone(if secs < 1_800 { &summer } else { &winter }),
            monotonic: Duration::from_secs(secs),
        };

        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        let mut records: Vec<_> = (0..2_400)
            .flat_map(|secs| tracker.tick(tick(secs), &mut sensor))
            .collect();
        sensor.show("main.rs - tasklog", "code.exe", "");
        records.extend((2_400..=2_460).flat_map(|secs| tracker.tick(tick(secs), &mut sensor)));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].process, "notepad.exe");
        assert_eq!(records[0].start, start);
        assert_eq!(records[0].duration(), TimeDelta::minutes(40));
        assert!(records[0]
            .format_line()
            .starts_with("[2026-10-25 01:30:00 - 2026-10-25 01:10:00] <notepad.exe>"));
        assert_eq!(tracker.session().unwrap().stable().start, tick(2_400).wall);
    }

    #[test]
    fn wall_clock_set_back_splits_span_without_losing_time() {
        let origin = utc(1, 30);
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");

        let mut records = run_shifted(&mut tracker, &mut sensor, origin, 0..1_800, 0);
        assert!(records.is_empty());

        // Wall clock set back an hour at 02:00 while monotonic time kept going.
        records.extend(run_shifted(&mut tracker, &mut sensor, origin, 1_800..2_400, -3_600));
        sensor.show("main.rs - tasklog", "code.exe", "");
        records.extend(run_shifted(&mut tracker, &mut sensor, origin, 2_400..2_461, -3_600));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].process, "notepad.exe");
        assert_eq!(records[0].start, utc(1, 30));
        assert_eq!(records[0].end, utc(2, 0));
        assert_eq!(records[1].process, "notepad.exe");
        assert_eq!(records[1].start, utc(1, 0));
        assert_eq!(records[1].end, utc(1, 10));
        assert!(records.iter().all(|r| r.end > r.start));

        let total: TimeDelta = records.iter().map(SessionRecord::duration).sum();
        assert_eq!(total, TimeDelta::minutes(40));
        assert_eq!(tracker.session().unwrap().stable().identity.process, "code.exe");
    }

    #[test]
    fn small_wall_jitter_is_not_a_clock_step() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        run(&mut tracker, &mut sensor, 0..=10);

        let records = run_shifted(&mut tracker, &mut sensor, base(), 11..20, 3);
        assert!(records.is_empty());
        assert_eq!(tracker.session().unwrap().stable().start, t(0));
    }

    #[test]
    fn clock_step_while_idle_restarts_idle_window() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        run(&mut tracker, &mut sensor, 0..=400);
        tracker.activity.idle.set(Duration::from_secs(301));
        run(&mut tracker, &mut sensor, [401, 402]);
        assert!(tracker.is_idle());

        let records = run_shifted(&mut tracker, &mut sensor, base(), 403..404, -600);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_idle());
        assert_eq!(records[0].start, t(100));
        assert_eq!(records[0].end, t(403));
        assert!(tracker.is_idle());

        assert!(run_shifted(&mut tracker, &mut sensor, base(), 404..410, -600).is_empty());
        tracker.activity.idle.set(Duration::ZERO);
        let records = run_shifted(&mut tracker, &mut sensor, base(), 410..411, -600);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_idle());
        assert_eq!(records[0].start, t(403) - TimeDelta::seconds(600));
        assert_eq!(records[0].end, t(410) - TimeDelta::seconds(600));
    }

    #[test]
    fn sleep_with_wall_set_back_ends_at_last_awake_tick() {
        let mut tracker = tracker();
        let mut sensor = FakeSensor::showing("notes.txt - Notepad", "notepad.exe", "");
        run(&mut tracker, &mut sensor, 0..=10);

        // 300s asleep, and the wall clock reads an hour earlier on resume, so
        // `now - gap` lands before the span started.
        let resumed = t(310) - TimeDelta::hours(1);
        let records = tracker.tick(
            TickTime {
                wall: resumed,
                monotonic: Duration::from_secs(310),
            },
            &mut sensor,
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start, t(0));
        assert_eq!(records[0].end, t(10));
        assert_eq!(tracker.session().unwrap().stable().start, resumed);
    }
}
