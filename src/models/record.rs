use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use super::ActivityLevel;

/// Process name used for the synthetic record covering an idle window.
pub const IDLE_PROCESS: &str = "idle";
pub const IDLE_TITLE: &str = "System idle";

/// Timestamp layout used in formatted lines and the raw log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An absolute instant carrying the local UTC offset it was read in. Arithmetic
/// is on the instant, so an offset change (DST) never makes time run backwards.
pub type Timestamp = DateTime<FixedOffset>;

/// A finished span of work on one task. Never mutated once handed to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub process: String,
    pub title: String,
    pub url: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub activity_level: ActivityLevel,
}

impl SessionRecord {
    pub fn idle(start: Timestamp, end: Timestamp) -> Self {
        Self {
            process: IDLE_PROCESS.to_string(),
            title: IDLE_TITLE.to_string(),
            url: String::new(),
            start,
            end,
            activity_level: ActivityLevel::Low,
        }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn is_idle(&self) -> bool {
        self.process == IDLE_PROCESS
    }

    /// Local calendar date of the start.
    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// `[start - end] <process> [activity: level] [URL: url] title`, URL omitted when empty.
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "[{} - {}] <{}> [activity: {}]",
            self.start.format(TIMESTAMP_FORMAT),
            self.end.format(TIMESTAMP_FORMAT),
            self.process,
            self.activity_level.as_str(),
        );
        if !self.url.is_empty() {
            line.push_str(&format!(" [URL: {}]", self.url));
        }
        line.push(' ');
        line.push_str(&self.title);
        line
    }

    /// Split at every local midnight the record crosses, counted in the start's
    /// UTC offset. The parts are contiguous and keep the identity and activity
    /// level of the unsplit record.
    pub fn split_at_midnight(self) -> Vec<SessionRecord> {
        let mut parts = Vec::new();
        let mut current = self;

        while current.start.date_naive()
            < current.end.with_timezone(current.start.offset()).date_naive()
        {
            let Some(midnight) = next_midnight(current.start) else {
                break;
            };
            let mut head = current.clone();
            head.end = midnight;
            current.start = midnight;
            parts.push(head);
        }

        parts.push(current);
        parts
    }
}

fn next_midnight(at: Timestamp) -> Option<Timestamp> {
    at.date_naive()
        .succ_opt()?
        .and_time(NaiveTime::MIN)
        .and_local_timezone(*at.offset())
        .single()
}
