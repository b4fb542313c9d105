use crate::models::{ActivityLevel, SessionRecord, Timestamp};

use super::config::SegmentationConfig;
use super::identity::{BrowserSet, TaskIdentity};

/// One tick's view of the foreground window, after URL fallback has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub identity: TaskIdentity,
    pub title: String,
}

/// A task together with the moment it started being observed.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub identity: TaskIdentity,
    /// Latest title seen; informational only.
    pub title: String,
    pub start: Timestamp,
}

impl Span {
    fn open(observation: Observation, start: Timestamp) -> Self {
        Self {
            identity: observation.identity,
            title: observation.title,
            start,
        }
    }

    fn absorb(&mut self, observation: Observation) {
        self.title = observation.title;
        if !observation.identity.url.is_empty() {
            self.identity.url = observation.identity.url;
        }
    }

    pub fn close(self, end: Timestamp) -> ClosedSpan {
        ClosedSpan {
            identity: self.identity,
            title: self.title,
            start: self.start,
            end,
        }
    }
}

/// A span whose end is known but whose activity level has not been sampled yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSpan {
    pub identity: TaskIdentity,
    pub title: String,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl ClosedSpan {
    pub fn into_record(self, activity_level: ActivityLevel) -> SessionRecord {
        SessionRecord {
            process: self.identity.process,
            title: self.title,
            url: self.identity.url,
            start: self.start,
            end: self.end,
            activity_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Only the committed task is being observed.
    Stable(Span),
    /// The window differs from the committed task and the debounce timer is running.
    Switching { stable: Span, pending: Span },
}

/// What a single step did; `Committed` is the only variant that produces a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Extended,
    RolledBack { excursion: TaskIdentity },
    PendingOpened,
    PendingHeld,
    PendingReplaced,
    Committed(ClosedSpan),
}

impl SessionState {
    pub fn seed(observation: Observation, start: Timestamp) -> Self {
        SessionState::Stable(Span::open(observation, start))
    }

    pub fn stable(&self) -> &Span {
        match self {
            SessionState::Stable(stable) => stable,
            SessionState::Switching { stable, .. } => stable,
        }
    }

    pub fn pending(&self) -> Option<&Span> {
        match self {
            SessionState::Stable(_) => None,
            SessionState::Switching { pending, .. } => Some(pending),
        }
    }

    /// Close the stable span at `end`, discarding any pending candidate.
    pub fn close(self, end: Timestamp) -> ClosedSpan {
        match self {
            SessionState::Stable(stable) => stable.close(end),
            SessionState::Switching { stable, .. } => stable.close(end),
        }
    }

    /// Pure transition for one tick.
    ///
    /// A confirmed switch closes the stable span at the moment the candidate first
    /// appeared, and the candidate keeps that moment as its own start.
    pub fn step(
        self,
        observation: Observation,
        now: Timestamp,
        config: &SegmentationConfig,
        browsers: &BrowserSet,
    ) -> (SessionState, Transition) {
        match self {
            SessionState::Stable(mut stable) => {
                if stable.identity.same_task(&observation.identity, browsers) {
                    stable.absorb(observation);
                    (SessionState::Stable(stable), Transition::Extended)
                } else {
                    let pending = Span::open(observation, now);
                    (
                        SessionState::Switching { stable, pending },
                        Transition::PendingOpened,
                    )
                }
            }
            SessionState::Switching {
                mut stable,
                pending,
            } => {
                if stable.identity.same_task(&observation.identity, browsers) {
                    stable.absorb(observation);
                    return (
                        SessionState::Stable(stable),
                        Transition::RolledBack {
                            excursion: pending.identity,
                        },
                    );
                }

                if !pending.identity.same_task(&observation.identity, browsers) {
                    let pending = Span::open(observation, now);
                    return (
                        SessionState::Switching { stable, pending },
                        Transition::PendingReplaced,
                    );
                }

                if now - pending.start > config.check_interval() {
                    let closed = stable.close(pending.start);
                    (SessionState::Stable(pending), Transition::Committed(closed))
                } else {
                    (
                        SessionState::Switching { stable, pending },
                        Transition::PendingHeld,
                    )
                }
            }
        }
    }
}
