use serde::{Deserialize, Serialize};

/// Input events counted below this are `Low`.
const MEDIUM_THRESHOLD: u64 = 5;
/// Input events counted at or above this are `High`.
const HIGH_THRESHOLD: u64 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Low,
    Medium,
    High,
}

impl ActivityLevel {
    pub fn from_event_count(count: u64) -> Self {
        if count < MEDIUM_THRESHOLD {
            ActivityLevel::Low
        } else if count < HIGH_THRESHOLD {
            ActivityLevel::Medium
        } else {
            ActivityLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLevel::Low => "low",
            ActivityLevel::Medium => "medium",
            ActivityLevel::High => "high",
        }
    }
}

impl Default for ActivityLevel {
    fn default() -> Self {
        ActivityLevel::Low
    }
}
