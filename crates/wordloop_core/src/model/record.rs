//! Per-word memory state and daily aggregates.
//!
//! # Responsibility
//! - Define the mutable memory state of one (learner, word) pair.
//! - Define the answer outcome enum and the daily counter kinds.
//!
//! # Invariants
//! - `next_interval_days >= 1`.
//! - `due_on = (last_reviewed_on or last_learned_on) + next_interval_days`.
//! - Mastered records are never due.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Learner's self-assessed answer for one exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Answered correctly without help.
    Recalled,
    /// Answered with hesitation or partial help.
    Partial,
    /// Could not answer.
    Forgot,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recalled => "recalled",
            Self::Partial => "partial",
            Self::Forgot => "forgot",
        }
    }

    /// `recalled` and `partial` both count as a correct answer.
    pub fn is_correct(self) -> bool {
        !matches!(self, Self::Forgot)
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome text outside `recalled | partial | forgot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeParseError(pub String);

impl Display for OutcomeParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported outcome `{}`; expected recalled|partial|forgot",
            self.0
        )
    }
}

impl Error for OutcomeParseError {}

impl FromStr for Outcome {
    type Err = OutcomeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recalled" => Ok(Self::Recalled),
            "partial" => Ok(Self::Partial),
            "forgot" => Ok(Self::Forgot),
            _ => Err(OutcomeParseError(value.to_string())),
        }
    }
}

/// Which daily counter a committed word feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DailyKind {
    Learned,
    Reviewed,
}

impl DailyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Learned => "learned",
            Self::Reviewed => "reviewed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "learned" => Some(Self::Learned),
            "reviewed" => Some(Self::Reviewed),
            _ => None,
        }
    }
}

/// Spaced-repetition state for one word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    /// Removed from active scheduling once retained long-term.
    pub mastered: bool,
    /// Start of the new-word phase.
    pub last_learned_on: NaiveDate,
    /// End of the new-word phase.
    pub next_learn_on: NaiveDate,
    /// Most recent review; `None` while the word is only learned.
    pub last_reviewed_on: Option<NaiveDate>,
    /// Consecutive successful reviews.
    pub repetition_count: u32,
    /// Multiplicative interval scalar.
    pub ease_factor: f64,
    /// Gap in days until the word is due again.
    pub next_interval_days: u32,
}

impl MemoryState {
    /// Date on which the word becomes due for review.
    pub fn due_on(&self) -> NaiveDate {
        let anchor = self.last_reviewed_on.unwrap_or(self.last_learned_on);
        anchor
            .checked_add_days(Days::new(u64::from(self.next_interval_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        !self.mastered && self.due_on() <= today
    }
}

/// Persisted memory state of one (learner, word) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub user_id: String,
    pub word_id: String,
    pub memory: MemoryState,
}

/// One day of learner activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySum {
    pub day: NaiveDate,
    pub learned: u32,
    pub reviewed: u32,
}

impl DailySum {
    pub fn total(&self) -> u32 {
        self.learned + self.reviewed
    }
}
