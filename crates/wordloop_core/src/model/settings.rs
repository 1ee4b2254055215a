//! Per-learner learning configuration.
//!
//! # Responsibility
//! - Hold every tunable the scheduler reads: group sizing, commit policy,
//!   carry expiry and memory-model constants.
//! - Validate a configuration once, when it is written.
//!
//! # Invariants
//! - Stored settings always passed [`LearningSettings::validate`].
//! - Missing JSON fields fall back to the defaults below.

use crate::model::record::{DailyKind, Outcome};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const GROUP_SIZE_MAX: u32 = 200;
const OVERFLOW_RATIO_MAX: f64 = 5.0;
const REPEAT_TIMES_MAX: u32 = 10;
/// Ease factors are kept at two decimals; smaller steps would round away.
pub(crate) const EASE_STEP: f64 = 0.01;

/// Which exposures move a word toward commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Every answer counts, right or wrong.
    AnyAnswer,
    /// Only `recalled` and `partial` count.
    CorrectAnswer,
}

impl CommitPolicy {
    pub fn counts(self, outcome: Outcome) -> bool {
        match self {
            Self::AnyAnswer => true,
            Self::CorrectAnswer => outcome.is_correct(),
        }
    }
}

/// SM-2 style constants used by the memory model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryModelConfig {
    pub initial_ease: f64,
    pub min_ease: f64,
    pub max_ease: f64,
    /// Added to the ease factor on `recalled`.
    pub recalled_ease_delta: f64,
    /// Added to the ease factor on `partial`; usually negative.
    pub partial_ease_delta: f64,
    /// Subtracted from the ease factor on `forgot`.
    pub forgot_ease_penalty: f64,
    /// Minimum repetition count before a word may be mastered.
    pub mastery_repetitions: u32,
    /// Interval (days) that must be exceeded before a word may be mastered.
    pub mastery_horizon_days: u32,
}

impl Default for MemoryModelConfig {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            min_ease: 1.3,
            max_ease: 2.8,
            recalled_ease_delta: 0.1,
            partial_ease_delta: -0.15,
            forgot_ease_penalty: 0.2,
            mastery_repetitions: 5,
            mastery_horizon_days: 30,
        }
    }
}

/// Learner-level learning configuration, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningSettings {
    /// Words that must be committed to finish a group.
    pub group_size: u32,
    /// Candidate pool = `round(group_size * overflow_ratio)`.
    pub overflow_ratio: f64,
    /// Qualifying exposures needed to commit a new word.
    pub learn_repeat_times: u32,
    /// Qualifying exposures needed to commit a review word.
    pub review_repeat_times: u32,
    pub commit_policy: CommitPolicy,
    /// Carry entries older than this are dropped at the next draw.
    pub carry_expiry_days: u32,
    pub memory: MemoryModelConfig,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            group_size: 10,
            overflow_ratio: 1.5,
            learn_repeat_times: 1,
            review_repeat_times: 1,
            commit_policy: CommitPolicy::CorrectAnswer,
            carry_expiry_days: 7,
            memory: MemoryModelConfig::default(),
        }
    }
}

impl LearningSettings {
    /// Number of candidates drawn for a group of `target` words.
    pub fn pool_size(&self, target: u32) -> u32 {
        let scaled = (f64::from(target) * self.overflow_ratio).round();
        if scaled.is_finite() && scaled > f64::from(target) {
            // Bounded by validation: target <= 200 and ratio <= 5.
            scaled as u32
        } else {
            target
        }
    }

    /// Qualifying exposures that commit a word of the given kind.
    pub fn repeat_times(&self, kind: DailyKind) -> u32 {
        match kind {
            DailyKind::Learned => self.learn_repeat_times,
            DailyKind::Reviewed => self.review_repeat_times,
        }
    }

    /// Checks all fields and cross-field constraints.
    pub fn validate(&self) -> Result<(), SettingsValidationError> {
        if self.group_size == 0 || self.group_size > GROUP_SIZE_MAX {
            return Err(SettingsValidationError::GroupSizeOutOfRange(self.group_size));
        }
        if !self.overflow_ratio.is_finite()
            || self.overflow_ratio < 1.0
            || self.overflow_ratio > OVERFLOW_RATIO_MAX
        {
            return Err(SettingsValidationError::OverflowRatioOutOfRange(
                self.overflow_ratio,
            ));
        }
        for (field, value) in [
            ("learn_repeat_times", self.learn_repeat_times),
            ("review_repeat_times", self.review_repeat_times),
        ] {
            if value == 0 || value > REPEAT_TIMES_MAX {
                return Err(SettingsValidationError::RepeatTimesOutOfRange { field, value });
            }
        }
        self.memory.validate()
    }
}

impl MemoryModelConfig {
    pub fn validate(&self) -> Result<(), SettingsValidationError> {
        let fields = [
            ("initial_ease", self.initial_ease),
            ("min_ease", self.min_ease),
            ("max_ease", self.max_ease),
            ("recalled_ease_delta", self.recalled_ease_delta),
            ("partial_ease_delta", self.partial_ease_delta),
            ("forgot_ease_penalty", self.forgot_ease_penalty),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(SettingsValidationError::NonFinite(field));
            }
        }
        if self.min_ease < 1.0 || self.min_ease > self.initial_ease || self.initial_ease > self.max_ease
        {
            return Err(SettingsValidationError::EaseBoundsInverted {
                min: self.min_ease,
                initial: self.initial_ease,
                max: self.max_ease,
            });
        }
        for (field, value) in [
            ("recalled_ease_delta", self.recalled_ease_delta),
            ("partial_ease_delta", self.partial_ease_delta),
            ("forgot_ease_penalty", self.forgot_ease_penalty),
        ] {
            if value != 0.0 && value.abs() < EASE_STEP {
                return Err(SettingsValidationError::DeltaBelowPrecision { field, value });
            }
        }
        if self.forgot_ease_penalty < 0.0 {
            return Err(SettingsValidationError::NegativePenalty(
                self.forgot_ease_penalty,
            ));
        }
        if self.mastery_repetitions == 0 {
            return Err(SettingsValidationError::MasteryRepetitionsZero);
        }
        Ok(())
    }
}

/// Rejected configuration write.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsValidationError {
    GroupSizeOutOfRange(u32),
    OverflowRatioOutOfRange(f64),
    RepeatTimesOutOfRange { field: &'static str, value: u32 },
    NonFinite(&'static str),
    EaseBoundsInverted { min: f64, initial: f64, max: f64 },
    NegativePenalty(f64),
    /// Non-zero ease step too small to survive two-decimal rounding.
    DeltaBelowPrecision { field: &'static str, value: f64 },
    MasteryRepetitionsZero,
}

impl Display for SettingsValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroupSizeOutOfRange(value) => {
                write!(f, "group_size must be within 1..={GROUP_SIZE_MAX}, got {value}")
            }
            Self::OverflowRatioOutOfRange(value) => write!(
                f,
                "overflow_ratio must be within 1.0..={OVERFLOW_RATIO_MAX}, got {value}"
            ),
            Self::RepeatTimesOutOfRange { field, value } => {
                write!(f, "{field} must be within 1..={REPEAT_TIMES_MAX}, got {value}")
            }
            Self::NonFinite(field) => write!(f, "{field} must be a finite number"),
            Self::EaseBoundsInverted { min, initial, max } => write!(
                f,
                "ease bounds must satisfy 1.0 <= min <= initial <= max, got {min} / {initial} / {max}"
            ),
            Self::NegativePenalty(value) => {
                write!(f, "forgot_ease_penalty must not be negative, got {value}")
            }
            Self::DeltaBelowPrecision { field, value } => write!(
                f,
                "{field} must be 0 or at least {EASE_STEP} in magnitude, got {value}"
            ),
            Self::MasteryRepetitionsZero => write!(f, "mastery_repetitions must be at least 1"),
        }
    }
}

impl Error for SettingsValidationError {}
