//! Use-case error taxonomy.
//!
//! # Invariants
//! - Every service call fails with exactly one of four categories:
//!   validation, not found, conflict, persistence.
//! - Validation failures are raised before any state is touched.

use crate::model::record::OutcomeParseError;
use crate::model::settings::SettingsValidationError;
use crate::model::word::IdValidationError;
use crate::repo::RepoError;
use crate::scheduler::session_accumulator::GroupStateError;
use chrono::{DateTime, NaiveDate, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LearningResult<T> = Result<T, LearningError>;

/// Malformed request input.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    InvalidId(IdValidationError),
    InvalidSize { size: u32, max: u32 },
    InvalidOutcome(OutcomeParseError),
    FutureTimestamp { at: DateTime<Utc>, now: DateTime<Utc> },
    InvalidRange { from: NaiveDate, to: NaiveDate },
    NegativeDuration(i64),
    DurationTooLong { seconds: i64, max: i64 },
    /// Request day precedes state it would modify (group draw or last review).
    OutOfOrderTimestamp { day: NaiveDate, earliest: NaiveDate },
    /// Book declared as its own parent.
    SelfParentBook(String),
    Settings(SettingsValidationError),
    /// Idempotency key was first used for another word or group cycle.
    IdempotencyKeyReused { key: String, word_id: String },
    /// Exposure or skip the current group cannot accept.
    GroupState(GroupStateError),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidId(err) => write!(f, "{err}"),
            Self::InvalidSize { size, max } => {
                write!(f, "group size must be within 1..={max}, got {size}")
            }
            Self::InvalidOutcome(err) => write!(f, "{err}"),
            Self::FutureTimestamp { at, now } => {
                write!(f, "timestamp {at} is in the future (now {now})")
            }
            Self::InvalidRange { from, to } => write!(f, "range start {from} is after end {to}"),
            Self::NegativeDuration(seconds) => {
                write!(f, "study duration must not be negative, got {seconds}s")
            }
            Self::DurationTooLong { seconds, max } => {
                write!(f, "study duration must be at most {max}s, got {seconds}s")
            }
            Self::OutOfOrderTimestamp { day, earliest } => {
                write!(f, "request day {day} is earlier than {earliest}")
            }
            Self::SelfParentBook(book_id) => write!(f, "book {book_id} cannot be its own parent"),
            Self::Settings(err) => write!(f, "invalid settings: {err}"),
            Self::IdempotencyKeyReused { key, word_id } => write!(
                f,
                "idempotency key `{key}` was already used for word {word_id} in another exposure"
            ),
            Self::GroupState(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidId(err) => Some(err),
            Self::InvalidOutcome(err) => Some(err),
            Self::Settings(err) => Some(err),
            Self::GroupState(err) => Some(err),
            _ => None,
        }
    }
}

/// Service-level error returned by every learning use-case.
#[derive(Debug)]
pub enum LearningError {
    Validation(ValidationError),
    /// Referenced learner, word, section, book or open group is missing.
    NotFound { entity: &'static str, id: String },
    /// Another writer holds the learner's data; retry after a short backoff.
    Conflict(RepoError),
    /// Storage failure; retry with the same idempotency key.
    Persistence(RepoError),
}

impl LearningError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns whether the same request may succeed when sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Persistence(_))
    }

    /// Stable machine-readable category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl Display for LearningError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Conflict(err) => write!(f, "concurrent write conflict: {err}"),
            Self::Persistence(err) => write!(f, "persistence failure: {err}"),
        }
    }
}

impl Error for LearningError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::Conflict(err) | Self::Persistence(err) => Some(err),
        }
    }
}

impl From<ValidationError> for LearningError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<IdValidationError> for LearningError {
    fn from(value: IdValidationError) -> Self {
        Self::Validation(ValidationError::InvalidId(value))
    }
}

impl From<OutcomeParseError> for LearningError {
    fn from(value: OutcomeParseError) -> Self {
        Self::Validation(ValidationError::InvalidOutcome(value))
    }
}

impl From<SettingsValidationError> for LearningError {
    fn from(value: SettingsValidationError) -> Self {
        Self::Validation(ValidationError::Settings(value))
    }
}

impl From<GroupStateError> for LearningError {
    fn from(value: GroupStateError) -> Self {
        match value {
            GroupStateError::NotMember(word_id) => Self::not_found("group member", word_id),
            GroupStateError::GroupNotOpen(status) => {
                Self::not_found("open group", status.as_str().to_string())
            }
            other => Self::Validation(ValidationError::GroupState(other)),
        }
    }
}

impl From<RepoError> for LearningError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity, id } => Self::NotFound { entity, id },
            other if other.is_busy() => Self::Conflict(other),
            other => Self::Persistence(other),
        }
    }
}

impl From<rusqlite::Error> for LearningError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(RepoError::from(value))
    }
}
