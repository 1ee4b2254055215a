//! Transactional learning use-cases.
//!
//! # Responsibility
//! - Validate request input before any storage access.
//! - Run each write path inside one immediate SQLite transaction.
//! - Translate repository failures into [`LearningError`] categories.

pub mod catalog_service;
pub mod daily_aggregator;
pub mod error;
pub mod learner_service;
pub mod learning_service;
pub mod notebook_service;
pub mod study_service;

use crate::model::learner::Learner;
use crate::model::word::{validate_id, IdKind};
use crate::repo::learner_repo::LearnerStore;
use chrono::{DateTime, NaiveDate, Utc};
use error::{LearningError, LearningResult, ValidationError};

/// Resolves the learner's calendar day for a request timestamp.
///
/// `None` means now. Timestamps later than now are rejected.
pub(crate) fn resolve_day(at: Option<DateTime<Utc>>) -> LearningResult<NaiveDate> {
    let now = Utc::now();
    match at {
        Some(at) if at > now => Err(ValidationError::FutureTimestamp { at, now }.into()),
        Some(at) => Ok(at.date_naive()),
        None => Ok(now.date_naive()),
    }
}

pub(crate) fn validate_ids(ids: &[(IdKind, &str)]) -> LearningResult<()> {
    for (kind, value) in ids {
        validate_id(*kind, value)?;
    }
    Ok(())
}

pub(crate) fn require_learner<L: LearnerStore>(store: &L, user_id: &str) -> LearningResult<Learner> {
    store
        .get_learner(user_id)?
        .ok_or_else(|| LearningError::not_found("learner", user_id))
}
