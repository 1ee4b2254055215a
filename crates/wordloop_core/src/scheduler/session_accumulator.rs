//! In-memory progress accounting for one group cycle.
//!
//! # Responsibility
//! - Count exposures per member and decide when a word commits.
//! - Decide when a group closes and what it leaves behind.
//!
//! # Invariants
//! - A committed member never changes again within its cycle.
//! - A group closes exactly when committed members reach the completion
//!   target; it never reopens.
//! - Callers persist the mutated state or drop it; nothing here does I/O.

use crate::model::group::{GroupState, GroupStatus};
use crate::model::record::Outcome;
use crate::model::settings::LearningSettings;
use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Effect of one exposure on group progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureEffect {
    /// The word was already committed in this cycle; nothing changed.
    AlreadyCommitted,
    /// Counters advanced.
    Progressed {
        /// The word reached its commit threshold with this exposure.
        committed_now: bool,
        /// The group reached its completion target with this exposure.
        group_closed: bool,
    },
}

impl ExposureEffect {
    pub fn is_committed(self) -> bool {
        match self {
            Self::AlreadyCommitted => true,
            Self::Progressed { committed_now, .. } => committed_now,
        }
    }
}

/// Exposure or skip that the group cannot accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupStateError {
    GroupNotOpen(GroupStatus),
    NotMember(String),
    WordSkipped(String),
    WordAlreadyCommitted(String),
}

impl Display for GroupStateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroupNotOpen(status) => write!(f, "group is {}", status.as_str()),
            Self::NotMember(word_id) => write!(f, "word {word_id} is not part of this group"),
            Self::WordSkipped(word_id) => write!(f, "word {word_id} was skipped in this group"),
            Self::WordAlreadyCommitted(word_id) => {
                write!(f, "word {word_id} is already committed in this group")
            }
        }
    }
}

impl Error for GroupStateError {}

/// Applies learner events to a [`GroupState`] under one settings snapshot.
pub struct SessionAccumulator<'a> {
    settings: &'a LearningSettings,
}

impl<'a> SessionAccumulator<'a> {
    pub fn new(settings: &'a LearningSettings) -> Self {
        Self { settings }
    }

    /// Counts one answer for `word_id`.
    pub fn record_exposure(
        &self,
        state: &mut GroupState,
        word_id: &str,
        outcome: Outcome,
        today: NaiveDate,
    ) -> Result<ExposureEffect, GroupStateError> {
        if !state.status.is_open() {
            return Err(GroupStateError::GroupNotOpen(state.status));
        }

        let policy = self.settings.commit_policy;
        let member = state
            .member_mut(word_id)
            .ok_or_else(|| GroupStateError::NotMember(word_id.to_string()))?;
        if member.skipped {
            return Err(GroupStateError::WordSkipped(word_id.to_string()));
        }
        if member.committed {
            return Ok(ExposureEffect::AlreadyCommitted);
        }

        member.exposures = member.exposures.saturating_add(1);
        if policy.counts(outcome) {
            member.hits = member.hits.saturating_add(1);
        }
        let committed_now = member.hits >= self.settings.repeat_times(member.kind);
        member.committed = committed_now;

        let group_closed = committed_now && state.is_complete();
        if group_closed {
            close(state, GroupStatus::Completed, today);
        }

        Ok(ExposureEffect::Progressed {
            committed_now,
            group_closed,
        })
    }

    /// Marks `word_id` as already known for this cycle.
    ///
    /// Shrinks the completion target when the remaining members can no
    /// longer reach it. Returns whether the group closed as a result.
    pub fn skip(
        &self,
        state: &mut GroupState,
        word_id: &str,
        today: NaiveDate,
    ) -> Result<bool, GroupStateError> {
        if !state.status.is_open() {
            return Err(GroupStateError::GroupNotOpen(state.status));
        }
        let member = state
            .member_mut(word_id)
            .ok_or_else(|| GroupStateError::NotMember(word_id.to_string()))?;
        if member.committed {
            return Err(GroupStateError::WordAlreadyCommitted(word_id.to_string()));
        }
        if member.skipped {
            return Ok(false);
        }
        member.skipped = true;

        let reachable = state.committed_count() + state.pending_count();
        if reachable < state.completion_target {
            state.completion_target = reachable;
        }

        if state.is_complete() {
            close(state, GroupStatus::Completed, today);
            return Ok(true);
        }
        Ok(false)
    }

    /// Closes an open group without reaching its target.
    pub fn close(&self, state: &mut GroupState, status: GroupStatus, today: NaiveDate) {
        if state.status.is_open() {
            close(state, status, today);
        }
    }
}

fn close(state: &mut GroupState, status: GroupStatus, today: NaiveDate) {
    state.status = status;
    state.closed_on = Some(today);
}
