//! Group draw and exposure use-cases.
//!
//! # Responsibility
//! - `draw_group`: close any open group, consume carry, select and persist
//!   a new group cycle.
//! - `submit_outcome`: apply one answer idempotently (memory state, group
//!   progress, daily counters, group close).
//! - `skip_word`, `close_group`, `group_status`, `daily_summary`.
//!
//! # Invariants
//! - Every write path runs in one `IMMEDIATE` transaction, so concurrent
//!   draws and submissions of one learner are serialized by SQLite.
//! - A replayed idempotency key returns the stored receipt and writes
//!   nothing.
//! - Record upsert, member progress, daily increment and ledger entry of
//!   one exposure commit together or not at all.
//! - Leftovers of every closed group are written to carry.

use crate::model::group::{CandidateRole, GroupState, GroupStatus};
use crate::model::record::{DailySum, LearningRecord, MemoryState, Outcome};
use crate::model::settings::LearningSettings;
use crate::model::word::IdKind;
use crate::repo::carry_repo::{CarryStore, SqliteCarryStore};
use crate::repo::catalog_repo::{require_section, SqliteWordCatalog, WordCatalog};
use crate::repo::daily_repo::SqliteDailySumStore;
use crate::repo::exposure_repo::{ExposureLedger, ExposureReceipt, SqliteExposureLedger};
use crate::repo::group_repo::{GroupStore, SqliteGroupStore};
use crate::repo::learner_repo::SqliteLearnerStore;
use crate::repo::record_repo::{LearningRecordStore, SqliteLearningRecordStore};
use crate::scheduler::group_selector::{GroupSelector, SelectionRequest};
use crate::scheduler::memory_model;
use crate::scheduler::session_accumulator::{ExposureEffect, SessionAccumulator};
use crate::service::daily_aggregator::DailyAggregator;
use crate::service::error::{LearningError, LearningResult, ValidationError};
use crate::service::{require_learner, resolve_day, validate_ids};
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

const MAX_GROUP_SIZE: u32 = 200;

/// Input of [`LearningService::draw_group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawGroupRequest {
    pub user_id: String,
    pub section_id: String,
    /// Overrides the learner's `group_size` for this draw.
    pub size: Option<u32>,
    pub at: Option<DateTime<Utc>>,
}

impl DrawGroupRequest {
    pub fn new(user_id: impl Into<String>, section_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            section_id: section_id.into(),
            size: None,
            at: None,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }
}

/// Result of one draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawnGroup {
    pub group: GroupState,
    /// Candidates requested from the selector, overflow included.
    pub pool_size: u32,
    /// Open group that this draw closed as abandoned.
    pub abandoned_group: Option<GroupState>,
    /// Carry words discarded because their entry outlived the expiry window.
    pub expired_carry: Vec<String>,
    /// Carry words discarded because they are mastered or left the section.
    pub dropped_carry: Vec<String>,
}

impl DrawnGroup {
    pub fn word_ids(&self) -> Vec<&str> {
        self.group
            .members
            .iter()
            .map(|member| member.word_id.as_str())
            .collect()
    }

    pub fn count_role(&self, role: CandidateRole) -> usize {
        self.group
            .members
            .iter()
            .filter(|member| member.role == role)
            .count()
    }
}

/// Input of [`LearningService::submit_outcome`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcomeRequest {
    pub user_id: String,
    pub section_id: String,
    pub word_id: String,
    pub outcome: Outcome,
    pub idempotency_key: String,
    pub at: Option<DateTime<Utc>>,
}

impl SubmitOutcomeRequest {
    pub fn new(
        user_id: impl Into<String>,
        section_id: impl Into<String>,
        word_id: impl Into<String>,
        outcome: Outcome,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            section_id: section_id.into(),
            word_id: word_id.into(),
            outcome,
            idempotency_key: idempotency_key.into(),
            at: None,
        }
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }
}

/// Result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcomeResponse {
    pub receipt: ExposureReceipt,
    /// The key was seen before; nothing was written.
    pub replayed: bool,
}

/// Result of [`LearningService::skip_word`].
#[derive(Debug, Clone, PartialEq)]
pub struct SkipOutcome {
    pub record: LearningRecord,
    /// Open group after the skip, or the group the skip just closed.
    pub group: Option<GroupState>,
    pub group_closed: bool,
}

/// Scheduling use-cases over one SQLite connection.
pub struct LearningService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> LearningService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Draws a new group for one learner and section.
    ///
    /// An open group for the same section is abandoned first and its
    /// pending words move to carry. A draw with no candidates is stored as
    /// an already completed group.
    pub fn draw_group(&mut self, request: &DrawGroupRequest) -> LearningResult<DrawnGroup> {
        validate_ids(&[
            (IdKind::User, &request.user_id),
            (IdKind::Section, &request.section_id),
        ])?;
        if let Some(size) = request.size {
            validate_size(size)?;
        }
        let today = resolve_day(request.at)?;
        let user_id = request.user_id.as_str();
        let section_id = request.section_id.as_str();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let learner = require_learner(&SqliteLearnerStore::new(&tx), user_id)?;
        let settings = learner.settings;
        let catalog = SqliteWordCatalog::new(&tx);
        require_section(&catalog, section_id)?;

        let groups = SqliteGroupStore::new(&tx);
        let carry_store = SqliteCarryStore::new(&tx);
        let records = SqliteLearningRecordStore::new(&tx);

        let abandoned_group = match groups.find_open_group(user_id, section_id)? {
            Some(mut open) => {
                SessionAccumulator::new(&settings).close(&mut open, GroupStatus::Abandoned, today);
                finish_group(&tx, &open, today)?;
                Some(open)
            }
            None => None,
        };

        let (live_carry, expired): (Vec<_>, Vec<_>) = carry_store
            .take(user_id, section_id)?
            .into_iter()
            .partition(|entry| !entry.is_expired(today, settings.carry_expiry_days));
        let expired_carry: Vec<String> = expired.into_iter().map(|entry| entry.word_id).collect();
        if !expired_carry.is_empty() {
            info!(
                "event=carry_expire module=scheduler status=ok user_id={} section_id={} expired={} expiry_days={}",
                user_id,
                section_id,
                expired_carry.len(),
                settings.carry_expiry_days
            );
        }

        let target_size = request.size.unwrap_or(settings.group_size);
        let pool_size = settings.pool_size(target_size);
        let selection = GroupSelector::new(&catalog, &records).select(
            &SelectionRequest {
                user_id,
                section_id,
                target_size,
                pool_size,
                today,
            },
            &live_carry,
        )?;

        let group = GroupState::open(user_id, section_id, target_size, &selection.candidates, today);
        groups.insert_group(&group)?;
        tx.commit()?;

        info!(
            "event=group_draw module=scheduler status=ok user_id={} section_id={} group_id={} target={} pool={} candidates={} carry={} review={} new={} dropped_carry={}",
            user_id,
            section_id,
            group.group_id,
            group.completion_target,
            pool_size,
            group.members.len(),
            selection.count_role(CandidateRole::Carry),
            selection.count_role(CandidateRole::Review),
            selection.count_role(CandidateRole::New),
            selection.dropped_carry.len()
        );

        Ok(DrawnGroup {
            group,
            pool_size,
            abandoned_group,
            expired_carry,
            dropped_carry: selection.dropped_carry,
        })
    }

    /// Applies one answer to the learner's open group for the section.
    pub fn submit_outcome(
        &mut self,
        request: &SubmitOutcomeRequest,
    ) -> LearningResult<SubmitOutcomeResponse> {
        validate_ids(&[
            (IdKind::User, &request.user_id),
            (IdKind::Section, &request.section_id),
            (IdKind::Word, &request.word_id),
            (IdKind::IdempotencyKey, &request.idempotency_key),
        ])?;
        let today = resolve_day(request.at)?;
        let user_id = request.user_id.as_str();
        let section_id = request.section_id.as_str();
        let word_id = request.word_id.as_str();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let ledger = SqliteExposureLedger::new(&tx);
        let groups = SqliteGroupStore::new(&tx);
        let open_group = groups.find_open_group(user_id, section_id)?;
        if let Some(receipt) = ledger.find(user_id, &request.idempotency_key)? {
            // A receipt from a cycle other than the open one is never a retry.
            let other_cycle = open_group
                .as_ref()
                .is_some_and(|group| group.group_id != receipt.group_id);
            if receipt.word_id != word_id || receipt.section_id != section_id || other_cycle {
                return Err(ValidationError::IdempotencyKeyReused {
                    key: request.idempotency_key.clone(),
                    word_id: receipt.word_id,
                }
                .into());
            }
            info!(
                "event=exposure_replay module=scheduler status=ok user_id={} section_id={} group_id={}",
                user_id, section_id, receipt.group_id
            );
            return Ok(SubmitOutcomeResponse {
                receipt,
                replayed: true,
            });
        }

        let settings = require_learner(&SqliteLearnerStore::new(&tx), user_id)?.settings;
        let mut group =
            open_group.ok_or_else(|| LearningError::not_found("open group", section_id))?;
        ensure_not_before(today, group.opened_on)?;

        let effect = SessionAccumulator::new(&settings).record_exposure(
            &mut group,
            word_id,
            request.outcome,
            today,
        )?;

        let group_closed = match effect {
            ExposureEffect::AlreadyCommitted => false,
            ExposureEffect::Progressed {
                committed_now,
                group_closed,
            } => {
                apply_memory_update(&tx, user_id, word_id, request.outcome, today, &settings)?;
                let member = group
                    .member(word_id)
                    .ok_or_else(|| LearningError::not_found("group member", word_id))?;
                groups.save_member(group.group_id, member)?;

                if committed_now {
                    let counted = DailyAggregator::new(SqliteDailySumStore::new(&tx))
                        .commit_once(user_id, today, word_id, member.kind)?;
                    info!(
                        "event=exposure_commit module=scheduler status=ok user_id={} group_id={} kind={} counted={}",
                        user_id,
                        group.group_id,
                        member.kind.as_str(),
                        counted
                    );
                }
                if group_closed {
                    finish_group(&tx, &group, today)?;
                }
                group_closed
            }
        };

        let receipt = ExposureReceipt {
            group_id: group.group_id,
            section_id: section_id.to_string(),
            word_id: word_id.to_string(),
            outcome: request.outcome,
            committed: effect.is_committed(),
            applied: effect != ExposureEffect::AlreadyCommitted,
            group_closed,
            committed_count: group.committed_count(),
            completion_target: group.completion_target,
        };
        ledger.record(user_id, &request.idempotency_key, &receipt)?;
        tx.commit()?;

        Ok(SubmitOutcomeResponse {
            receipt,
            replayed: false,
        })
    }

    /// Marks a word as already known for the learner.
    ///
    /// The record is mastered (created when absent). When the word is a
    /// pending member of the open group it stops counting toward
    /// completion and never becomes carry.
    pub fn skip_word(
        &mut self,
        user_id: &str,
        section_id: &str,
        word_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> LearningResult<SkipOutcome> {
        validate_ids(&[
            (IdKind::User, user_id),
            (IdKind::Section, section_id),
            (IdKind::Word, word_id),
        ])?;
        let today = resolve_day(at)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let settings = require_learner(&SqliteLearnerStore::new(&tx), user_id)?.settings;
        let catalog = SqliteWordCatalog::new(&tx);
        require_section(&catalog, section_id)?;
        if catalog.get_word(word_id)?.is_none() {
            return Err(LearningError::not_found("word", word_id));
        }
        if !catalog.is_placed(section_id, word_id)? {
            return Err(LearningError::not_found(
                "section word",
                format!("{section_id}/{word_id}"),
            ));
        }

        let groups = SqliteGroupStore::new(&tx);
        let mut group = groups.find_open_group(user_id, section_id)?;
        let mut group_closed = false;
        if let Some(open) = group.as_mut() {
            if open.member(word_id).is_some() {
                ensure_not_before(today, open.opened_on)?;
                group_closed = SessionAccumulator::new(&settings).skip(open, word_id, today)?;
                if let Some(member) = open.member(word_id) {
                    groups.save_member(open.group_id, member)?;
                }
                if group_closed {
                    finish_group(&tx, open, today)?;
                } else {
                    groups.update_group(open)?;
                }
            }
        }

        let records = SqliteLearningRecordStore::new(&tx);
        let prior = records.get_record(user_id, word_id)?;
        let record = LearningRecord {
            user_id: user_id.to_string(),
            word_id: word_id.to_string(),
            memory: memory_model::mark_known(
                prior.as_ref().map(|record| &record.memory),
                today,
                &settings.memory,
            ),
        };
        records.upsert_record(&record)?;
        tx.commit()?;

        info!(
            "event=word_skip module=scheduler status=ok user_id={} section_id={} group_closed={}",
            user_id, section_id, group_closed
        );
        Ok(SkipOutcome {
            record,
            group,
            group_closed,
        })
    }

    /// Closes the open group on request; pending words move to carry.
    pub fn close_group(
        &mut self,
        user_id: &str,
        section_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> LearningResult<GroupState> {
        validate_ids(&[(IdKind::User, user_id), (IdKind::Section, section_id)])?;
        let today = resolve_day(at)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let settings = require_learner(&SqliteLearnerStore::new(&tx), user_id)?.settings;
        let mut group = SqliteGroupStore::new(&tx)
            .find_open_group(user_id, section_id)?
            .ok_or_else(|| LearningError::not_found("open group", section_id))?;

        SessionAccumulator::new(&settings).close(&mut group, GroupStatus::Closed, today);
        finish_group(&tx, &group, today)?;
        tx.commit()?;
        Ok(group)
    }

    /// Open group of the section with per-member progress, if any.
    pub fn group_status(
        &self,
        user_id: &str,
        section_id: &str,
    ) -> LearningResult<Option<GroupState>> {
        validate_ids(&[(IdKind::User, user_id), (IdKind::Section, section_id)])?;
        let conn: &Connection = &*self.conn;
        require_learner(&SqliteLearnerStore::new(conn), user_id)?;
        Ok(SqliteGroupStore::new(conn).find_open_group(user_id, section_id)?)
    }

    /// Stored daily counters in `[from, to]`, ascending by day.
    pub fn daily_summary(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LearningResult<Vec<DailySum>> {
        validate_ids(&[(IdKind::User, user_id)])?;
        if from > to {
            return Err(ValidationError::InvalidRange { from, to }.into());
        }
        let conn: &Connection = &*self.conn;
        require_learner(&SqliteLearnerStore::new(conn), user_id)?;
        Ok(DailyAggregator::new(SqliteDailySumStore::new(conn)).summary_range(user_id, from, to)?)
    }

    /// Stored memory state of one word, if it was ever presented.
    pub fn get_record(&self, user_id: &str, word_id: &str) -> LearningResult<Option<MemoryState>> {
        validate_ids(&[(IdKind::User, user_id), (IdKind::Word, word_id)])?;
        let conn: &Connection = &*self.conn;
        let record = SqliteLearningRecordStore::new(conn).get_record(user_id, word_id)?;
        Ok(record.map(|record| record.memory))
    }
}

fn validate_size(size: u32) -> LearningResult<()> {
    if size == 0 || size > MAX_GROUP_SIZE {
        return Err(ValidationError::InvalidSize {
            size,
            max: MAX_GROUP_SIZE,
        }
        .into());
    }
    Ok(())
}

/// Rejects a request day that precedes state it would modify.
fn ensure_not_before(today: NaiveDate, earliest: NaiveDate) -> LearningResult<()> {
    if today < earliest {
        return Err(ValidationError::OutOfOrderTimestamp {
            day: today,
            earliest,
        }
        .into());
    }
    Ok(())
}

fn apply_memory_update(
    conn: &Connection,
    user_id: &str,
    word_id: &str,
    outcome: Outcome,
    today: NaiveDate,
    settings: &LearningSettings,
) -> LearningResult<()> {
    let records = SqliteLearningRecordStore::new(conn);
    let prior = records.get_record(user_id, word_id)?;
    if let Some(prior) = prior.as_ref() {
        let memory = &prior.memory;
        ensure_not_before(today, memory.last_reviewed_on.unwrap_or(memory.last_learned_on))?;
    }
    let memory = memory_model::update(
        prior.as_ref().map(|record| &record.memory),
        outcome,
        today,
        &settings.memory,
    );
    if memory.mastered && !prior.as_ref().is_some_and(|record| record.memory.mastered) {
        info!(
            "event=word_mastered module=scheduler status=ok user_id={} interval_days={}",
            user_id, memory.next_interval_days
        );
    }
    records.upsert_record(&LearningRecord {
        user_id: user_id.to_string(),
        word_id: word_id.to_string(),
        memory,
    })?;
    Ok(())
}

/// Persists a closed group header and moves its leftovers to carry.
fn finish_group(conn: &Connection, group: &GroupState, today: NaiveDate) -> LearningResult<()> {
    SqliteGroupStore::new(conn).update_group(group)?;
    let leftovers = group.leftovers(today);
    SqliteCarryStore::new(conn).put(&group.user_id, &group.section_id, &leftovers)?;
    info!(
        "event=group_close module=scheduler status=ok reason={} user_id={} section_id={} group_id={} committed={} target={} carried={}",
        group.status.as_str(),
        group.user_id,
        group.section_id,
        group.group_id,
        group.committed_count(),
        group.completion_target,
        leftovers.len()
    );
    Ok(())
}
