//! Idempotency ledger for submitted exposures.
//!
//! Each (learner, idempotency key) maps to the receipt produced the first
//! time the key was applied. Replays read the receipt back unchanged.

use crate::model::group::GroupId;
use crate::model::record::Outcome;
use crate::repo::{bool_to_int, parse_bool, parse_count, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

/// Durable result of one applied exposure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureReceipt {
    pub group_id: GroupId,
    pub section_id: String,
    pub word_id: String,
    pub outcome: Outcome,
    /// Word is committed for this cycle after the exposure.
    pub committed: bool,
    /// Exposure changed stored progress; `false` when the word was
    /// already committed.
    pub applied: bool,
    /// Group reached its target with this exposure.
    pub group_closed: bool,
    pub committed_count: u32,
    pub completion_target: u32,
}

pub trait ExposureLedger {
    fn find(&self, user_id: &str, idempotency_key: &str) -> RepoResult<Option<ExposureReceipt>>;
    fn record(
        &self,
        user_id: &str,
        idempotency_key: &str,
        receipt: &ExposureReceipt,
    ) -> RepoResult<()>;
}

pub struct SqliteExposureLedger<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteExposureLedger<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ExposureLedger for SqliteExposureLedger<'_> {
    fn find(&self, user_id: &str, idempotency_key: &str) -> RepoResult<Option<ExposureReceipt>> {
        let raw = self
            .conn
            .query_row(
                "SELECT
                    group_id,
                    section_id,
                    word_id,
                    outcome,
                    committed,
                    applied,
                    group_closed,
                    committed_count,
                    completion_target
                 FROM exposures
                 WHERE user_id = ?1 AND idempotency_key = ?2;",
                params![user_id, idempotency_key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, i64>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            group_id,
            section_id,
            word_id,
            outcome,
            committed,
            applied,
            group_closed,
            committed_count,
            completion_target,
        )) = raw
        else {
            return Ok(None);
        };

        Ok(Some(ExposureReceipt {
            group_id: Uuid::parse_str(&group_id).map_err(|_| {
                RepoError::InvalidData(format!("invalid uuid `{group_id}` in exposures.group_id"))
            })?,
            section_id,
            word_id,
            outcome: outcome.parse::<Outcome>().map_err(|_| {
                RepoError::InvalidData(format!("invalid outcome `{outcome}` in exposures.outcome"))
            })?,
            committed: parse_bool(committed, "exposures.committed")?,
            applied: parse_bool(applied, "exposures.applied")?,
            group_closed: parse_bool(group_closed, "exposures.group_closed")?,
            committed_count: parse_count(committed_count, "exposures.committed_count")?,
            completion_target: parse_count(completion_target, "exposures.completion_target")?,
        }))
    }

    fn record(
        &self,
        user_id: &str,
        idempotency_key: &str,
        receipt: &ExposureReceipt,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO exposures (
                user_id,
                idempotency_key,
                group_id,
                section_id,
                word_id,
                outcome,
                committed,
                applied,
                group_closed,
                committed_count,
                completion_target
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                user_id,
                idempotency_key,
                receipt.group_id.to_string(),
                receipt.section_id,
                receipt.word_id,
                receipt.outcome.as_str(),
                bool_to_int(receipt.committed),
                bool_to_int(receipt.applied),
                bool_to_int(receipt.group_closed),
                i64::from(receipt.committed_count),
                i64::from(receipt.completion_target),
            ],
        )?;
        Ok(())
    }
}
