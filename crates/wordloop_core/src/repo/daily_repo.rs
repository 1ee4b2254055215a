//! Per-day learned/reviewed aggregates.
//!
//! # Invariants
//! - Increments are single atomic `INSERT .. ON CONFLICT DO UPDATE`
//!   statements; counters never go down.
//! - A word is counted at most once per (learner, day); see
//!   [`DailySumStore::mark_commit`].

use crate::model::record::{DailyKind, DailySum};
use crate::repo::{date_to_db, parse_count, parse_date, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection};

/// Persistence contract for daily counters.
pub trait DailySumStore {
    /// Adds deltas to the row for `day`, creating it at zero first.
    fn add(&self, user_id: &str, day: NaiveDate, learned: u32, reviewed: u32) -> RepoResult<()>;
    /// Claims the (learner, day, word) slot.
    ///
    /// Returns `false` when the word was already counted that day.
    fn mark_commit(
        &self,
        user_id: &str,
        day: NaiveDate,
        word_id: &str,
        kind: DailyKind,
    ) -> RepoResult<bool>;
    fn get(&self, user_id: &str, day: NaiveDate) -> RepoResult<Option<DailySum>>;
    /// Rows in `[from, to]`, ascending by day. Days without activity are absent.
    fn list_range(&self, user_id: &str, from: NaiveDate, to: NaiveDate)
        -> RepoResult<Vec<DailySum>>;
}

/// SQLite-backed daily counters.
pub struct SqliteDailySumStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDailySumStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DailySumStore for SqliteDailySumStore<'_> {
    fn add(&self, user_id: &str, day: NaiveDate, learned: u32, reviewed: u32) -> RepoResult<()> {
        if learned == 0 && reviewed == 0 {
            return Ok(());
        }
        self.conn.execute(
            "INSERT INTO daily_sums (user_id, day, learned, reviewed)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, day) DO UPDATE SET
                learned = daily_sums.learned + excluded.learned,
                reviewed = daily_sums.reviewed + excluded.reviewed;",
            params![
                user_id,
                date_to_db(day),
                i64::from(learned),
                i64::from(reviewed)
            ],
        )?;
        Ok(())
    }

    fn mark_commit(
        &self,
        user_id: &str,
        day: NaiveDate,
        word_id: &str,
        kind: DailyKind,
    ) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO daily_commits (user_id, day, word_id, kind)
             VALUES (?1, ?2, ?3, ?4);",
            params![user_id, date_to_db(day), word_id, kind.as_str()],
        )?;
        Ok(inserted == 1)
    }

    fn get(&self, user_id: &str, day: NaiveDate) -> RepoResult<Option<DailySum>> {
        let mut stmt = self.conn.prepare(
            "SELECT day, learned, reviewed
             FROM daily_sums
             WHERE user_id = ?1 AND day = ?2;",
        )?;
        let mut rows = stmt.query(params![user_id, date_to_db(day)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_daily_row(row)?));
        }
        Ok(None)
    }

    fn list_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<DailySum>> {
        let mut stmt = self.conn.prepare(
            "SELECT day, learned, reviewed
             FROM daily_sums
             WHERE user_id = ?1 AND day >= ?2 AND day <= ?3
             ORDER BY day ASC;",
        )?;
        let mut rows = stmt.query(params![user_id, date_to_db(from), date_to_db(to)])?;
        let mut sums = Vec::new();
        while let Some(row) = rows.next()? {
            sums.push(parse_daily_row(row)?);
        }
        Ok(sums)
    }
}

fn parse_daily_row(row: &rusqlite::Row<'_>) -> RepoResult<DailySum> {
    let day: String = row.get("day")?;
    Ok(DailySum {
        day: parse_date(&day, "daily_sums.day")?,
        learned: parse_count(row.get("learned")?, "daily_sums.learned")?,
        reviewed: parse_count(row.get("reviewed")?, "daily_sums.reviewed")?,
    })
}
