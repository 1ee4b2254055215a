//! Study-duration sessions and per-day totals.

use crate::repo::{date_to_db, parse_count, parse_date, RepoResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// Minutes studied on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyDay {
    pub day: NaiveDate,
    pub minutes: u32,
}

pub trait StudyStore {
    /// Overwrites minutes of an existing session owned by `user_id`.
    ///
    /// Returns `false` when no such session exists.
    fn update_session(&self, user_id: &str, session_id: &str, minutes: u32) -> RepoResult<bool>;
    fn insert_session(
        &self,
        user_id: &str,
        session_id: &str,
        day: NaiveDate,
        minutes: u32,
    ) -> RepoResult<()>;
    /// Per-day sums, ascending by day.
    fn minutes_by_day(&self, user_id: &str) -> RepoResult<Vec<StudyDay>>;
}

pub struct SqliteStudyStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStudyStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl StudyStore for SqliteStudyStore<'_> {
    fn update_session(&self, user_id: &str, session_id: &str, minutes: u32) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE study_sessions
             SET minutes = ?3, updated_at = (strftime('%s', 'now') * 1000)
             WHERE session_id = ?1 AND user_id = ?2;",
            params![session_id, user_id, i64::from(minutes)],
        )?;
        Ok(changed == 1)
    }

    fn insert_session(
        &self,
        user_id: &str,
        session_id: &str,
        day: NaiveDate,
        minutes: u32,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO study_sessions (session_id, user_id, day, minutes)
             VALUES (?1, ?2, ?3, ?4);",
            params![session_id, user_id, date_to_db(day), i64::from(minutes)],
        )?;
        Ok(())
    }

    fn minutes_by_day(&self, user_id: &str) -> RepoResult<Vec<StudyDay>> {
        let mut stmt = self.conn.prepare(
            "SELECT day, SUM(minutes) AS minutes
             FROM study_sessions
             WHERE user_id = ?1
             GROUP BY day
             ORDER BY day ASC;",
        )?;
        let mut rows = stmt.query([user_id])?;
        let mut days = Vec::new();
        while let Some(row) = rows.next()? {
            let day: String = row.get("day")?;
            days.push(StudyDay {
                day: parse_date(&day, "study_sessions.day")?,
                minutes: parse_count(row.get("minutes")?, "study_sessions.minutes")?,
            });
        }
        Ok(days)
    }
}
