//! Learning record contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist per (learner, word) memory state.
//! - Answer the two scheduling range queries: due reviews and never
//!   learned words of a section.
//!
//! # Invariants
//! - One row per (learner, word), enforced by the primary key.
//! - `due_on` is recomputed from the memory state on every write.
//! - Due listings are ordered `due_on ASC, word_index ASC, word_id ASC`.

use crate::model::record::{LearningRecord, MemoryState};
use crate::repo::{
    bool_to_int, date_to_db, parse_bool, parse_count, parse_date, RepoError, RepoResult,
};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::HashMap;

const RECORD_SELECT_SQL: &str = "SELECT
    r.user_id,
    r.word_id,
    r.mastered,
    r.last_learned_on,
    r.next_learn_on,
    r.last_reviewed_on,
    r.repetition_count,
    r.ease_factor,
    r.next_interval_days
FROM learning_records r";

/// Word counts for one book (sub-books included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BookProgress {
    pub total: u32,
    /// Words with any learning record, mastered ones included.
    pub learned: u32,
    pub mastered: u32,
    pub due: u32,
}

/// Persistence contract for learning records.
pub trait LearningRecordStore {
    fn get_record(&self, user_id: &str, word_id: &str) -> RepoResult<Option<LearningRecord>>;
    /// Batch lookup; missing words are simply absent from the map.
    fn get_records(
        &self,
        user_id: &str,
        word_ids: &[String],
    ) -> RepoResult<HashMap<String, LearningRecord>>;
    /// Non-mastered records of the section due on or before `due_on_or_before`.
    fn list_due_in_section(
        &self,
        user_id: &str,
        section_id: &str,
        due_on_or_before: NaiveDate,
        limit: u32,
    ) -> RepoResult<Vec<LearningRecord>>;
    /// Section words without any record, in section order.
    fn list_unlearned_in_section(
        &self,
        user_id: &str,
        section_id: &str,
        limit: u32,
    ) -> RepoResult<Vec<String>>;
    fn upsert_record(&self, record: &LearningRecord) -> RepoResult<()>;
    fn book_progress(&self, user_id: &str, book_id: &str, today: NaiveDate)
        -> RepoResult<BookProgress>;
}

/// SQLite-backed learning record store.
pub struct SqliteLearningRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLearningRecordStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LearningRecordStore for SqliteLearningRecordStore<'_> {
    fn get_record(&self, user_id: &str, word_id: &str) -> RepoResult<Option<LearningRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             WHERE r.user_id = ?1 AND r.word_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![user_id, word_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }
        Ok(None)
    }

    fn get_records(
        &self,
        user_id: &str,
        word_ids: &[String],
    ) -> RepoResult<HashMap<String, LearningRecord>> {
        let mut records = HashMap::new();
        if word_ids.is_empty() {
            return Ok(records);
        }

        let placeholders = vec!["?"; word_ids.len()].join(", ");
        let sql = format!(
            "{RECORD_SELECT_SQL}
             WHERE r.user_id = ? AND r.word_id IN ({placeholders});"
        );
        let mut bind_values: Vec<Value> = Vec::with_capacity(word_ids.len() + 1);
        bind_values.push(Value::Text(user_id.to_string()));
        bind_values.extend(word_ids.iter().map(|id| Value::Text(id.clone())));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        while let Some(row) = rows.next()? {
            let record = parse_record_row(row)?;
            records.insert(record.word_id.clone(), record);
        }
        Ok(records)
    }

    fn list_due_in_section(
        &self,
        user_id: &str,
        section_id: &str,
        due_on_or_before: NaiveDate,
        limit: u32,
    ) -> RepoResult<Vec<LearningRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             INNER JOIN section_words sw
                ON sw.word_id = r.word_id AND sw.section_id = ?2
             WHERE r.user_id = ?1
               AND r.mastered = 0
               AND r.due_on <= ?3
             ORDER BY r.due_on ASC, sw.word_index ASC, r.word_id ASC
             LIMIT ?4;"
        ))?;
        let mut rows = stmt.query(params![
            user_id,
            section_id,
            date_to_db(due_on_or_before),
            i64::from(limit)
        ])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn list_unlearned_in_section(
        &self,
        user_id: &str,
        section_id: &str,
        limit: u32,
    ) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT sw.word_id
             FROM section_words sw
             WHERE sw.section_id = ?2
               AND NOT EXISTS (
                    SELECT 1
                    FROM learning_records r
                    WHERE r.user_id = ?1 AND r.word_id = sw.word_id
               )
             ORDER BY sw.word_index ASC, sw.word_id ASC
             LIMIT ?3;",
        )?;
        let words = stmt
            .query_map(params![user_id, section_id, i64::from(limit)], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(words)
    }

    fn upsert_record(&self, record: &LearningRecord) -> RepoResult<()> {
        let memory = &record.memory;
        if !memory.ease_factor.is_finite() || memory.next_interval_days == 0 {
            return Err(RepoError::InvalidData(format!(
                "refusing to store record {}/{} with ease {} and interval {}",
                record.user_id, record.word_id, memory.ease_factor, memory.next_interval_days
            )));
        }

        self.conn.execute(
            "INSERT INTO learning_records (
                user_id,
                word_id,
                mastered,
                last_learned_on,
                next_learn_on,
                last_reviewed_on,
                repetition_count,
                ease_factor,
                next_interval_days,
                due_on
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(user_id, word_id) DO UPDATE SET
                mastered = excluded.mastered,
                last_learned_on = excluded.last_learned_on,
                next_learn_on = excluded.next_learn_on,
                last_reviewed_on = excluded.last_reviewed_on,
                repetition_count = excluded.repetition_count,
                ease_factor = excluded.ease_factor,
                next_interval_days = excluded.next_interval_days,
                due_on = excluded.due_on,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                record.user_id,
                record.word_id,
                bool_to_int(memory.mastered),
                date_to_db(memory.last_learned_on),
                date_to_db(memory.next_learn_on),
                memory.last_reviewed_on.map(date_to_db),
                i64::from(memory.repetition_count),
                memory.ease_factor,
                i64::from(memory.next_interval_days),
                date_to_db(memory.due_on()),
            ],
        )?;
        Ok(())
    }

    fn book_progress(
        &self,
        user_id: &str,
        book_id: &str,
        today: NaiveDate,
    ) -> RepoResult<BookProgress> {
        let (total, learned, mastered, due) = self.conn.query_row(
            "WITH RECURSIVE book_tree(book_id) AS (
                SELECT ?2
                UNION
                SELECT b.book_id
                FROM word_books b
                INNER JOIN book_tree t ON b.parent_book_id = t.book_id
             )
             SELECT
                COUNT(DISTINCT sw.word_id),
                COUNT(DISTINCT r.word_id),
                COUNT(DISTINCT CASE WHEN r.mastered = 1 THEN r.word_id END),
                COUNT(DISTINCT CASE WHEN r.mastered = 0 AND r.due_on <= ?3 THEN r.word_id END)
             FROM section_words sw
             INNER JOIN sections s ON s.section_id = sw.section_id
             LEFT JOIN learning_records r
                ON r.word_id = sw.word_id AND r.user_id = ?1
             WHERE s.book_id IN (SELECT book_id FROM book_tree);",
            params![user_id, book_id, date_to_db(today)],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )?;

        Ok(BookProgress {
            total: parse_count(total, "book_progress.total")?,
            learned: parse_count(learned, "book_progress.learned")?,
            mastered: parse_count(mastered, "book_progress.mastered")?,
            due: parse_count(due, "book_progress.due")?,
        })
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<LearningRecord> {
    let last_learned_on: String = row.get("last_learned_on")?;
    let next_learn_on: String = row.get("next_learn_on")?;
    let last_reviewed_on = match row.get::<_, Option<String>>("last_reviewed_on")? {
        Some(value) => Some(parse_date(&value, "learning_records.last_reviewed_on")?),
        None => None,
    };
    let ease_factor: f64 = row.get("ease_factor")?;
    if !ease_factor.is_finite() {
        return Err(RepoError::InvalidData(format!(
            "invalid ease factor `{ease_factor}` in learning_records.ease_factor"
        )));
    }

    Ok(LearningRecord {
        user_id: row.get("user_id")?,
        word_id: row.get("word_id")?,
        memory: MemoryState {
            mastered: parse_bool(row.get("mastered")?, "learning_records.mastered")?,
            last_learned_on: parse_date(&last_learned_on, "learning_records.last_learned_on")?,
            next_learn_on: parse_date(&next_learn_on, "learning_records.next_learn_on")?,
            last_reviewed_on,
            repetition_count: parse_count(
                row.get("repetition_count")?,
                "learning_records.repetition_count",
            )?,
            ease_factor,
            next_interval_days: parse_count(
                row.get("next_interval_days")?,
                "learning_records.next_interval_days",
            )?,
        },
    })
}
