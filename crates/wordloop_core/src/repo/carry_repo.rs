//! Overflow carry persistence.
//!
//! Carry is keyed by (learner, section). A draw takes the whole set and
//! a group close writes its leftovers back.

use crate::model::group::CarryEntry;
use crate::model::record::DailyKind;
use crate::repo::{date_to_db, parse_count, parse_date, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

pub trait CarryStore {
    /// Current carry of one section, in retry order.
    fn peek(&self, user_id: &str, section_id: &str) -> RepoResult<Vec<CarryEntry>>;
    /// Reads and clears the carry of one section.
    fn take(&self, user_id: &str, section_id: &str) -> RepoResult<Vec<CarryEntry>>;
    /// Appends entries after any existing carry, replacing same-word rows.
    fn put(&self, user_id: &str, section_id: &str, entries: &[CarryEntry]) -> RepoResult<()>;
}

pub struct SqliteCarryStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCarryStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CarryStore for SqliteCarryStore<'_> {
    fn peek(&self, user_id: &str, section_id: &str) -> RepoResult<Vec<CarryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT word_id, kind, exposures, hits, position, carried_on
             FROM group_carry
             WHERE user_id = ?1 AND section_id = ?2
             ORDER BY position ASC, word_id ASC;",
        )?;
        let mut rows = stmt.query(params![user_id, section_id])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_carry_row(row)?);
        }
        Ok(entries)
    }

    fn take(&self, user_id: &str, section_id: &str) -> RepoResult<Vec<CarryEntry>> {
        let entries = self.peek(user_id, section_id)?;
        self.conn.execute(
            "DELETE FROM group_carry WHERE user_id = ?1 AND section_id = ?2;",
            params![user_id, section_id],
        )?;
        Ok(entries)
    }

    fn put(&self, user_id: &str, section_id: &str, entries: &[CarryEntry]) -> RepoResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let next_position: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(position) + 1, 0)
             FROM group_carry
             WHERE user_id = ?1 AND section_id = ?2;",
            params![user_id, section_id],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn.prepare(
            "INSERT INTO group_carry (
                user_id, section_id, word_id, kind, exposures, hits, position, carried_on
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(user_id, section_id, word_id) DO UPDATE SET
                kind = excluded.kind,
                exposures = excluded.exposures,
                hits = excluded.hits,
                position = excluded.position,
                carried_on = excluded.carried_on;",
        )?;
        for (offset, entry) in entries.iter().enumerate() {
            stmt.execute(params![
                user_id,
                section_id,
                entry.word_id,
                entry.kind.as_str(),
                i64::from(entry.exposures),
                i64::from(entry.hits),
                next_position + offset as i64,
                date_to_db(entry.carried_on),
            ])?;
        }
        Ok(())
    }
}

fn parse_carry_row(row: &Row<'_>) -> RepoResult<CarryEntry> {
    let kind: String = row.get("kind")?;
    let carried_on: String = row.get("carried_on")?;
    Ok(CarryEntry {
        word_id: row.get("word_id")?,
        kind: DailyKind::parse(&kind).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid kind `{kind}` in group_carry.kind"))
        })?,
        exposures: parse_count(row.get("exposures")?, "group_carry.exposures")?,
        hits: parse_count(row.get("hits")?, "group_carry.hits")?,
        position: parse_count(row.get("position")?, "group_carry.position")?,
        carried_on: parse_date(&carried_on, "group_carry.carried_on")?,
    })
}
