//! Learner notebook (starred words).

use crate::model::word::Word;
use crate::repo::catalog_repo::map_word_row;
use crate::repo::RepoResult;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// Starred word with its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookEntry {
    pub word: Word,
    /// Unix epoch milliseconds.
    pub added_at: i64,
}

pub trait NotebookStore {
    fn contains(&self, user_id: &str, word_id: &str) -> RepoResult<bool>;
    fn add(&self, user_id: &str, word_id: &str) -> RepoResult<()>;
    fn remove(&self, user_id: &str, word_id: &str) -> RepoResult<()>;
    /// Newest first.
    fn list(&self, user_id: &str) -> RepoResult<Vec<NotebookEntry>>;
}

pub struct SqliteNotebookStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotebookStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NotebookStore for SqliteNotebookStore<'_> {
    fn contains(&self, user_id: &str, word_id: &str) -> RepoResult<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM notebook_entries WHERE user_id = ?1 AND word_id = ?2
             );",
            params![user_id, word_id],
            |row| row.get(0),
        )?;
        Ok(found == 1)
    }

    fn add(&self, user_id: &str, word_id: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO notebook_entries (user_id, word_id) VALUES (?1, ?2);",
            params![user_id, word_id],
        )?;
        Ok(())
    }

    fn remove(&self, user_id: &str, word_id: &str) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM notebook_entries WHERE user_id = ?1 AND word_id = ?2;",
            params![user_id, word_id],
        )?;
        Ok(())
    }

    fn list(&self, user_id: &str) -> RepoResult<Vec<NotebookEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                w.word_id,
                w.lemma,
                w.part_of_speech,
                w.definition,
                w.translation,
                w.phonetic,
                w.audio_url,
                n.created_at
             FROM notebook_entries n
             INNER JOIN words w ON w.word_id = n.word_id
             WHERE n.user_id = ?1
             ORDER BY n.created_at DESC, n.rowid DESC;",
        )?;
        let entries = stmt
            .query_map([user_id], |row| {
                Ok(NotebookEntry {
                    word: map_word_row(row)?,
                    added_at: row.get("created_at")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}
