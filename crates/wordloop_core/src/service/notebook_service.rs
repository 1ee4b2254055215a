//! Learner notebook use-cases.

use crate::model::word::IdKind;
use crate::repo::catalog_repo::{SqliteWordCatalog, WordCatalog};
use crate::repo::learner_repo::SqliteLearnerStore;
use crate::repo::notebook_repo::{NotebookEntry, NotebookStore, SqliteNotebookStore};
use crate::service::error::{LearningError, LearningResult};
use crate::service::{require_learner, validate_ids};
use rusqlite::{Connection, TransactionBehavior};

pub struct NotebookService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> NotebookService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Adds the word when absent, removes it when present.
    ///
    /// Returns whether the word is in the notebook afterwards.
    pub fn toggle_notebook(&mut self, user_id: &str, word_id: &str) -> LearningResult<bool> {
        validate_ids(&[(IdKind::User, user_id), (IdKind::Word, word_id)])?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_learner(&SqliteLearnerStore::new(&tx), user_id)?;
        if SqliteWordCatalog::new(&tx).get_word(word_id)?.is_none() {
            return Err(LearningError::not_found("word", word_id));
        }

        let notebook = SqliteNotebookStore::new(&tx);
        let starred = if notebook.contains(user_id, word_id)? {
            notebook.remove(user_id, word_id)?;
            false
        } else {
            notebook.add(user_id, word_id)?;
            true
        };
        tx.commit()?;
        Ok(starred)
    }

    /// Starred words with content, newest first. Mastered words included.
    pub fn list_notebook(&self, user_id: &str) -> LearningResult<Vec<NotebookEntry>> {
        validate_ids(&[(IdKind::User, user_id)])?;
        let conn: &Connection = &*self.conn;
        require_learner(&SqliteLearnerStore::new(conn), user_id)?;
        Ok(SqliteNotebookStore::new(conn).list(user_id)?)
    }
}
