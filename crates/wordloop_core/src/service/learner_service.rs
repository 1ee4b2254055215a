//! Learner registration, settings and book progress.
//!
//! # Invariants
//! - Settings are validated before they are written; reads trust storage.
//! - `current_book_id` always references an existing book.

use crate::model::learner::Learner;
use crate::model::settings::LearningSettings;
use crate::model::word::IdKind;
use crate::repo::catalog_repo::{SqliteWordCatalog, WordCatalog};
use crate::repo::learner_repo::{LearnerStore, SqliteLearnerStore};
use crate::repo::record_repo::{BookProgress, LearningRecordStore, SqliteLearningRecordStore};
use crate::service::error::{LearningError, LearningResult};
use crate::service::{require_learner, resolve_day, validate_ids};
use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

pub struct LearnerService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> LearnerService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Creates a learner with default settings.
    ///
    /// Registering an existing learner returns it unchanged.
    pub fn register_learner(&mut self, user_id: &str) -> LearningResult<Learner> {
        validate_ids(&[(IdKind::User, user_id)])?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let store = SqliteLearnerStore::new(&tx);
        let created = store.insert_learner(user_id, &LearningSettings::default())?;
        let learner = require_learner(&store, user_id)?;
        tx.commit()?;

        if created {
            info!(
                "event=learner_register module=learner status=ok user_id={}",
                user_id
            );
        }
        Ok(learner)
    }

    pub fn get_learner(&self, user_id: &str) -> LearningResult<Learner> {
        validate_ids(&[(IdKind::User, user_id)])?;
        require_learner(&SqliteLearnerStore::new(&*self.conn), user_id)
    }

    pub fn get_settings(&self, user_id: &str) -> LearningResult<LearningSettings> {
        Ok(self.get_learner(user_id)?.settings)
    }

    /// Replaces the learner's settings after validating them.
    pub fn update_settings(
        &mut self,
        user_id: &str,
        settings: &LearningSettings,
    ) -> LearningResult<LearningSettings> {
        validate_ids(&[(IdKind::User, user_id)])?;
        settings.validate()?;

        SqliteLearnerStore::new(&*self.conn).save_settings(user_id, settings)?;
        info!(
            "event=settings_save module=learner status=ok user_id={} group_size={} overflow_ratio={} commit_policy={:?}",
            user_id, settings.group_size, settings.overflow_ratio, settings.commit_policy
        );
        Ok(settings.clone())
    }

    /// Selects the book the learner works through; `None` clears it.
    pub fn set_current_book(
        &mut self,
        user_id: &str,
        book_id: Option<&str>,
    ) -> LearningResult<Learner> {
        validate_ids(&[(IdKind::User, user_id)])?;
        if let Some(book_id) = book_id {
            validate_ids(&[(IdKind::Book, book_id)])?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(book_id) = book_id {
            if SqliteWordCatalog::new(&tx).get_book(book_id)?.is_none() {
                return Err(LearningError::not_found("book", book_id));
            }
        }
        let store = SqliteLearnerStore::new(&tx);
        store.set_current_book(user_id, book_id)?;
        let learner = require_learner(&store, user_id)?;
        tx.commit()?;
        Ok(learner)
    }

    /// Word counts of one book and its sub-books for the learner.
    pub fn book_progress(
        &self,
        user_id: &str,
        book_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> LearningResult<BookProgress> {
        validate_ids(&[(IdKind::User, user_id), (IdKind::Book, book_id)])?;
        let today = resolve_day(at)?;
        let conn: &Connection = &*self.conn;
        require_learner(&SqliteLearnerStore::new(conn), user_id)?;
        if SqliteWordCatalog::new(conn).get_book(book_id)?.is_none() {
            return Err(LearningError::not_found("book", book_id));
        }
        Ok(SqliteLearningRecordStore::new(conn).book_progress(user_id, book_id, today)?)
    }
}
