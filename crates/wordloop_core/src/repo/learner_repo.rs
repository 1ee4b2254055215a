//! Learner profiles and their JSON settings.
//!
//! # Invariants
//! - `settings_json` always holds a serialized [`LearningSettings`];
//!   unknown or missing fields are tolerated on read through serde
//!   defaults.

use crate::model::learner::Learner;
use crate::model::settings::LearningSettings;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

pub trait LearnerStore {
    fn get_learner(&self, user_id: &str) -> RepoResult<Option<Learner>>;
    /// Creates the learner; returns `false` when it already existed.
    fn insert_learner(&self, user_id: &str, settings: &LearningSettings) -> RepoResult<bool>;
    fn save_settings(&self, user_id: &str, settings: &LearningSettings) -> RepoResult<()>;
    fn set_current_book(&self, user_id: &str, book_id: Option<&str>) -> RepoResult<()>;
}

pub struct SqliteLearnerStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLearnerStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl LearnerStore for SqliteLearnerStore<'_> {
    fn get_learner(&self, user_id: &str) -> RepoResult<Option<Learner>> {
        let raw = self
            .conn
            .query_row(
                "SELECT user_id, settings_json, current_book_id
                 FROM learners
                 WHERE user_id = ?1;",
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, settings_json, current_book_id)) = raw else {
            return Ok(None);
        };
        Ok(Some(Learner {
            user_id,
            settings: decode_settings(&settings_json)?,
            current_book_id,
        }))
    }

    fn insert_learner(&self, user_id: &str, settings: &LearningSettings) -> RepoResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO learners (user_id, settings_json) VALUES (?1, ?2);",
            params![user_id, encode_settings(settings)?],
        )?;
        Ok(inserted == 1)
    }

    fn save_settings(&self, user_id: &str, settings: &LearningSettings) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE learners
             SET settings_json = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE user_id = ?1;",
            params![user_id, encode_settings(settings)?],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("learner", user_id));
        }
        Ok(())
    }

    fn set_current_book(&self, user_id: &str, book_id: Option<&str>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE learners
             SET current_book_id = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE user_id = ?1;",
            params![user_id, book_id],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("learner", user_id));
        }
        Ok(())
    }
}

fn encode_settings(settings: &LearningSettings) -> RepoResult<String> {
    serde_json::to_string(settings)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode settings: {err}")))
}

fn decode_settings(value: &str) -> RepoResult<LearningSettings> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid learners.settings_json: {err}")))
}
