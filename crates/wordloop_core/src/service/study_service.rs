//! Study-duration tracking.
//!
//! Durations arrive in seconds and are stored as whole minutes
//! (`floor(seconds / 60)`). A session id lets a client keep extending the
//! same session while it runs. A single session is capped at one day.

use crate::model::word::IdKind;
use crate::repo::learner_repo::SqliteLearnerStore;
use crate::repo::study_repo::{SqliteStudyStore, StudyDay, StudyStore};
use crate::service::error::{LearningResult, ValidationError};
use crate::service::{require_learner, resolve_day, validate_ids};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

/// One session never spans more than a day.
const MAX_SESSION_SECONDS: i64 = 86_400;

/// Stored state of one study session after a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySessionReceipt {
    pub session_id: String,
    pub minutes: u32,
    /// `false` when an existing session was updated.
    pub created: bool,
}

pub struct StudyService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> StudyService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Inserts a session, or overwrites the duration of `session_id`.
    ///
    /// An unknown `session_id` starts a new session under that id. The
    /// day of a session is fixed when it is created.
    pub fn record_study(
        &mut self,
        user_id: &str,
        seconds: i64,
        session_id: Option<&str>,
        at: Option<DateTime<Utc>>,
    ) -> LearningResult<StudySessionReceipt> {
        validate_ids(&[(IdKind::User, user_id)])?;
        if let Some(session_id) = session_id {
            validate_ids(&[(IdKind::StudySession, session_id)])?;
        }
        if seconds < 0 {
            return Err(ValidationError::NegativeDuration(seconds).into());
        }
        if seconds > MAX_SESSION_SECONDS {
            return Err(ValidationError::DurationTooLong {
                seconds,
                max: MAX_SESSION_SECONDS,
            }
            .into());
        }
        // Bounded above, so at most 1440.
        let minutes = (seconds / 60) as u32;
        let today = resolve_day(at)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        require_learner(&SqliteLearnerStore::new(&tx), user_id)?;
        let store = SqliteStudyStore::new(&tx);

        let session_id = match session_id {
            Some(session_id) => session_id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let created = if store.update_session(user_id, &session_id, minutes)? {
            false
        } else {
            store.insert_session(user_id, &session_id, today, minutes)?;
            true
        };
        tx.commit()?;

        Ok(StudySessionReceipt {
            session_id,
            minutes,
            created,
        })
    }

    /// Per-day minute totals, ascending by day.
    pub fn study_minutes_by_day(&self, user_id: &str) -> LearningResult<Vec<StudyDay>> {
        validate_ids(&[(IdKind::User, user_id)])?;
        let conn: &Connection = &*self.conn;
        require_learner(&SqliteLearnerStore::new(conn), user_id)?;
        Ok(SqliteStudyStore::new(conn).minutes_by_day(user_id)?)
    }
}
