//! Learner profile.

use crate::model::settings::LearningSettings;
use serde::{Deserialize, Serialize};

/// One registered learner with their stored configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learner {
    pub user_id: String,
    pub settings: LearningSettings,
    /// Book the learner is currently working through, if chosen.
    pub current_book_id: Option<String>,
}
