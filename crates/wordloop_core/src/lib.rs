//! Adaptive vocabulary review scheduling core.
//!
//! Holds the memory model, group selection with overflow carry, group
//! progress accounting and daily aggregates, backed by SQLite.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod scheduler;
pub mod service;

pub use db::migrations::{latest_version, schema_version};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{
    default_log_level, flush_logging, init_logging, logging_status, LoggingError,
};
pub use model::group::{
    Candidate, CandidateRole, CarryEntry, GroupId, GroupMember, GroupState, GroupStatus,
};
pub use model::learner::Learner;
pub use model::record::{DailyKind, DailySum, LearningRecord, MemoryState, Outcome};
pub use model::settings::{CommitPolicy, LearningSettings, MemoryModelConfig};
pub use model::word::{Section, SectionWord, Word, WordBook};
pub use repo::exposure_repo::ExposureReceipt;
pub use repo::notebook_repo::NotebookEntry;
pub use repo::record_repo::BookProgress;
pub use repo::study_repo::StudyDay;
pub use repo::{RepoError, RepoResult};
pub use service::catalog_service::{CatalogService, SectionImport};
pub use service::error::{LearningError, LearningResult, ValidationError};
pub use service::learner_service::LearnerService;
pub use service::learning_service::{
    DrawGroupRequest, DrawnGroup, LearningService, SkipOutcome, SubmitOutcomeRequest,
    SubmitOutcomeResponse,
};
pub use service::notebook_service::NotebookService;
pub use service::study_service::{StudyService, StudySessionReceipt};

/// Liveness check for embedding hosts.
pub fn ping() -> &'static str {
    "pong"
}

pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
