//! Domain model for vocabulary scheduling.
//!
//! # Responsibility
//! - Define canonical data structures shared by scheduler, repositories
//!   and services.
//! - Keep identifiers, memory state and group bookkeeping free of I/O.
//!
//! # Invariants
//! - At most one `LearningRecord` exists per (learner, word).
//! - Absence of a record means "never learned".

pub mod group;
pub mod learner;
pub mod record;
pub mod settings;
pub mod word;
