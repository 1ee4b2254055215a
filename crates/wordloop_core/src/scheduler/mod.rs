//! Pure scheduling rules.
//!
//! # Responsibility
//! - Memory-state updates, candidate selection and group accounting.
//!
//! # Invariants
//! - Nothing in this module writes to storage; selection only reads
//!   through repository traits.

pub mod group_selector;
pub mod memory_model;
pub mod session_accumulator;
