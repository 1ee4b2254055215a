//! SM-2 derived memory-state update rule.
//!
//! # Responsibility
//! - Convert (prior state, outcome, today) into the next memory state.
//!
//! # Invariants
//! - Pure and deterministic: no I/O, no clock reads.
//! - `ease_factor` stays within `[min_ease, max_ease]`.
//! - `next_interval_days >= 1`; under `recalled`/`partial` it never shrinks.

use crate::model::record::{MemoryState, Outcome};
use crate::model::settings::MemoryModelConfig;
use chrono::{Days, NaiveDate};

/// Computes the state that results from one exposure.
///
/// A first exposure (`prior == None`) only initializes the record; the
/// outcome is applied from the second exposure on.
pub fn update(
    prior: Option<&MemoryState>,
    outcome: Outcome,
    today: NaiveDate,
    config: &MemoryModelConfig,
) -> MemoryState {
    let Some(prior) = prior else {
        return initial_state(today, config);
    };

    let mut next = prior.clone();
    next.last_reviewed_on = Some(today);

    match outcome {
        Outcome::Forgot => {
            next.repetition_count = 0;
            next.ease_factor = clamp_ease(prior.ease_factor - config.forgot_ease_penalty, config);
            next.next_interval_days = 1;
            next.mastered = false;
        }
        Outcome::Recalled | Outcome::Partial => {
            let delta = if outcome == Outcome::Recalled {
                config.recalled_ease_delta
            } else {
                config.partial_ease_delta
            };
            next.repetition_count = prior.repetition_count.saturating_add(1);
            next.ease_factor = clamp_ease(prior.ease_factor + delta, config);
            next.next_interval_days = grow_interval(prior.next_interval_days, next.ease_factor);
            if reaches_mastery(&next, config) {
                next.mastered = true;
            }
        }
    }

    next
}

/// State of a word the learner declared as already known.
///
/// Keeps any existing history and only flips `mastered`.
pub fn mark_known(
    prior: Option<&MemoryState>,
    today: NaiveDate,
    config: &MemoryModelConfig,
) -> MemoryState {
    let mut state = match prior {
        Some(prior) => prior.clone(),
        None => initial_state(today, config),
    };
    state.mastered = true;
    state
}

fn initial_state(today: NaiveDate, config: &MemoryModelConfig) -> MemoryState {
    MemoryState {
        mastered: false,
        last_learned_on: today,
        next_learn_on: today.checked_add_days(Days::new(1)).unwrap_or(today),
        last_reviewed_on: None,
        repetition_count: 0,
        ease_factor: clamp_ease(config.initial_ease, config),
        next_interval_days: 1,
    }
}

fn clamp_ease(value: f64, config: &MemoryModelConfig) -> f64 {
    // Two decimals; settings reject steps below `EASE_STEP`.
    let rounded = (value * 100.0).round() / 100.0;
    rounded.clamp(config.min_ease, config.max_ease)
}

fn grow_interval(previous: u32, ease_factor: f64) -> u32 {
    let grown = (f64::from(previous.max(1)) * ease_factor).round();
    if grown >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (grown as u32).max(previous).max(1)
    }
}

fn reaches_mastery(state: &MemoryState, config: &MemoryModelConfig) -> bool {
    state.repetition_count >= config.mastery_repetitions
        && state.next_interval_days > config.mastery_horizon_days
}
