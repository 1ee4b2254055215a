use chrono::{Days, NaiveDate};
use wordloop_core::scheduler::memory_model::update;
use wordloop_core::{MemoryModelConfig, MemoryState, Outcome};

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .checked_add_days(Days::new(offset))
        .unwrap()
}

fn first_exposure(config: &MemoryModelConfig) -> MemoryState {
    update(None, Outcome::Recalled, day(0), config)
}

#[test]
fn first_exposure_initializes_without_applying_the_outcome() {
    let config = MemoryModelConfig::default();
    for outcome in [Outcome::Recalled, Outcome::Partial, Outcome::Forgot] {
        let state = update(None, outcome, day(0), &config);
        assert_eq!(state.repetition_count, 0);
        assert_eq!(state.ease_factor, 2.5);
        assert_eq!(state.next_interval_days, 1);
        assert_eq!(state.last_learned_on, day(0));
        assert_eq!(state.next_learn_on, day(1));
        assert_eq!(state.last_reviewed_on, None);
        assert_eq!(state.due_on(), day(1));
        assert!(!state.mastered);
    }
}

#[test]
fn recalled_sequence_never_shrinks_the_interval_until_forgot() {
    let config = MemoryModelConfig::default();
    let mut state = first_exposure(&config);
    let mut previous = state.next_interval_days;

    for step in 1..=12 {
        let today = state.due_on();
        state = update(Some(&state), Outcome::Recalled, today, &config);
        assert!(
            state.next_interval_days >= previous,
            "interval shrank at step {step}: {} < {previous}",
            state.next_interval_days
        );
        previous = state.next_interval_days;
    }

    let today = state.due_on();
    state = update(Some(&state), Outcome::Forgot, today, &config);
    assert_eq!(state.next_interval_days, 1);
    assert_eq!(state.repetition_count, 0);
}

#[test]
fn partial_answers_also_keep_intervals_non_decreasing() {
    let config = MemoryModelConfig::default();
    let mut state = first_exposure(&config);
    let mut previous = state.next_interval_days;
    for _ in 0..20 {
        let today = state.due_on();
        state = update(Some(&state), Outcome::Partial, today, &config);
        assert!(state.next_interval_days >= previous);
        assert!(state.ease_factor >= config.min_ease);
        previous = state.next_interval_days;
    }
    assert_eq!(state.ease_factor, config.min_ease);
}

#[test]
fn forgot_resets_repetitions_and_applies_penalty() {
    let config = MemoryModelConfig::default();
    let prior = MemoryState {
        mastered: false,
        last_learned_on: day(0),
        next_learn_on: day(1),
        last_reviewed_on: Some(day(20)),
        repetition_count: 3,
        ease_factor: 2.0,
        next_interval_days: 10,
    };

    let next = update(Some(&prior), Outcome::Forgot, day(30), &config);
    assert_eq!(next.repetition_count, 0);
    assert_eq!(next.next_interval_days, 1);
    assert_eq!(next.ease_factor, 1.8);
    assert!(!next.mastered);
    assert_eq!(next.last_reviewed_on, Some(day(30)));
    assert_eq!(next.due_on(), day(31));
}

#[test]
fn ease_factor_is_floored_on_repeated_lapses() {
    let config = MemoryModelConfig::default();
    let mut state = first_exposure(&config);
    for offset in 1..=10 {
        state = update(Some(&state), Outcome::Forgot, day(offset), &config);
    }
    assert_eq!(state.ease_factor, config.min_ease);
}

#[test]
fn sustained_recall_reaches_mastery_only_past_both_thresholds() {
    let config = MemoryModelConfig::default();
    let mut state = first_exposure(&config);
    let mut steps = 0;
    while !state.mastered {
        let today = state.due_on();
        state = update(Some(&state), Outcome::Recalled, today, &config);
        steps += 1;
        assert!(steps < 50, "mastery never reached");
    }
    assert!(state.repetition_count >= config.mastery_repetitions);
    assert!(state.next_interval_days > config.mastery_horizon_days);
    assert!(!state.is_due(day(10_000)));

    let lapsed = update(Some(&state), Outcome::Forgot, state.due_on(), &config);
    assert!(!lapsed.mastered);
}

#[test]
fn custom_constants_are_honoured() {
    let config = MemoryModelConfig {
        initial_ease: 2.0,
        recalled_ease_delta: 0.3,
        mastery_repetitions: 2,
        mastery_horizon_days: 2,
        ..MemoryModelConfig::default()
    };
    let state = first_exposure(&config);
    assert_eq!(state.ease_factor, 2.0);

    let state = update(Some(&state), Outcome::Recalled, day(1), &config);
    assert_eq!(state.ease_factor, 2.3);
    assert_eq!(state.next_interval_days, 2);
    assert!(!state.mastered);

    let state = update(Some(&state), Outcome::Recalled, day(3), &config);
    assert_eq!(state.ease_factor, 2.6);
    assert_eq!(state.next_interval_days, 5);
    assert!(state.mastered);
}
