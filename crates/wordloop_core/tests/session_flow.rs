mod support;

use rusqlite::Connection;
use support::{at, configure, daily_totals, day, draw, draw_sized, register, seed_section, submit};
use wordloop_core::db::open_db_in_memory;
use wordloop_core::repo::carry_repo::{CarryStore, SqliteCarryStore};
use wordloop_core::repo::record_repo::{LearningRecordStore, SqliteLearningRecordStore};
use wordloop_core::{
    CandidateRole, CatalogService, CommitPolicy, DailyKind, GroupStatus, LearningError,
    LearningRecord, LearningService, LearningSettings, MemoryModelConfig, MemoryState, Outcome,
    SubmitOutcomeRequest, ValidationError,
};

fn setup(words: usize) -> (Connection, Vec<String>) {
    let mut conn = open_db_in_memory().unwrap();
    let ids = seed_section(&mut conn, "s1", words);
    register(&mut conn, "u1");
    (conn, ids)
}

fn recall_all(conn: &mut Connection, word_ids: &[String], d: u32) {
    for word_id in word_ids {
        let key = format!("k-{word_id}-{d}");
        submit(conn, "u1", "s1", word_id, Outcome::Recalled, &key, d);
    }
}

fn carry_ids(conn: &Connection) -> Vec<String> {
    SqliteCarryStore::new(conn)
        .peek("u1", "s1")
        .unwrap()
        .into_iter()
        .map(|entry| entry.word_id)
        .collect()
}

#[test]
fn twelve_word_section_commits_ten_and_carries_two() {
    let (mut conn, ids) = setup(12);

    let drawn = draw_sized(&mut conn, "u1", "s1", 10, 5);
    assert_eq!(drawn.group.members.len(), 12);
    assert_eq!(drawn.group.completion_target, 10);

    recall_all(&mut conn, &ids[..9], 5);
    let last = submit(&mut conn, "u1", "s1", &ids[9], Outcome::Recalled, "k-last", 5);
    assert!(last.receipt.committed);
    assert!(last.receipt.group_closed);
    assert_eq!(last.receipt.committed_count, 10);
    assert_eq!(last.receipt.completion_target, 10);

    assert_eq!(daily_totals(&mut conn, "u1", 5), (10, 0));
    assert_eq!(carry_ids(&conn), ids[10..].to_vec());
    assert!(LearningService::new(&mut conn)
        .group_status("u1", "s1")
        .unwrap()
        .is_none());

    let first = LearningService::new(&mut conn)
        .get_record("u1", &ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(first.repetition_count, 0);
    assert_eq!(first.next_learn_on, day(6));

    let next = draw_sized(&mut conn, "u1", "s1", 10, 6);
    assert_eq!(&next.word_ids()[..2], &[ids[10].as_str(), ids[11].as_str()]);
    assert_eq!(next.count_role(CandidateRole::Carry), 2);
    assert_eq!(next.count_role(CandidateRole::Review), 10);
    assert!(carry_ids(&conn).is_empty());
}

#[test]
fn overflow_leftovers_keep_their_exposures_and_lead_the_next_draw() {
    let (mut conn, ids) = setup(20);
    configure(
        &mut conn,
        "u1",
        LearningSettings {
            overflow_ratio: 1.4,
            ..LearningSettings::default()
        },
    );

    let drawn = draw(&mut conn, "u1", "s1", 5);
    assert_eq!(drawn.pool_size, 14);
    assert_eq!(drawn.group.members.len(), 14);

    for word_id in &ids[10..12] {
        let response = submit(&mut conn, "u1", "s1", word_id, Outcome::Forgot, &format!("f-{word_id}"), 5);
        assert!(!response.receipt.committed);
        assert!(response.receipt.applied);
    }
    recall_all(&mut conn, &ids[..10], 5);

    let carry = SqliteCarryStore::new(&conn).peek("u1", "s1").unwrap();
    let carried: Vec<(&str, u32)> = carry
        .iter()
        .map(|entry| (entry.word_id.as_str(), entry.exposures))
        .collect();
    assert_eq!(
        carried,
        vec![
            (ids[10].as_str(), 1),
            (ids[11].as_str(), 1),
            (ids[12].as_str(), 0),
            (ids[13].as_str(), 0),
        ]
    );
    assert!(carry.iter().all(|entry| entry.carried_on == day(5)));

    let next = draw(&mut conn, "u1", "s1", 5);
    let leading: Vec<(&str, CandidateRole, u32)> = next.group.members[..4]
        .iter()
        .map(|member| (member.word_id.as_str(), member.role, member.exposures))
        .collect();
    assert_eq!(
        leading,
        vec![
            (ids[10].as_str(), CandidateRole::Carry, 1),
            (ids[11].as_str(), CandidateRole::Carry, 1),
            (ids[12].as_str(), CandidateRole::Carry, 0),
            (ids[13].as_str(), CandidateRole::Carry, 0),
        ]
    );
    assert_eq!(next.count_role(CandidateRole::New), 6);
    assert_eq!(next.group.completion_target, 10);
}

#[test]
fn replayed_submission_returns_the_stored_receipt() {
    let (mut conn, ids) = setup(12);
    draw(&mut conn, "u1", "s1", 5);

    let first = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "tap-1", 5);
    let again = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "tap-1", 5);
    assert!(!first.replayed);
    assert!(again.replayed);
    assert_eq!(first.receipt, again.receipt);

    let before = LearningService::new(&mut conn)
        .get_record("u1", &ids[0])
        .unwrap();
    let third = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Forgot, "tap-1", 6);
    assert!(third.replayed);
    assert_eq!(third.receipt.outcome, Outcome::Recalled);
    let after = LearningService::new(&mut conn)
        .get_record("u1", &ids[0])
        .unwrap();
    assert_eq!(before, after);

    assert_eq!(daily_totals(&mut conn, "u1", 5), (1, 0));
    assert_eq!(daily_totals(&mut conn, "u1", 6), (0, 0));
    let group = LearningService::new(&mut conn)
        .group_status("u1", "s1")
        .unwrap()
        .unwrap();
    assert_eq!(group.member(&ids[0]).unwrap().exposures, 1);
    assert_eq!(group.committed_count(), 1);
}

#[test]
fn idempotency_key_cannot_be_reused_for_another_word() {
    let (mut conn, ids) = setup(12);
    draw(&mut conn, "u1", "s1", 5);
    submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "tap-1", 5);

    let err = LearningService::new(&mut conn)
        .submit_outcome(
            &SubmitOutcomeRequest::new("u1", "s1", ids[1].as_str(), Outcome::Recalled, "tap-1")
                .at(at(5)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LearningError::Validation(ValidationError::IdempotencyKeyReused { .. })
    ));
    assert_eq!(daily_totals(&mut conn, "u1", 5), (1, 0));
}

#[test]
fn idempotency_key_from_an_abandoned_group_is_not_replayed_into_the_next() {
    let (mut conn, ids) = setup(4);
    draw(&mut conn, "u1", "s1", 5);
    submit(&mut conn, "u1", "s1", &ids[0], Outcome::Forgot, "w01-tap", 5);
    let before = LearningService::new(&mut conn)
        .get_record("u1", &ids[0])
        .unwrap();

    draw(&mut conn, "u1", "s1", 5);
    let err = LearningService::new(&mut conn)
        .submit_outcome(
            &SubmitOutcomeRequest::new("u1", "s1", ids[0].as_str(), Outcome::Recalled, "w01-tap")
                .at(at(5)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LearningError::Validation(ValidationError::IdempotencyKeyReused { .. })
    ));

    let after = LearningService::new(&mut conn)
        .get_record("u1", &ids[0])
        .unwrap();
    assert_eq!(before, after);
    let group = LearningService::new(&mut conn)
        .group_status("u1", "s1")
        .unwrap()
        .unwrap();
    assert_eq!(group.committed_count(), 0);
    assert_eq!(daily_totals(&mut conn, "u1", 5), (0, 0));
}

#[test]
fn retry_after_the_closing_submission_is_still_replayed() {
    let (mut conn, ids) = setup(2);
    draw(&mut conn, "u1", "s1", 5);
    submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "a", 5);
    let closing = submit(&mut conn, "u1", "s1", &ids[1], Outcome::Recalled, "b", 5);
    assert!(closing.receipt.group_closed);

    let retry = submit(&mut conn, "u1", "s1", &ids[1], Outcome::Recalled, "b", 5);
    assert!(retry.replayed);
    assert_eq!(retry.receipt, closing.receipt);
    assert_eq!(daily_totals(&mut conn, "u1", 5), (2, 0));
}

#[test]
fn submissions_dated_before_the_group_draw_are_rejected() {
    let (mut conn, ids) = setup(4);
    draw(&mut conn, "u1", "s1", 20);

    let err = LearningService::new(&mut conn)
        .submit_outcome(
            &SubmitOutcomeRequest::new("u1", "s1", ids[0].as_str(), Outcome::Recalled, "early")
                .at(at(1)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LearningError::Validation(ValidationError::OutOfOrderTimestamp { .. })
    ));
    assert!(LearningService::new(&mut conn)
        .get_record("u1", &ids[0])
        .unwrap()
        .is_none());
    assert!(LearningService::new(&mut conn)
        .daily_summary("u1", day(1), day(31))
        .unwrap()
        .is_empty());

    let err = LearningService::new(&mut conn)
        .skip_word("u1", "s1", &ids[1], Some(at(1)))
        .unwrap_err();
    assert!(matches!(
        err,
        LearningError::Validation(ValidationError::OutOfOrderTimestamp { .. })
    ));
    let group = LearningService::new(&mut conn)
        .group_status("u1", "s1")
        .unwrap()
        .unwrap();
    assert!(!group.member(&ids[1]).unwrap().skipped);
}

#[test]
fn submissions_dated_before_the_last_review_are_rejected() {
    let (mut conn, ids) = setup(4);
    draw(&mut conn, "u1", "s1", 5);
    let stored = LearningRecord {
        user_id: "u1".to_string(),
        word_id: ids[0].clone(),
        memory: MemoryState {
            mastered: false,
            last_learned_on: day(2),
            next_learn_on: day(3),
            last_reviewed_on: Some(day(8)),
            repetition_count: 2,
            ease_factor: 2.5,
            next_interval_days: 6,
        },
    };
    SqliteLearningRecordStore::new(&conn)
        .upsert_record(&stored)
        .unwrap();

    let err = LearningService::new(&mut conn)
        .submit_outcome(
            &SubmitOutcomeRequest::new("u1", "s1", ids[0].as_str(), Outcome::Forgot, "late")
                .at(at(6)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LearningError::Validation(ValidationError::OutOfOrderTimestamp { .. })
    ));
    let memory = LearningService::new(&mut conn)
        .get_record("u1", &ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(memory, stored.memory);
    assert_eq!(daily_totals(&mut conn, "u1", 6), (0, 0));
}

#[test]
fn committed_word_in_a_second_group_is_not_counted_twice() {
    let mut conn = open_db_in_memory().unwrap();
    seed_section(&mut conn, "s1", 3);
    seed_section(&mut conn, "s2", 2);
    let shared = support::word_id("s1", 1);
    CatalogService::new(&mut conn)
        .place_word("s2", &shared, 5)
        .unwrap();
    register(&mut conn, "u1");

    draw(&mut conn, "u1", "s2", 5);
    draw(&mut conn, "u1", "s1", 5);

    submit(&mut conn, "u1", "s1", &shared, Outcome::Recalled, "s1-shared", 5);
    let second = submit(&mut conn, "u1", "s2", &shared, Outcome::Recalled, "s2-shared", 5);
    assert!(second.receipt.committed);
    assert_eq!(daily_totals(&mut conn, "u1", 5), (1, 0));
}

#[test]
fn skipped_word_is_mastered_and_never_carried() {
    let (mut conn, ids) = setup(12);
    draw_sized(&mut conn, "u1", "s1", 10, 5);

    let skipped = LearningService::new(&mut conn)
        .skip_word("u1", "s1", &ids[2], Some(at(5)))
        .unwrap();
    assert!(skipped.record.memory.mastered);
    assert!(!skipped.group_closed);
    let group = skipped.group.unwrap();
    assert_eq!(group.completion_target, 10);
    assert!(group.member(&ids[2]).unwrap().skipped);

    let err = LearningService::new(&mut conn)
        .submit_outcome(
            &SubmitOutcomeRequest::new("u1", "s1", ids[2].as_str(), Outcome::Recalled, "late")
                .at(at(5)),
        )
        .unwrap_err();
    assert!(matches!(err, LearningError::Validation(ValidationError::GroupState(_))));

    let closed = LearningService::new(&mut conn)
        .close_group("u1", "s1", Some(at(5)))
        .unwrap();
    assert_eq!(closed.status, GroupStatus::Closed);
    assert!(!carry_ids(&conn).contains(&ids[2]));

    for d in [6, 20] {
        let next = draw(&mut conn, "u1", "s1", d);
        assert!(!next.word_ids().contains(&ids[2].as_str()));
    }
    assert_eq!(daily_totals(&mut conn, "u1", 5), (0, 0));
}

#[test]
fn skipping_without_overflow_shrinks_the_target() {
    let (mut conn, ids) = setup(3);
    let drawn = draw(&mut conn, "u1", "s1", 5);
    assert_eq!(drawn.group.completion_target, 3);

    submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "a", 5);
    let outcome = LearningService::new(&mut conn)
        .skip_word("u1", "s1", &ids[1], Some(at(5)))
        .unwrap();
    assert_eq!(outcome.group.as_ref().unwrap().completion_target, 2);
    assert!(!outcome.group_closed);

    let last = submit(&mut conn, "u1", "s1", &ids[2], Outcome::Recalled, "c", 5);
    assert!(last.receipt.group_closed);
    assert_eq!(last.receipt.completion_target, 2);
    assert!(carry_ids(&conn).is_empty());
    assert_eq!(daily_totals(&mut conn, "u1", 5), (2, 0));
}

#[test]
fn skipping_a_word_outside_any_group_still_masters_it() {
    let (mut conn, ids) = setup(4);
    let outcome = LearningService::new(&mut conn)
        .skip_word("u1", "s1", &ids[3], Some(at(5)))
        .unwrap();
    assert!(outcome.group.is_none());
    assert!(outcome.record.memory.mastered);

    let err = LearningService::new(&mut conn)
        .skip_word("u1", "s1", "ghost", Some(at(5)))
        .unwrap_err();
    assert!(matches!(err, LearningError::NotFound { entity: "word", .. }));
}

#[test]
fn skipping_a_word_placed_only_in_another_section_is_not_found() {
    let (mut conn, _) = setup(3);
    let foreign = seed_section(&mut conn, "s2", 2);

    let err = LearningService::new(&mut conn)
        .skip_word("u1", "s1", &foreign[0], Some(at(5)))
        .unwrap_err();
    assert!(matches!(
        err,
        LearningError::NotFound {
            entity: "section word",
            ..
        }
    ));
    assert!(LearningService::new(&mut conn)
        .get_record("u1", &foreign[0])
        .unwrap()
        .is_none());
}

#[test]
fn carry_word_mastered_during_its_group_is_dropped_on_the_next_draw() {
    let (mut conn, ids) = setup(4);
    configure(
        &mut conn,
        "u1",
        LearningSettings {
            learn_repeat_times: 3,
            memory: MemoryModelConfig {
                mastery_repetitions: 1,
                mastery_horizon_days: 1,
                ..MemoryModelConfig::default()
            },
            ..LearningSettings::default()
        },
    );
    draw(&mut conn, "u1", "s1", 5);
    let first = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "m1", 5);
    let second = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "m2", 5);
    assert!(!first.receipt.committed);
    assert!(!second.receipt.committed);
    assert!(LearningService::new(&mut conn)
        .get_record("u1", &ids[0])
        .unwrap()
        .unwrap()
        .mastered);

    LearningService::new(&mut conn)
        .close_group("u1", "s1", Some(at(5)))
        .unwrap();
    assert!(carry_ids(&conn).contains(&ids[0]));

    let next = draw(&mut conn, "u1", "s1", 6);
    assert!(next.dropped_carry.contains(&ids[0]));
    assert!(!next.word_ids().contains(&ids[0].as_str()));
    assert_eq!(next.count_role(CandidateRole::Carry), 3);
}

#[test]
fn forgetting_a_due_review_resets_it_before_commit() {
    let (mut conn, ids) = setup(4);
    SqliteLearningRecordStore::new(&conn)
        .upsert_record(&LearningRecord {
            user_id: "u1".to_string(),
            word_id: ids[0].clone(),
            memory: MemoryState {
                mastered: false,
                last_learned_on: day(1),
                next_learn_on: day(2),
                last_reviewed_on: Some(day(2)),
                repetition_count: 3,
                ease_factor: 2.0,
                next_interval_days: 3,
            },
        })
        .unwrap();

    let drawn = draw(&mut conn, "u1", "s1", 5);
    assert_eq!(drawn.group.members[0].word_id, ids[0]);
    assert_eq!(drawn.group.members[0].role, CandidateRole::Review);
    assert_eq!(drawn.group.members[0].kind, DailyKind::Reviewed);

    let forgot = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Forgot, "r1", 5);
    assert!(!forgot.receipt.committed);
    let memory = LearningService::new(&mut conn)
        .get_record("u1", &ids[0])
        .unwrap()
        .unwrap();
    assert_eq!(memory.repetition_count, 0);
    assert_eq!(memory.next_interval_days, 1);
    assert_eq!(memory.ease_factor, 1.8);
    assert_eq!(memory.last_reviewed_on, Some(day(5)));

    let recalled = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "r2", 5);
    assert!(recalled.receipt.committed);
    assert_eq!(daily_totals(&mut conn, "u1", 5), (0, 1));
}

#[test]
fn explicit_close_moves_pending_words_to_carry() {
    let (mut conn, ids) = setup(5);
    draw(&mut conn, "u1", "s1", 5);
    submit(&mut conn, "u1", "s1", &ids[1], Outcome::Recalled, "a", 5);

    let closed = LearningService::new(&mut conn)
        .close_group("u1", "s1", Some(at(5)))
        .unwrap();
    assert_eq!(closed.status, GroupStatus::Closed);
    assert_eq!(closed.closed_on, Some(day(5)));
    assert_eq!(
        carry_ids(&conn),
        vec![ids[0].clone(), ids[2].clone(), ids[3].clone(), ids[4].clone()]
    );

    let err = LearningService::new(&mut conn)
        .close_group("u1", "s1", Some(at(5)))
        .unwrap_err();
    assert!(matches!(err, LearningError::NotFound { entity: "open group", .. }));
}

#[test]
fn redraw_abandons_the_open_group() {
    let (mut conn, ids) = setup(12);
    let first = draw_sized(&mut conn, "u1", "s1", 10, 5);
    submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "a", 5);

    let second = draw_sized(&mut conn, "u1", "s1", 10, 5);
    let abandoned = second.abandoned_group.as_ref().unwrap();
    assert_eq!(abandoned.group_id, first.group.group_id);
    assert_eq!(abandoned.status, GroupStatus::Abandoned);
    assert_eq!(abandoned.committed_count(), 1);

    assert_eq!(second.count_role(CandidateRole::Carry), 11);
    assert_eq!(second.word_ids()[0], ids[1].as_str());
    assert_eq!(second.group.completion_target, 10);
    assert!(carry_ids(&conn).is_empty());
}

#[test]
fn stale_carry_expires_and_words_return_as_new() {
    let (mut conn, ids) = setup(3);
    draw(&mut conn, "u1", "s1", 1);
    LearningService::new(&mut conn)
        .close_group("u1", "s1", Some(at(1)))
        .unwrap();
    assert_eq!(carry_ids(&conn).len(), 3);

    let next = draw(&mut conn, "u1", "s1", 9);
    assert_eq!(next.expired_carry, ids);
    assert_eq!(next.count_role(CandidateRole::New), 3);
    assert_eq!(next.count_role(CandidateRole::Carry), 0);
}

#[test]
fn carry_within_the_window_is_kept() {
    let (mut conn, _) = setup(3);
    draw(&mut conn, "u1", "s1", 2);
    LearningService::new(&mut conn)
        .close_group("u1", "s1", Some(at(2)))
        .unwrap();

    let next = draw(&mut conn, "u1", "s1", 9);
    assert!(next.expired_carry.is_empty());
    assert_eq!(next.count_role(CandidateRole::Carry), 3);
}

#[test]
fn submissions_outside_an_open_group_are_not_found() {
    let (mut conn, ids) = setup(20);
    let mut service = LearningService::new(&mut conn);

    let request =
        SubmitOutcomeRequest::new("u1", "s1", ids[0].as_str(), Outcome::Recalled, "x").at(at(5));
    let err = service.submit_outcome(&request).unwrap_err();
    assert!(matches!(err, LearningError::NotFound { entity: "open group", .. }));

    drop(service);
    draw_sized(&mut conn, "u1", "s1", 4, 5);
    let err = LearningService::new(&mut conn)
        .submit_outcome(
            &SubmitOutcomeRequest::new("u1", "s1", ids[19].as_str(), Outcome::Recalled, "y")
                .at(at(5)),
        )
        .unwrap_err();
    assert!(matches!(err, LearningError::NotFound { entity: "group member", .. }));
}

#[test]
fn repeat_times_and_commit_policy_control_commitment() {
    let (mut conn, ids) = setup(6);
    configure(
        &mut conn,
        "u1",
        LearningSettings {
            group_size: 2,
            learn_repeat_times: 2,
            ..LearningSettings::default()
        },
    );
    draw(&mut conn, "u1", "s1", 5);

    let first = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Recalled, "a1", 5);
    assert!(!first.receipt.committed);
    let missed = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Forgot, "a2", 5);
    assert!(!missed.receipt.committed);
    let second = submit(&mut conn, "u1", "s1", &ids[0], Outcome::Partial, "a3", 5);
    assert!(second.receipt.committed);
    assert_eq!(daily_totals(&mut conn, "u1", 5), (1, 0));

    configure(
        &mut conn,
        "u1",
        LearningSettings {
            group_size: 2,
            commit_policy: CommitPolicy::AnyAnswer,
            ..LearningSettings::default()
        },
    );
    let any = submit(&mut conn, "u1", "s1", &ids[1], Outcome::Forgot, "b1", 5);
    assert!(any.receipt.committed);
    assert!(any.receipt.group_closed);
    assert_eq!(daily_totals(&mut conn, "u1", 5), (2, 0));
}
