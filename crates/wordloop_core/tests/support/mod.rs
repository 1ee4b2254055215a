#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::Connection;
use wordloop_core::{
    CatalogService, DrawGroupRequest, DrawnGroup, LearnerService, LearningService,
    LearningSettings, Outcome, Section, SectionImport, SubmitOutcomeRequest,
    SubmitOutcomeResponse, Word, WordBook,
};

pub const BOOK: &str = "book-1";

/// 09:00 UTC on 2024-03-`d`.
pub fn at(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, 9, 0, 0).unwrap()
}

pub fn day(d: u32) -> NaiveDate {
    at(d).date_naive()
}

pub fn word_id(section_id: &str, index: usize) -> String {
    format!("{section_id}-w{index:02}")
}

/// Creates `BOOK` (once) and a section holding `count` words in order.
pub fn seed_section(conn: &mut Connection, section_id: &str, count: usize) -> Vec<String> {
    let mut catalog = CatalogService::new(conn);
    if catalog.list_books(None).unwrap().is_empty() {
        catalog.upsert_book(&WordBook::new(BOOK, "Core vocabulary")).unwrap();
    }
    let words: Vec<Word> = (1..=count)
        .map(|index| {
            let id = word_id(section_id, index);
            Word::new(id.clone(), format!("lemma {id}"))
        })
        .collect();
    catalog
        .import_section(&SectionImport {
            section: Section {
                section_id: section_id.to_string(),
                book_id: BOOK.to_string(),
                name: format!("Section {section_id}"),
                position: 0,
            },
            words: words.clone(),
        })
        .unwrap();
    words.into_iter().map(|word| word.word_id).collect()
}

pub fn register(conn: &mut Connection, user_id: &str) {
    LearnerService::new(conn).register_learner(user_id).unwrap();
}

pub fn configure(conn: &mut Connection, user_id: &str, settings: LearningSettings) {
    LearnerService::new(conn)
        .update_settings(user_id, &settings)
        .unwrap();
}

pub fn draw(conn: &mut Connection, user_id: &str, section_id: &str, d: u32) -> DrawnGroup {
    LearningService::new(conn)
        .draw_group(&DrawGroupRequest::new(user_id, section_id).at(at(d)))
        .unwrap()
}

pub fn draw_sized(
    conn: &mut Connection,
    user_id: &str,
    section_id: &str,
    size: u32,
    d: u32,
) -> DrawnGroup {
    LearningService::new(conn)
        .draw_group(
            &DrawGroupRequest::new(user_id, section_id)
                .with_size(size)
                .at(at(d)),
        )
        .unwrap()
}

pub fn submit(
    conn: &mut Connection,
    user_id: &str,
    section_id: &str,
    word_id: &str,
    outcome: Outcome,
    key: &str,
    d: u32,
) -> SubmitOutcomeResponse {
    LearningService::new(conn)
        .submit_outcome(
            &SubmitOutcomeRequest::new(user_id, section_id, word_id, outcome, key).at(at(d)),
        )
        .unwrap()
}

pub fn daily_totals(conn: &mut Connection, user_id: &str, d: u32) -> (u32, u32) {
    let sums = LearningService::new(conn)
        .daily_summary(user_id, day(d), day(d))
        .unwrap();
    sums.first()
        .map(|sum| (sum.learned, sum.reviewed))
        .unwrap_or((0, 0))
}
