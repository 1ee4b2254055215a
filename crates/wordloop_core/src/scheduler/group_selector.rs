//! Candidate selection for one group draw.
//!
//! # Responsibility
//! - Decide which words a group presents and in which role.
//! - Apply the overflow oversampling rule.
//!
//! # Invariants
//! - Order is carry, then due reviews (oldest due first, then section
//!   order), then new words in section order.
//! - A word appears at most once.
//! - Mastered words are never returned.
//! - Pending carry is never truncated, even when it alone exceeds the pool.

use crate::model::group::{Candidate, CandidateRole, CarryEntry};
use crate::model::record::{DailyKind, MemoryState};
use crate::repo::catalog_repo::WordCatalog;
use crate::repo::record_repo::LearningRecordStore;
use crate::repo::RepoResult;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Inputs for one selection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRequest<'a> {
    pub user_id: &'a str,
    pub section_id: &'a str,
    /// Words that must be committed to complete the group.
    pub target_size: u32,
    /// Total candidates to draw, overflow included.
    pub pool_size: u32,
    pub today: NaiveDate,
}

/// Selector output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub candidates: Vec<Candidate>,
    /// Carry entries discarded because the word is mastered or no longer
    /// part of the section.
    pub dropped_carry: Vec<String>,
}

impl Selection {
    pub fn count_role(&self, role: CandidateRole) -> usize {
        self.candidates
            .iter()
            .filter(|candidate| candidate.role == role)
            .count()
    }
}

/// Scheduling filter over one word's stored state.
///
/// Returns the role the word may take in a fresh draw, or `None` when it
/// must be skipped (mastered, or learned but not yet due).
pub fn classify(record: Option<&MemoryState>, today: NaiveDate) -> Option<CandidateRole> {
    match record {
        None => Some(CandidateRole::New),
        Some(state) if state.is_due(today) => Some(CandidateRole::Review),
        Some(_) => None,
    }
}

/// Builds ordered candidate lists from catalog and record collaborators.
pub struct GroupSelector<'a, C: WordCatalog, R: LearningRecordStore> {
    catalog: &'a C,
    records: &'a R,
}

impl<'a, C: WordCatalog, R: LearningRecordStore> GroupSelector<'a, C, R> {
    pub fn new(catalog: &'a C, records: &'a R) -> Self {
        Self { catalog, records }
    }

    /// Selects candidates for one group.
    ///
    /// `carry` must already be filtered for expiry. An under-full result is
    /// valid and means the section has nothing more to offer right now.
    pub fn select(
        &self,
        request: &SelectionRequest<'_>,
        carry: &[CarryEntry],
    ) -> RepoResult<Selection> {
        let section_words = self.catalog.list_section_words(request.section_id)?;
        let in_section: HashSet<&str> = section_words
            .iter()
            .map(|placed| placed.word_id.as_str())
            .collect();

        let mut selection = Selection::default();
        let mut seen: HashSet<String> = HashSet::new();

        let mut pending_carry: Vec<&CarryEntry> = carry.iter().collect();
        pending_carry.sort_by_key(|entry| entry.position);
        let carry_ids: Vec<String> = pending_carry
            .iter()
            .map(|entry| entry.word_id.clone())
            .collect();
        let carry_records = self.records.get_records(request.user_id, &carry_ids)?;

        for entry in pending_carry {
            let mastered = carry_records
                .get(&entry.word_id)
                .is_some_and(|record| record.memory.mastered);
            if mastered || !in_section.contains(entry.word_id.as_str()) {
                selection.dropped_carry.push(entry.word_id.clone());
                continue;
            }
            if seen.insert(entry.word_id.clone()) {
                selection.candidates.push(entry.to_candidate());
            }
        }

        let capacity = (request.pool_size.max(request.target_size) as usize)
            .max(selection.candidates.len());
        let carried = selection.candidates.len();

        if selection.candidates.len() < capacity {
            // Over-fetch by the carry size: carried words may also be due.
            let fetch = (capacity - selection.candidates.len() + carried) as u32;
            let due = self.records.list_due_in_section(
                request.user_id,
                request.section_id,
                request.today,
                fetch,
            )?;
            for record in due {
                if selection.candidates.len() >= capacity {
                    break;
                }
                if classify(Some(&record.memory), request.today) != Some(CandidateRole::Review) {
                    continue;
                }
                if seen.insert(record.word_id.clone()) {
                    selection.candidates.push(Candidate {
                        word_id: record.word_id,
                        role: CandidateRole::Review,
                        kind: DailyKind::Reviewed,
                        prior_exposures: 0,
                        prior_hits: 0,
                    });
                }
            }
        }

        if selection.candidates.len() < capacity {
            let fetch = (capacity - selection.candidates.len() + carried) as u32;
            let unlearned = self.records.list_unlearned_in_section(
                request.user_id,
                request.section_id,
                fetch,
            )?;
            for word_id in unlearned {
                if selection.candidates.len() >= capacity {
                    break;
                }
                if seen.insert(word_id.clone()) {
                    selection.candidates.push(Candidate {
                        word_id,
                        role: CandidateRole::New,
                        kind: DailyKind::Learned,
                        prior_exposures: 0,
                        prior_hits: 0,
                    });
                }
            }
        }

        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::classify;
    use crate::model::group::CandidateRole;
    use crate::model::record::MemoryState;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn learned_on(d: u32) -> MemoryState {
        MemoryState {
            mastered: false,
            last_learned_on: day(d),
            next_learn_on: day(d + 1),
            last_reviewed_on: None,
            repetition_count: 0,
            ease_factor: 2.5,
            next_interval_days: 1,
        }
    }

    #[test]
    fn unknown_words_are_new() {
        assert_eq!(classify(None, day(1)), Some(CandidateRole::New));
    }

    #[test]
    fn learned_words_wait_until_due() {
        let state = learned_on(3);
        assert_eq!(classify(Some(&state), day(3)), None);
        assert_eq!(classify(Some(&state), day(4)), Some(CandidateRole::Review));
    }

    #[test]
    fn mastered_words_are_always_skipped() {
        let mut state = learned_on(1);
        state.mastered = true;
        assert_eq!(classify(Some(&state), day(30)), None);
    }
}
