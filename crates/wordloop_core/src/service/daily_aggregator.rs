//! Daily learned/reviewed counters.
//!
//! # Responsibility
//! - Feed per-day counters from committed words.
//! - Serve ordered per-day summaries for reporting.
//!
//! # Invariants
//! - Increments are atomic adds in storage, never caller-side
//!   read-modify-write.
//! - [`DailyAggregator::commit_once`] counts a word at most once per day,
//!   so `learned + reviewed` equals distinct (word, day) commits.
//! - Summaries only contain days with a stored row; callers fill gaps.

use crate::model::record::{DailyKind, DailySum};
use crate::repo::daily_repo::DailySumStore;
use crate::repo::RepoResult;
use chrono::NaiveDate;
use log::debug;

/// Aggregator facade over a [`DailySumStore`].
pub struct DailyAggregator<S: DailySumStore> {
    store: S,
}

impl<S: DailySumStore> DailyAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds `delta` to one counter of `day`.
    pub fn increment(
        &self,
        user_id: &str,
        day: NaiveDate,
        kind: DailyKind,
        delta: u32,
    ) -> RepoResult<()> {
        match kind {
            DailyKind::Learned => self.store.add(user_id, day, delta, 0),
            DailyKind::Reviewed => self.store.add(user_id, day, 0, delta),
        }
    }

    /// Counts one committed word, unless it was already counted on `day`.
    ///
    /// Returns whether a counter moved.
    pub fn commit_once(
        &self,
        user_id: &str,
        day: NaiveDate,
        word_id: &str,
        kind: DailyKind,
    ) -> RepoResult<bool> {
        if !self.store.mark_commit(user_id, day, word_id, kind)? {
            debug!(
                "event=daily_commit module=daily status=skipped reason=already_counted user_id={} day={}",
                user_id, day
            );
            return Ok(false);
        }
        self.increment(user_id, day, kind, 1)?;
        Ok(true)
    }

    /// Stored days in `[from, to]`, ascending.
    pub fn summary_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> RepoResult<Vec<DailySum>> {
        self.store.list_range(user_id, from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::DailyAggregator;
    use crate::db::open_db_in_memory;
    use crate::model::record::DailyKind;
    use crate::repo::daily_repo::SqliteDailySumStore;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn seed_learner(conn: &rusqlite::Connection) {
        conn.execute(
            "INSERT INTO learners (user_id, settings_json) VALUES ('u1', '{}');",
            [],
        )
        .unwrap();
    }

    #[test]
    fn increments_accumulate_per_kind() {
        let conn = open_db_in_memory().unwrap();
        seed_learner(&conn);
        let aggregator = DailyAggregator::new(SqliteDailySumStore::new(&conn));

        aggregator.increment("u1", day(2), DailyKind::Learned, 3).unwrap();
        aggregator.increment("u1", day(2), DailyKind::Reviewed, 2).unwrap();
        aggregator.increment("u1", day(2), DailyKind::Learned, 1).unwrap();

        let sums = aggregator.summary_range("u1", day(1), day(3)).unwrap();
        assert_eq!(sums.len(), 1);
        assert_eq!(sums[0].learned, 4);
        assert_eq!(sums[0].reviewed, 2);
        assert_eq!(sums[0].total(), 6);
    }

    #[test]
    fn commit_once_ignores_repeats_on_the_same_day() {
        let conn = open_db_in_memory().unwrap();
        seed_learner(&conn);
        let aggregator = DailyAggregator::new(SqliteDailySumStore::new(&conn));

        assert!(aggregator
            .commit_once("u1", day(5), "w1", DailyKind::Learned)
            .unwrap());
        assert!(!aggregator
            .commit_once("u1", day(5), "w1", DailyKind::Learned)
            .unwrap());
        assert!(aggregator
            .commit_once("u1", day(6), "w1", DailyKind::Reviewed)
            .unwrap());

        let sums = aggregator.summary_range("u1", day(1), day(30)).unwrap();
        let days: Vec<(NaiveDate, u32, u32)> = sums
            .iter()
            .map(|sum| (sum.day, sum.learned, sum.reviewed))
            .collect();
        assert_eq!(days, vec![(day(5), 1, 0), (day(6), 0, 1)]);
    }

    #[test]
    fn summary_range_is_inclusive_and_gap_tolerant() {
        let conn = open_db_in_memory().unwrap();
        seed_learner(&conn);
        let aggregator = DailyAggregator::new(SqliteDailySumStore::new(&conn));
        for d in [1, 4, 9] {
            aggregator.increment("u1", day(d), DailyKind::Learned, d).unwrap();
        }

        let sums = aggregator.summary_range("u1", day(4), day(9)).unwrap();
        let days: Vec<NaiveDate> = sums.iter().map(|sum| sum.day).collect();
        assert_eq!(days, vec![day(4), day(9)]);
        assert!(aggregator
            .summary_range("u1", day(10), day(20))
            .unwrap()
            .is_empty());
    }
}
