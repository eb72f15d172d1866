//! Retention scheduling over time-bucketed tapes
//!
//! Scheduling is a pure function of the entry set, the time series and a
//! reference time. It runs in two passes:
//!
//! 1. Assignment: buckets are visited smallest window first, and each claims
//!    every unassigned entry younger than its threshold. An entry therefore
//!    lands in the finest bucket it fits. Entries older than the widest
//!    window are purged.
//! 2. Collision resolution: a bucket keeps only its newest entry. The excess
//!    moves into the next bucket if that bucket is empty, otherwise it is
//!    purged. Since the next bucket is visited right after, promotions carry
//!    forward through consecutive empty buckets like a counter increment.

use crate::entry::{OrderedEntrySet, SnapshotEntry};
use crate::series::TimeSeries;
use chrono::{DateTime, Utc};

/// Entries assigned to one bucket during a rotation pass
pub type Tape = Vec<SnapshotEntry>;

/// Outcome of a rotation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationResult {
    /// Retained entries, one tape per bucket (diagnostic)
    pub tapes: Vec<Tape>,
    /// Entries to delete (authoritative)
    pub purge: Vec<SnapshotEntry>,
}

impl RotationResult {
    /// Entries kept across all tapes, in bucket order
    pub fn retained(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.tapes.iter().flatten()
    }

    /// Number of entries kept across all tapes
    pub fn retained_count(&self) -> usize {
        self.tapes.iter().map(Vec::len).sum()
    }
}

/// Decide which entries to keep and which to purge
pub fn schedule(
    series: &TimeSeries,
    entries: &OrderedEntrySet,
    now: DateTime<Utc>,
) -> RotationResult {
    let mut tapes: Vec<Tape> = Vec::with_capacity(series.quota());
    let mut pool: Vec<SnapshotEntry> = entries.iter().cloned().collect();

    // Assignment pass
    for threshold in series.thresholds() {
        let (claimed, rest): (Vec<_>, Vec<_>) = pool
            .into_iter()
            .partition(|entry| entry.age(now) < *threshold);
        tapes.push(claimed);
        pool = rest;
    }

    // Older than the widest window
    let mut purge = pool;

    // Collision pass
    let last = tapes.len().saturating_sub(1);
    for index in 0..tapes.len() {
        if tapes[index].len() < 2 {
            continue;
        }

        let excess = tapes[index].split_off(1);
        if index < last && tapes[index + 1].is_empty() {
            tapes[index + 1] = excess;
        } else {
            purge.extend(excess);
        }
    }

    RotationResult { tapes, purge }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_TIME_FORMAT;
    use chrono::{Duration, TimeZone};
    use std::time::Duration as StdDuration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
    }

    fn entry_at(created_at: DateTime<Utc>) -> SnapshotEntry {
        let name = format!("{}.sql.gz", created_at.format(DEFAULT_TIME_FORMAT));
        SnapshotEntry::new(name, 0, created_at)
    }

    fn aged(age: Duration) -> SnapshotEntry {
        entry_at(now() - age)
    }

    fn named(name: &str, age: Duration) -> SnapshotEntry {
        SnapshotEntry::new(name, 0, now() - age)
    }

    /// 5 minute hot window, 1 hour base: 5m, 1h, 2h, 4h, ...
    fn series(quota: usize) -> TimeSeries {
        TimeSeries::new(quota, StdDuration::from_secs(300), StdDuration::from_secs(3600)).unwrap()
    }

    fn names(entries: &[SnapshotEntry]) -> Vec<&str> {
        entries.iter().map(SnapshotEntry::name).collect()
    }

    #[test]
    fn test_empty_input() {
        let result = schedule(&series(4), &OrderedEntrySet::default(), now());

        assert_eq!(result.tapes.len(), 4);
        assert_eq!(result.retained_count(), 0);
        assert!(result.purge.is_empty());
    }

    #[test]
    fn test_collision_promotes_into_empty_bucket() {
        let t0 = aged(Duration::zero());
        let t1 = aged(Duration::seconds(1));
        let entries = OrderedEntrySet::from_unordered(vec![t1.clone(), t0.clone()]);

        let result = schedule(&series(4), &entries, now());

        assert_eq!(result.tapes[0], vec![t0]);
        assert_eq!(result.tapes[1], vec![t1]);
        assert!(result.purge.is_empty());
    }

    #[test]
    fn test_collision_purges_when_next_bucket_occupied() {
        let entries = OrderedEntrySet::from_unordered(vec![
            named("a.sql.gz", Duration::seconds(10)),
            named("b.sql.gz", Duration::seconds(10)),
            named("c.sql.gz", Duration::seconds(10)),
            named("unrelated.sql.gz", Duration::minutes(30)),
        ]);

        let result = schedule(&series(4), &entries, now());

        assert_eq!(names(&result.tapes[0]), vec!["a.sql.gz"]);
        assert_eq!(names(&result.tapes[1]), vec!["unrelated.sql.gz"]);
        assert_eq!(names(&result.purge), vec!["b.sql.gz", "c.sql.gz"]);
    }

    #[test]
    fn test_promotion_cascades_through_empty_buckets() {
        let entries: OrderedEntrySet = (0..4).map(|i| aged(Duration::seconds(i))).collect();

        let result = schedule(&series(4), &entries, now());

        for (index, tape) in result.tapes.iter().enumerate() {
            assert_eq!(tape.len(), 1, "bucket {} should hold one entry", index);
            assert_eq!(tape[0].age(now()), Duration::seconds(index as i64));
        }
        assert!(result.purge.is_empty());
    }

    #[test]
    fn test_promotion_falls_off_last_bucket() {
        let entries: OrderedEntrySet = (0..6).map(|i| aged(Duration::seconds(i))).collect();

        let result = schedule(&series(4), &entries, now());

        assert_eq!(result.retained_count(), 4);
        let purged: Vec<_> = result.purge.iter().map(|e| e.age(now())).collect();
        assert_eq!(purged, vec![Duration::seconds(4), Duration::seconds(5)]);
    }

    #[test]
    fn test_promotion_stops_at_first_occupied_bucket() {
        // Bucket 1 is occupied, bucket 2 is empty: the excess of bucket 0 is
        // purged rather than skipping ahead.
        let entries = OrderedEntrySet::from_unordered(vec![
            aged(Duration::seconds(1)),
            aged(Duration::seconds(2)),
            aged(Duration::minutes(20)),
        ]);

        let result = schedule(&series(4), &entries, now());

        assert_eq!(result.tapes[0].len(), 1);
        assert_eq!(result.tapes[1].len(), 1);
        assert!(result.tapes[2].is_empty());
        assert_eq!(result.purge, vec![aged(Duration::seconds(2))]);
    }

    #[test]
    fn test_distinct_buckets_lose_nothing() {
        let entries = OrderedEntrySet::from_unordered(vec![
            aged(Duration::minutes(1)),
            aged(Duration::minutes(30)),
            aged(Duration::minutes(90)),
            aged(Duration::hours(3)),
            aged(Duration::hours(6)),
        ]);

        let result = schedule(&series(8), &entries, now());

        assert!(result.purge.is_empty());
        assert_eq!(result.retained_count(), 5);
        for tape in &result.tapes[..5] {
            assert_eq!(tape.len(), 1);
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Exactly five minutes old does not fit the hot window
        let entries = OrderedEntrySet::from_unordered(vec![aged(Duration::minutes(5))]);

        let result = schedule(&series(4), &entries, now());

        assert!(result.tapes[0].is_empty());
        assert_eq!(result.tapes[1].len(), 1);
    }

    #[test]
    fn test_oldest_entry_always_purged() {
        let series = series(4);
        let ancient = aged(series.widest() + Duration::seconds(1));
        let boundary = aged(series.widest());
        let entries = OrderedEntrySet::from_unordered(vec![
            aged(Duration::zero()),
            ancient.clone(),
            boundary.clone(),
        ]);

        let result = schedule(&series, &entries, now());

        assert!(result.purge.contains(&ancient));
        assert!(result.purge.contains(&boundary));
        assert_eq!(result.retained_count(), 1);
    }

    #[test]
    fn test_future_entries_land_in_hot_window() {
        let entries = OrderedEntrySet::from_unordered(vec![aged(Duration::hours(-2))]);

        let result = schedule(&series(4), &entries, now());

        assert_eq!(result.tapes[0].len(), 1);
        assert!(result.purge.is_empty());
    }

    #[test]
    fn test_single_bucket_keeps_newest_only() {
        let series =
            TimeSeries::new(1, StdDuration::from_secs(3600), StdDuration::from_secs(3600)).unwrap();
        let entries: OrderedEntrySet = (0..3).map(|i| aged(Duration::minutes(i))).collect();

        let result = schedule(&series, &entries, now());

        assert_eq!(result.tapes, vec![vec![aged(Duration::zero())]]);
        assert_eq!(result.purge.len(), 2);
    }

    #[test]
    fn test_schedule_is_idempotent() {
        let entries: OrderedEntrySet = (0..50).map(|i| aged(Duration::minutes(i * 37))).collect();
        let series = series(12);

        let first = schedule(&series, &entries, now());
        let second = schedule(&series, &entries, now());

        assert_eq!(first, second);
    }

    #[test]
    fn test_quota_with_half_interval_cadence() {
        // Backups every 30 minutes, going back 100 runs
        let entries: OrderedEntrySet = (0..100).map(|i| aged(Duration::minutes(30 * i))).collect();
        let series = series(12);

        let result = schedule(&series, &entries, now() + Duration::seconds(1));

        assert!(result.retained_count() <= series.quota());
        assert_eq!(result.retained_count() + result.purge.len(), 100);
    }
}
