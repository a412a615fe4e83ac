//! Fixed-capacity FIFO history of retired buckets.
//!
//! The window is the detector's statistical memory: the last `capacity`
//! completed time units, oldest first. It only ever changes through
//! `roll_in`, which evicts before appending so the length bound holds at
//! every observable moment.

use std::collections::VecDeque;

use crate::detection::{Bucket, Stats};

/// Ordered, bounded history of completed buckets.
#[derive(Debug)]
pub struct HistoryWindow {
    /// Maximum number of buckets retained. Fixed at construction.
    capacity: usize,

    /// Retired buckets, oldest at the front.
    buckets: VecDeque<Bucket>,

    /// Cache of the most recent `request_stats` computation. Not
    /// invariant-held state; refreshed on every call.
    last_request_stats: Option<Stats>,
}

impl HistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buckets: VecDeque::with_capacity(capacity),
            last_request_stats: None,
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// True iff any held bucket carries this time-unit label.
    ///
    /// Linear scan; the window is at most `capacity` buckets long.
    pub fn contains(&self, label: i64) -> bool {
        self.buckets.iter().any(|b| b.label() == label)
    }

    /// The most recently retired bucket, if any.
    ///
    /// This is the scan's reference bucket for per-address baselines.
    pub fn newest(&self) -> Option<&Bucket> {
        self.buckets.back()
    }

    /// Retire a bucket into the window.
    ///
    /// Appends directly while below capacity; at capacity, evicts the oldest
    /// bucket first so the length never exceeds the bound. When there is
    /// nothing to evict (capacity configured as 0), the incoming bucket is
    /// dropped and the window stays empty - misconfiguration is tolerated,
    /// not fatal.
    pub fn roll_in(&mut self, bucket: Bucket) {
        if self.buckets.len() >= self.capacity {
            if self.buckets.pop_front().is_none() {
                log::warn!("history window has capacity 0; dropping retired bucket");
                return;
            }
        }
        self.buckets.push_back(bucket);
    }

    /// Mean and population standard deviation of `total_requests` across all
    /// held buckets.
    ///
    /// Returns `None` when the window is empty. Callers must hold at least
    /// one bucket - in practice the detector requires two, since a
    /// single-bucket window has zero stdev and would trip on any deviation.
    /// The computed stats are also cached on the window for later reuse.
    pub fn request_stats(&mut self) -> Option<Stats> {
        let stats = Stats::from_counts(self.buckets.iter().map(|b| b.total_requests()));
        self.last_request_stats = stats;
        stats
    }

    /// The cached result of the last `request_stats` call.
    pub fn last_request_stats(&self) -> Option<Stats> {
        self.last_request_stats
    }

    /// Iterate held buckets, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_with_total(label: i64, total: u64) -> Bucket {
        let mut bucket = Bucket::new(label);
        for _ in 0..total {
            bucket.update("10.0.0.1");
        }
        bucket
    }

    #[test]
    fn test_grows_until_capacity_then_evicts_fifo() {
        let mut window = HistoryWindow::new(3);
        for label in 0..5 {
            window.roll_in(bucket_with_total(label, 1));
            assert!(window.len() <= 3);
        }
        // After 5 roll-ins at capacity 3, the window holds the most recent
        // three buckets in arrival order.
        let labels: Vec<i64> = window.iter().map(|b| b.label()).collect();
        assert_eq!(labels, vec![2, 3, 4]);
    }

    #[test]
    fn test_contains_tracks_roll_in_and_eviction() {
        let mut window = HistoryWindow::new(2);
        window.roll_in(bucket_with_total(10, 1));
        assert!(window.contains(10));

        window.roll_in(bucket_with_total(20, 1));
        assert!(window.contains(10));
        assert!(window.contains(20));

        // Third roll-in evicts label 10.
        window.roll_in(bucket_with_total(30, 1));
        assert!(!window.contains(10));
        assert!(window.contains(20));
        assert!(window.contains(30));
    }

    #[test]
    fn test_capacity_zero_stays_empty() {
        let mut window = HistoryWindow::new(0);
        window.roll_in(bucket_with_total(0, 5));
        assert_eq!(window.len(), 0);
        assert!(window.is_empty());
        assert!(!window.contains(0));
    }

    #[test]
    fn test_request_stats_empty_window_is_none() {
        let mut window = HistoryWindow::new(4);
        assert!(window.request_stats().is_none());
        assert!(window.last_request_stats().is_none());
    }

    #[test]
    fn test_request_stats_mean_and_population_stdev() {
        let mut window = HistoryWindow::new(4);
        // Totals 2, 4, 6: mean 4, population variance (4 + 0 + 4) / 3.
        for (label, total) in [(0, 2), (60, 4), (120, 6)] {
            window.roll_in(bucket_with_total(label, total));
        }
        let stats = window.request_stats().unwrap();
        assert_eq!(stats.mean, 4.0);
        assert!((stats.stdev - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_request_stats_caches_last_computation() {
        let mut window = HistoryWindow::new(4);
        window.roll_in(bucket_with_total(0, 10));
        window.roll_in(bucket_with_total(60, 10));

        let stats = window.request_stats().unwrap();
        assert_eq!(window.last_request_stats(), Some(stats));
        assert_eq!(stats.mean, 10.0);
        assert_eq!(stats.stdev, 0.0);
    }

    #[test]
    fn test_newest_is_last_rolled_in() {
        let mut window = HistoryWindow::new(2);
        assert!(window.newest().is_none());
        window.roll_in(bucket_with_total(0, 1));
        window.roll_in(bucket_with_total(60, 2));
        assert_eq!(window.newest().unwrap().label(), 60);
    }
}
