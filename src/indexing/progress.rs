//! Lock-free progress tracking for one indexing root.
//!
//! Workers of a root update the counters concurrently; readers take a
//! [`ProgressSnapshot`] at any time without blocking them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Lock-free progress tracker for a root
#[derive(Debug, Clone)]
pub struct IndexingProgress {
    /// Files scheduled for this root
    total_files: Arc<AtomicU64>,

    /// Files whose translation unit was fully walked
    completed_files: Arc<AtomicU64>,

    /// Files the front end could not parse
    failed_files: Arc<AtomicU64>,

    /// Files that stopped early or never started because of cancellation
    cancelled_files: Arc<AtomicU64>,

    /// Files currently being parsed or walked
    active_files: Arc<AtomicU64>,

    /// Accepted edges handed to the merger
    symbols_merged: Arc<AtomicU64>,

    /// Edges dropped by the location gate or the kind filter
    edges_rejected: Arc<AtomicU64>,

    start_time: Instant,
}

impl IndexingProgress {
    pub fn new() -> Self {
        Self {
            total_files: Arc::new(AtomicU64::new(0)),
            completed_files: Arc::new(AtomicU64::new(0)),
            failed_files: Arc::new(AtomicU64::new(0)),
            cancelled_files: Arc::new(AtomicU64::new(0)),
            active_files: Arc::new(AtomicU64::new(0)),
            symbols_merged: Arc::new(AtomicU64::new(0)),
            edges_rejected: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn set_total_files(&self, total: u64) {
        self.total_files.store(total, Ordering::Relaxed);
        debug!("Set total files to index: {}", total);
    }

    /// Mark a file as being processed
    pub fn start_file(&self) -> u64 {
        self.active_files.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn complete_file(&self) {
        self.finish_active();
        self.completed_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fail_file(&self, error_context: &str) {
        self.finish_active();
        self.failed_files.fetch_add(1, Ordering::Relaxed);
        debug!("Failed to index file: {}", error_context);
    }

    /// Mark a started file as cancelled mid-walk
    pub fn cancel_file(&self) {
        self.finish_active();
        self.cancelled_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a file as cancelled before it was started
    pub fn cancel_pending_file(&self) {
        self.cancelled_files.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merge(&self) {
        self.symbols_merged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.edges_rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn finish_active(&self) {
        let _ = self
            .active_files
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn get_snapshot(&self) -> ProgressSnapshot {
        let total = self.total_files.load(Ordering::Relaxed);
        let completed = self.completed_files.load(Ordering::Relaxed);
        let failed = self.failed_files.load(Ordering::Relaxed);
        let cancelled = self.cancelled_files.load(Ordering::Relaxed);

        let finished = completed + failed + cancelled;
        let progress_ratio = if total > 0 {
            finished as f64 / total as f64
        } else {
            1.0
        };

        ProgressSnapshot {
            total_files: total,
            completed_files: completed,
            failed_files: failed,
            cancelled_files: cancelled,
            active_files: self.active_files.load(Ordering::Relaxed),
            symbols_merged: self.symbols_merged.load(Ordering::Relaxed),
            edges_rejected: self.edges_rejected.load(Ordering::Relaxed),
            progress_ratio,
            elapsed_ms: self.start_time.elapsed().as_millis() as u64,
        }
    }

    /// Every scheduled file has reported an outcome
    pub fn is_complete(&self) -> bool {
        let total = self.total_files.load(Ordering::Relaxed);
        let finished = self.completed_files.load(Ordering::Relaxed)
            + self.failed_files.load(Ordering::Relaxed)
            + self.cancelled_files.load(Ordering::Relaxed);

        self.active_files.load(Ordering::Relaxed) == 0 && finished >= total
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for IndexingProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Lightweight progress snapshot for serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_files: u64,
    pub completed_files: u64,
    pub failed_files: u64,
    pub cancelled_files: u64,
    pub active_files: u64,
    pub symbols_merged: u64,
    pub edges_rejected: u64,
    pub progress_ratio: f64,
    pub elapsed_ms: u64,
}

impl ProgressSnapshot {
    pub fn finished_files(&self) -> u64 {
        self.completed_files + self.failed_files + self.cancelled_files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_basic_progress_tracking() {
        let progress = IndexingProgress::new();
        progress.set_total_files(3);
        assert!(!progress.is_complete());

        progress.start_file();
        assert_eq!(progress.get_snapshot().active_files, 1);
        progress.record_merge();
        progress.record_merge();
        progress.record_rejected();
        progress.complete_file();

        progress.start_file();
        progress.fail_file("broken.cpp");
        progress.cancel_pending_file();

        let snapshot = progress.get_snapshot();
        assert_eq!(snapshot.completed_files, 1);
        assert_eq!(snapshot.failed_files, 1);
        assert_eq!(snapshot.cancelled_files, 1);
        assert_eq!(snapshot.active_files, 0);
        assert_eq!(snapshot.symbols_merged, 2);
        assert_eq!(snapshot.edges_rejected, 1);
        assert_eq!(snapshot.finished_files(), 3);
        assert!((snapshot.progress_ratio - 1.0).abs() < f64::EPSILON);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_empty_root_is_complete() {
        let progress = IndexingProgress::new();
        assert!(progress.is_complete());
        assert!((progress.get_snapshot().progress_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_finish_without_start_does_not_underflow() {
        let progress = IndexingProgress::new();
        progress.cancel_file();
        let snapshot = progress.get_snapshot();
        assert_eq!(snapshot.active_files, 0);
        assert_eq!(snapshot.cancelled_files, 1);
    }

    #[test]
    fn test_concurrent_updates() {
        let progress = Arc::new(IndexingProgress::new());
        progress.set_total_files(800);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let progress = Arc::clone(&progress);
                thread::spawn(move || {
                    for _ in 0..100 {
                        progress.start_file();
                        progress.record_merge();
                        progress.complete_file();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = progress.get_snapshot();
        assert_eq!(snapshot.completed_files, 800);
        assert_eq!(snapshot.symbols_merged, 800);
        assert_eq!(snapshot.active_files, 0);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_active_files_counts_files_in_flight() {
        let progress = IndexingProgress::new();
        progress.set_total_files(3);

        assert_eq!(progress.start_file(), 1);
        assert_eq!(progress.start_file(), 2);
        assert_eq!(progress.start_file(), 3);
        assert_eq!(progress.get_snapshot().active_files, 3);

        progress.complete_file();
        progress.fail_file("b.cpp");
        assert_eq!(progress.get_snapshot().active_files, 1);

        progress.cancel_file();
        let snapshot = progress.get_snapshot();
        assert_eq!(snapshot.active_files, 0);
        assert_eq!(snapshot.finished_files(), 3);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("active_files").is_some());
        assert!(json.get("active_workers").is_none());
    }
}
