//! Per-root cancellation and completion bookkeeping.
//!
//! Every scheduled job reports exactly once through [`CompletionController::report`].
//! The report that brings the pending count to zero moves the root to
//! [`RootState::Drained`]; only then may the root's tree be detached.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cooperative cancellation flag, optionally chained to a parent token.
///
/// A child token reads as cancelled when either it or its parent was
/// cancelled, so one registry-wide token can stop every root at once while
/// each root can still be stopped on its own.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<AtomicBool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child_token(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::clone(&self.flag)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.load(Ordering::Relaxed))
    }

    /// Lower this token's own flag. A cancelled parent stays cancelled.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// How one parse job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobOutcome {
    /// The whole translation unit was walked.
    Completed,
    /// The provider could not produce a translation unit.
    Failed,
    /// Cancellation was observed before or during the walk.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RootState {
    Idle,
    Running,
    Cancelling,
    Drained,
}

impl fmt::Display for RootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RootState::Idle => "idle",
            RootState::Running => "running",
            RootState::Cancelling => "cancelling",
            RootState::Drained => "drained",
        };
        f.write_str(name)
    }
}

/// Per-outcome counters of a root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionCounts {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

#[derive(Debug)]
struct ControllerState {
    state: RootState,
    counts: CompletionCounts,
    /// Result carried by the one `finished` notification.
    result: Option<bool>,
    /// The `finished` notification has been delivered.
    notified: bool,
}

#[derive(Debug)]
pub struct CompletionController {
    inner: Mutex<ControllerState>,
    changed: Condvar,
}

impl CompletionController {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ControllerState {
                state: RootState::Idle,
                counts: CompletionCounts::default(),
                result: None,
                notified: false,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Idle -> Running with `total` jobs. An empty root drains immediately,
    /// in which case the finished result is returned.
    pub fn start(&self, total: usize) -> Option<bool> {
        let mut inner = self.lock();
        if inner.state != RootState::Idle {
            warn!("Ignoring start of a root in state {}", inner.state);
            return None;
        }

        inner.counts = CompletionCounts {
            total,
            pending: total,
            ..CompletionCounts::default()
        };
        if total == 0 {
            inner.state = RootState::Drained;
            inner.result = Some(true);
            self.changed.notify_all();
            return Some(true);
        }
        inner.state = RootState::Running;
        None
    }

    /// Record one job's outcome. Returns the finished result when this was the
    /// last pending job.
    pub fn report(&self, outcome: JobOutcome) -> Option<bool> {
        let mut inner = self.lock();
        if inner.counts.pending == 0 {
            warn!("Job reported {:?} after its root drained", outcome);
            return None;
        }

        inner.counts.pending -= 1;
        match outcome {
            JobOutcome::Completed => inner.counts.completed += 1,
            JobOutcome::Failed => inner.counts.failed += 1,
            JobOutcome::Cancelled => inner.counts.cancelled += 1,
        }

        if inner.counts.pending > 0 {
            return None;
        }

        let success = inner.state != RootState::Cancelling && inner.counts.cancelled == 0;
        inner.state = RootState::Drained;
        inner.result = Some(success);
        debug!("Root drained: {:?}", inner.counts);
        self.changed.notify_all();
        Some(success)
    }

    /// Mark the `finished` notification as delivered and wake waiters.
    pub fn mark_notified(&self) {
        let mut inner = self.lock();
        inner.notified = true;
        self.changed.notify_all();
    }

    /// Running -> Cancelling. Returns true if jobs were still pending.
    pub fn begin_cancel(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            RootState::Running => {
                inner.state = RootState::Cancelling;
                self.changed.notify_all();
                true
            }
            RootState::Cancelling => true,
            RootState::Idle | RootState::Drained => false,
        }
    }

    /// Block until the root drained and its `finished` notification went out,
    /// re-checking every `poll` and giving up after `timeout`.
    ///
    /// On timeout returns how long was waited.
    pub fn wait_settled(
        &self,
        poll: Duration,
        timeout: Duration,
    ) -> Result<Option<bool>, Duration> {
        let started = Instant::now();
        let mut inner = self.lock();

        loop {
            if inner.state == RootState::Drained && inner.notified {
                return Ok(inner.result);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(waited);
            }
            let slice = poll.min(timeout - waited);
            inner = self
                .changed
                .wait_timeout(inner, slice)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    pub fn state(&self) -> RootState {
        self.lock().state
    }

    pub fn counts(&self) -> CompletionCounts {
        self.lock().counts
    }

    /// Result of the finished notification, once the root drained.
    pub fn result(&self) -> Option<bool> {
        self.lock().result
    }
}

impl Default for CompletionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Reports a job's outcome exactly once, even if the job unwinds.
///
/// Dropping the guard without calling [`CompletionGuard::complete`] reports
/// [`JobOutcome::Failed`].
pub struct CompletionGuard<F: FnOnce(JobOutcome)> {
    report: Option<F>,
}

impl<F: FnOnce(JobOutcome)> CompletionGuard<F> {
    pub fn new(report: F) -> Self {
        Self {
            report: Some(report),
        }
    }

    pub fn complete(mut self, outcome: JobOutcome) {
        if let Some(report) = self.report.take() {
            report(outcome);
        }
    }
}

impl<F: FnOnce(JobOutcome)> Drop for CompletionGuard<F> {
    fn drop(&mut self) {
        if let Some(report) = self.report.take() {
            warn!("Parse job ended without reporting, counting it as failed");
            report(JobOutcome::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_token_chaining() {
        let registry = CancellationToken::new();
        let root_a = registry.child_token();
        let root_b = registry.child_token();

        root_a.cancel();
        assert!(root_a.is_cancelled());
        assert!(!root_b.is_cancelled());
        assert!(!registry.is_cancelled());

        root_a.reset();
        assert!(!root_a.is_cancelled());

        registry.cancel();
        assert!(root_a.is_cancelled());
        assert!(root_b.is_cancelled());
        root_b.reset();
        assert!(root_b.is_cancelled());
    }

    #[test]
    fn test_running_to_drained() {
        let controller = CompletionController::new();
        assert_eq!(controller.state(), RootState::Idle);
        assert_eq!(controller.start(3), None);
        assert_eq!(controller.state(), RootState::Running);

        assert_eq!(controller.report(JobOutcome::Completed), None);
        assert_eq!(controller.report(JobOutcome::Failed), None);
        assert_eq!(controller.report(JobOutcome::Completed), Some(true));
        assert_eq!(controller.state(), RootState::Drained);

        let counts = controller.counts();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.failed, 1);

        // Extra reports never push the count below zero or fire again.
        assert_eq!(controller.report(JobOutcome::Completed), None);
        assert_eq!(controller.counts().pending, 0);
    }

    #[test]
    fn test_empty_root_drains_on_start() {
        let controller = CompletionController::new();
        assert_eq!(controller.start(0), Some(true));
        assert_eq!(controller.state(), RootState::Drained);
        assert!(!controller.begin_cancel());
    }

    #[test]
    fn test_cancelled_root_finishes_unsuccessfully() {
        let controller = CompletionController::new();
        controller.start(2);
        assert!(controller.begin_cancel());
        assert_eq!(controller.state(), RootState::Cancelling);

        assert_eq!(controller.report(JobOutcome::Completed), None);
        assert_eq!(controller.report(JobOutcome::Cancelled), Some(false));
        assert_eq!(controller.result(), Some(false));
    }

    #[test]
    fn test_wait_settled_times_out_then_succeeds() {
        let controller = Arc::new(CompletionController::new());
        controller.start(1);

        let waited = controller
            .wait_settled(Duration::from_millis(5), Duration::from_millis(20))
            .unwrap_err();
        assert!(waited >= Duration::from_millis(20));

        let worker = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                controller.report(JobOutcome::Completed);
                controller.mark_notified();
            })
        };

        let result = controller.wait_settled(Duration::from_millis(5), Duration::from_secs(5));
        assert_eq!(result, Ok(Some(true)));
        worker.join().unwrap();
    }

    #[test]
    fn test_guard_reports_once() {
        let controller = CompletionController::new();
        controller.start(2);

        CompletionGuard::new(|outcome: JobOutcome| {
            controller.report(outcome);
        })
        .complete(JobOutcome::Completed);
        assert_eq!(controller.counts().pending, 1);

        {
            let _guard = CompletionGuard::new(|outcome: JobOutcome| {
                controller.report(outcome);
            });
        }
        let counts = controller.counts();
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn test_guard_reports_on_panic() {
        let controller = Arc::new(CompletionController::new());
        controller.start(1);

        let handle = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                let _guard = CompletionGuard::new(|outcome: JobOutcome| {
                    controller.report(outcome);
                });
                panic!("provider blew up");
            })
        };
        assert!(handle.join().is_err());
        assert_eq!(controller.state(), RootState::Drained);
        assert_eq!(controller.counts().failed, 1);
    }
}
