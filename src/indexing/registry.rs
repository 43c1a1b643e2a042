//! Root index registry: one symbol tree, worker pool, lock and cancellation
//! token per open project.

use crate::config::IndexConfig;
use crate::indexing::controller::{
    CancellationToken, CompletionController, CompletionCounts, CompletionGuard, JobOutcome,
    RootState,
};
use crate::indexing::events::{IndexObserver, NoopObserver};
use crate::indexing::merger::SymbolMerger;
use crate::indexing::progress::{IndexingProgress, ProgressSnapshot};
use crate::indexing::tree::SymbolTree;
use crate::indexing::worker::{ParseJob, ParseWorker};
use crate::language::kind::KindFilter;
use crate::language::provider::AstProvider;
use crate::models::ProjectDescriptor;
use crate::utils::paths::normalize_path;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Non-owning handle to a root held by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RootId(u64);

impl RootId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root-{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Unknown root: {0}")]
    UnknownRoot(RootId),

    #[error("Root {root} did not drain within {waited:?}")]
    DrainTimeout { root: RootId, waited: Duration },

    #[error("Registry is shutting down")]
    ShuttingDown,

    #[error("Failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}

struct RootIndex {
    id: RootId,
    workspace_root: PathBuf,
    merger: Arc<SymbolMerger>,
    controller: CompletionController,
    token: CancellationToken,
    progress: IndexingProgress,
    /// Released by the last job to report, or on removal.
    pool: Mutex<Option<rayon::ThreadPool>>,
}

impl RootIndex {
    fn release_pool(&self) {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if pool.is_some() {
            debug!("Released worker pool of {}", self.id);
        }
    }
}

/// Maps project roots to their indexes.
///
/// Each root indexes its files on its own rayon pool. Population of the tree
/// is asynchronous: [`RootIndexRegistry::create_root`] returns as soon as the
/// jobs are scheduled.
pub struct RootIndexRegistry {
    config: IndexConfig,
    provider: Arc<dyn AstProvider>,
    filter: Arc<KindFilter>,
    observer: Arc<dyn IndexObserver>,
    roots: DashMap<RootId, Arc<RootIndex>>,
    next_id: AtomicU64,
    shutdown_token: CancellationToken,
    shutting_down: AtomicBool,
}

impl RootIndexRegistry {
    pub fn new(config: IndexConfig, provider: Arc<dyn AstProvider>) -> Self {
        Self {
            config,
            provider,
            filter: Arc::new(KindFilter::default()),
            observer: Arc::new(NoopObserver),
            roots: DashMap::new(),
            next_id: AtomicU64::new(1),
            shutdown_token: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IndexObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_filter(mut self, filter: KindFilter) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Register a project and start indexing its files in the background.
    ///
    /// Duplicate files are indexed once. A project without files is a valid,
    /// empty root that finishes immediately.
    pub fn create_root(&self, descriptor: ProjectDescriptor) -> Result<RootId, IndexError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(IndexError::ShuttingDown);
        }

        let id = RootId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let workspace_root = normalize_path(&descriptor.workspace_root);

        let mut seen = HashSet::new();
        let files: Vec<PathBuf> = descriptor
            .files
            .iter()
            .map(|file| normalize_path(&workspace_root.join(file)))
            .filter(|file| seen.insert(file.clone()))
            .collect();
        let sibling_files = Arc::new(seen);

        let root = Arc::new(RootIndex {
            id,
            workspace_root: workspace_root.clone(),
            merger: Arc::new(SymbolMerger::new(descriptor.root_name())),
            controller: CompletionController::new(),
            token: self.shutdown_token.child_token(),
            progress: IndexingProgress::new(),
            pool: Mutex::new(None),
        });
        root.progress.set_total_files(files.len() as u64);

        // No events are emitted for a root that could not get its workers.
        let threads = self.config.effective_workers().min(files.len()).max(1);
        let pool = if files.is_empty() {
            None
        } else {
            Some(self.build_pool(id, threads)?)
        };

        info!(
            "Indexing {} files for {} ({})",
            files.len(),
            workspace_root.display(),
            id
        );
        self.observer.started(id, files.len());

        let Some(pool) = pool else {
            if let Some(success) = root.controller.start(0) {
                self.observer.finished(id, success);
            }
            root.controller.mark_notified();
            self.roots.insert(id, root);
            return Ok(id);
        };

        root.controller.start(files.len());
        self.roots.insert(id, Arc::clone(&root));

        let worker = Arc::new(ParseWorker {
            root: id,
            provider: Arc::clone(&self.provider),
            filter: Arc::clone(&self.filter),
            merger: Arc::clone(&root.merger),
            token: root.token.clone(),
            progress: root.progress.clone(),
            observer: Arc::clone(&self.observer),
        });

        let mut slot = root.pool.lock().unwrap_or_else(PoisonError::into_inner);
        let pool = slot.insert(pool);
        for file in files {
            let job = ParseJob::new(file, Arc::clone(&sibling_files));
            let worker = Arc::clone(&worker);
            let root = Arc::clone(&root);
            let observer = Arc::clone(&self.observer);

            pool.spawn(move || {
                let guard = CompletionGuard::new(|outcome: JobOutcome| {
                    report(&root, observer.as_ref(), outcome)
                });
                let outcome = worker.run(&job);
                guard.complete(outcome);
            });
        }
        debug!(
            "Scheduled {} jobs on {} threads for {}",
            sibling_files.len(),
            threads,
            id
        );

        Ok(id)
    }

    fn build_pool(&self, id: RootId, threads: usize) -> Result<rayon::ThreadPool, IndexError> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |index| format!("cxx-index-{}-{}", id.as_u64(), index))
            .panic_handler(move |_| error!("A parse job of {} panicked", id));
        if self.config.worker_stack_size_bytes > 0 {
            builder = builder.stack_size(self.config.worker_stack_size_bytes);
        }
        builder.build().map_err(|e| {
            error!("Could not start workers for {}: {}", id, e);
            IndexError::from(e)
        })
    }

    /// Cancel a root, wait for it to drain, then drop it from the registry.
    ///
    /// Returns the detached tree. If the root does not drain within the
    /// configured timeout it stays registered and [`IndexError::DrainTimeout`]
    /// is returned.
    pub fn remove_root(&self, id: RootId) -> Result<SymbolTree, IndexError> {
        let root = self.root(id)?;

        root.token.cancel();
        if root.controller.begin_cancel() {
            debug!("Cancelling {} with jobs still pending", id);
        }

        if let Err(waited) = root
            .controller
            .wait_settled(self.config.drain_poll_interval(), self.config.drain_timeout())
        {
            error!("{} did not drain within {:?}", id, waited);
            return Err(IndexError::DrainTimeout { root: id, waited });
        }

        self.roots.remove(&id);
        root.release_pool();
        root.token.reset();
        let tree = root.merger.detach();
        info!(
            "Removed {} ({}), {} symbols",
            id,
            root.workspace_root.display(),
            tree.node_count()
        );
        Ok(tree)
    }

    /// Raise a root's cancellation flag without removing it.
    pub fn cancel(&self, id: RootId) -> Result<(), IndexError> {
        let root = self.root(id)?;
        root.token.cancel();
        root.controller.begin_cancel();
        Ok(())
    }

    /// Block until a root finished or `timeout` elapsed.
    ///
    /// Returns the finished result, or `None` on timeout.
    pub fn wait_until_finished(
        &self,
        id: RootId,
        timeout: Duration,
    ) -> Result<Option<bool>, IndexError> {
        let root = self.root(id)?;
        Ok(root
            .controller
            .wait_settled(self.config.drain_poll_interval(), timeout)
            .unwrap_or(None))
    }

    /// Copy of a root's tree as it is right now.
    pub fn snapshot(&self, id: RootId) -> Result<SymbolTree, IndexError> {
        Ok(self.root(id)?.merger.snapshot())
    }

    /// Read access to a root's live tree.
    pub fn with_tree<R>(
        &self,
        id: RootId,
        f: impl FnOnce(&SymbolTree) -> R,
    ) -> Result<R, IndexError> {
        Ok(self.root(id)?.merger.with_tree(f))
    }

    pub fn state(&self, id: RootId) -> Result<RootState, IndexError> {
        Ok(self.root(id)?.controller.state())
    }

    pub fn counts(&self, id: RootId) -> Result<CompletionCounts, IndexError> {
        Ok(self.root(id)?.controller.counts())
    }

    pub fn progress(&self, id: RootId) -> Result<ProgressSnapshot, IndexError> {
        Ok(self.root(id)?.progress.get_snapshot())
    }

    pub fn roots(&self) -> Vec<RootId> {
        let mut ids: Vec<RootId> = self.roots.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Cancel every root and drain each of them. Further `create_root` calls
    /// fail with [`IndexError::ShuttingDown`].
    ///
    /// Every root is attempted; the first drain failure is returned.
    pub fn shutdown(&self) -> Result<(), IndexError> {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.shutdown_token.cancel();

        let mut first_error = None;
        for id in self.roots() {
            match self.remove_root(id) {
                Ok(_) => {}
                Err(IndexError::UnknownRoot(_)) => {}
                Err(e) => {
                    warn!("Shutdown could not drain {}: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn root(&self, id: RootId) -> Result<Arc<RootIndex>, IndexError> {
        self.roots
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(IndexError::UnknownRoot(id))
    }
}

impl Drop for RootIndexRegistry {
    fn drop(&mut self) {
        if self.roots.is_empty() {
            return;
        }
        if let Err(e) = self.shutdown() {
            error!("Index registry dropped with undrained roots: {}", e);
        }
    }
}

fn report(root: &RootIndex, observer: &dyn IndexObserver, outcome: JobOutcome) {
    if let Some(success) = root.controller.report(outcome) {
        root.release_pool();
        info!(
            "Finished indexing {} (success: {}, {:?})",
            root.id,
            success,
            root.controller.counts()
        );
        observer.finished(root.id, success);
        root.controller.mark_notified();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::events::EventRecorder;
    use crate::language::provider::{ParseError, TranslationUnit};
    use std::path::Path;

    struct EmptyProvider;

    impl AstProvider for EmptyProvider {
        fn parse(&self, path: &Path) -> Result<Box<dyn TranslationUnit>, ParseError> {
            Err(ParseError::Unavailable(format!("no front end for {}", path.display())))
        }
    }

    fn registry() -> (RootIndexRegistry, Arc<EventRecorder>) {
        let recorder = Arc::new(EventRecorder::new());
        let registry = RootIndexRegistry::new(IndexConfig::default(), Arc::new(EmptyProvider))
            .with_observer(recorder.clone());
        (registry, recorder)
    }

    #[test]
    fn test_root_ids_are_unique_and_displayable() {
        let (registry, _) = registry();
        let a = registry
            .create_root(ProjectDescriptor::new("/w/a", Vec::new()))
            .unwrap();
        let b = registry
            .create_root(ProjectDescriptor::new("/w/b", Vec::new()))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.roots(), vec![a, b]);
        assert_eq!(RootId::new(3).to_string(), "root-3");
    }

    #[test]
    fn test_every_failed_job_still_reports() {
        let (registry, recorder) = registry();
        let files = (0..20).map(|i| PathBuf::from(format!("f{}.cpp", i))).collect();
        let id = registry
            .create_root(ProjectDescriptor::new("/w/proj", files))
            .unwrap();

        assert_eq!(
            registry.wait_until_finished(id, Duration::from_secs(10)).unwrap(),
            Some(true)
        );
        let counts = registry.counts(id).unwrap();
        assert_eq!(counts.total, 20);
        assert_eq!(counts.failed, 20);
        assert_eq!(counts.pending, 0);
        assert_eq!(recorder.finished_results(id), vec![true]);
        assert_eq!(registry.snapshot(id).unwrap().name, "proj");
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_pool_failure_emits_no_events() {
        let recorder = Arc::new(EventRecorder::new());
        let config = IndexConfig {
            max_workers: 1,
            // Far beyond any address space, so the worker thread cannot start.
            worker_stack_size_bytes: 1 << 60,
            ..IndexConfig::default()
        };
        let registry = RootIndexRegistry::new(config, Arc::new(EmptyProvider))
            .with_observer(recorder.clone());

        let result = registry.create_root(ProjectDescriptor::new(
            "/w/proj",
            vec![PathBuf::from("a.cpp")],
        ));
        assert!(matches!(result, Err(IndexError::PoolBuild(_))));
        assert!(recorder.events().is_empty());
        assert!(registry.roots().is_empty());

        // An empty project needs no workers and still starts and finishes.
        let id = registry
            .create_root(ProjectDescriptor::new("/w/empty", Vec::new()))
            .unwrap();
        assert_eq!(recorder.finished_results(id), vec![true]);
    }

    #[test]
    fn test_duplicate_files_are_scheduled_once() {
        let (registry, _) = registry();
        let files = vec![
            PathBuf::from("a.cpp"),
            PathBuf::from("./a.cpp"),
            PathBuf::from("/w/proj/a.cpp"),
        ];
        let id = registry
            .create_root(ProjectDescriptor::new("/w/proj", files))
            .unwrap();
        registry.wait_until_finished(id, Duration::from_secs(10)).unwrap();
        assert_eq!(registry.counts(id).unwrap().total, 1);
    }

    #[test]
    fn test_unknown_root() {
        let (registry, _) = registry();
        let missing = RootId::new(99);
        assert!(matches!(
            registry.remove_root(missing),
            Err(IndexError::UnknownRoot(id)) if id == missing
        ));
        assert!(registry.state(missing).is_err());
    }

    #[test]
    fn test_shutdown_rejects_new_roots() {
        let (registry, _) = registry();
        registry
            .create_root(ProjectDescriptor::new("/w/a", Vec::new()))
            .unwrap();
        registry.shutdown().unwrap();

        assert!(registry.roots().is_empty());
        assert!(registry.is_shutting_down());
        assert!(matches!(
            registry.create_root(ProjectDescriptor::new("/w/b", Vec::new())),
            Err(IndexError::ShuttingDown)
        ));
    }
}
