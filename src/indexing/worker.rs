//! One parse job: create a translation unit and feed its accepted edges to the
//! root's merger.

use crate::indexing::controller::{CancellationToken, JobOutcome};
use crate::indexing::events::IndexObserver;
use crate::indexing::merger::SymbolMerger;
use crate::indexing::progress::IndexingProgress;
use crate::indexing::registry::RootId;
use crate::language::kind::{AstKind, KindFilter};
use crate::language::provider::{AstNode, AstProvider, VisitResult, VisitStatus};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// A file to index plus the project's file set used by the location gate.
#[derive(Debug, Clone)]
pub struct ParseJob {
    pub file_path: PathBuf,
    pub sibling_files: Arc<HashSet<PathBuf>>,
}

impl ParseJob {
    pub fn new(file_path: impl Into<PathBuf>, sibling_files: Arc<HashSet<PathBuf>>) -> Self {
        Self {
            file_path: file_path.into(),
            sibling_files,
        }
    }
}

/// Everything a job of one root needs, shared by all of that root's jobs.
pub struct ParseWorker {
    pub(crate) root: RootId,
    pub(crate) provider: Arc<dyn AstProvider>,
    pub(crate) filter: Arc<KindFilter>,
    pub(crate) merger: Arc<SymbolMerger>,
    pub(crate) token: CancellationToken,
    pub(crate) progress: IndexingProgress,
    pub(crate) observer: Arc<dyn IndexObserver>,
}

impl ParseWorker {
    /// Run one job to completion, failure or cancellation.
    pub fn run(&self, job: &ParseJob) -> JobOutcome {
        if self.token.is_cancelled() {
            debug!("Skipping {} after cancellation", job.file_path.display());
            self.progress.cancel_pending_file();
            return JobOutcome::Cancelled;
        }

        self.progress.start_file();
        let unit = match self.provider.parse(&job.file_path) {
            Ok(unit) => unit,
            Err(e) => {
                warn!("Failed to create translation unit: {}", e);
                self.progress.fail_file(&job.file_path.to_string_lossy());
                return JobOutcome::Failed;
            }
        };

        let status = unit.visit(&mut |parent: &AstNode, child: &AstNode| {
            self.visit(job, parent, child)
        });

        if status == VisitStatus::Aborted || self.token.is_cancelled() {
            debug!("Cancelled while walking {}", job.file_path.display());
            self.progress.cancel_file();
            JobOutcome::Cancelled
        } else {
            debug!("Indexed {}", job.file_path.display());
            self.progress.complete_file();
            JobOutcome::Completed
        }
    }

    fn visit(&self, job: &ParseJob, parent: &AstNode, child: &AstNode) -> VisitResult {
        if self.token.is_cancelled() {
            return VisitResult::Abort;
        }

        if !self.filter.accepts(parent.kind, child.kind)
            || !job.sibling_files.contains(parent.file())
        {
            self.progress.record_rejected();
            return VisitResult::Continue;
        }

        let Some(child_occurrence) = child.occurrence() else {
            return VisitResult::Continue;
        };
        let parent_occurrence = if parent.kind == AstKind::TranslationUnit {
            None
        } else {
            match parent.occurrence() {
                Some(occurrence) => Some(occurrence),
                None => return VisitResult::Continue,
            }
        };

        let outcome = self
            .merger
            .merge(parent_occurrence.as_ref(), &child_occurrence);
        self.progress.record_merge();
        if !outcome.is_noop() {
            self.observer.symbol_merged(
                self.root,
                parent_occurrence.as_ref().map(|occurrence| &occurrence.info),
                &child_occurrence,
            );
        }

        VisitResult::Continue
    }
}
