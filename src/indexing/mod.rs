//! Concurrent symbol indexing of C/C++ projects.
//!
//! A [`RootIndexRegistry`] owns one index per open project. Each index parses
//! its files on a dedicated worker pool, filters the reported cursor pairs
//! through a [`KindFilter`](crate::language::KindFilter) and a location gate,
//! and merges the survivors into a per-root [`SymbolTree`].

pub mod controller;
pub mod events;
pub mod merger;
pub mod progress;
pub mod registry;
pub mod tree;
pub mod worker;

pub use controller::{CancellationToken, CompletionCounts, JobOutcome, RootState};
pub use events::{EventRecorder, IndexEvent, IndexObserver, NoopObserver};
pub use merger::{MergeOutcome, SymbolMerger};
pub use progress::{IndexingProgress, ProgressSnapshot};
pub use registry::{IndexError, RootId, RootIndexRegistry};
pub use tree::{SymbolNode, SymbolTree};
pub use worker::{ParseJob, ParseWorker};
