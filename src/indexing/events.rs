//! Notifications a registry sends to whoever displays the outline.

use crate::indexing::registry::RootId;
use crate::models::{Occurrence, SymbolInfo};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// Receiver of root lifecycle and tree mutation notifications.
///
/// Callbacks run on registry and worker threads. They must not block for long
/// and must not call back into the registry for the same root.
pub trait IndexObserver: Send + Sync {
    /// A root began indexing `total_files` files.
    fn started(&self, _root: RootId, _total_files: usize) {}

    /// A root's last job reported. Fires exactly once per root.
    fn finished(&self, _root: RootId, _success: bool) {}

    /// An accepted edge changed the tree.
    fn symbol_merged(&self, _root: RootId, _parent: Option<&SymbolInfo>, _child: &Occurrence) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl IndexObserver for NoopObserver {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IndexEvent {
    Started {
        root: RootId,
        total_files: usize,
    },
    Finished {
        root: RootId,
        success: bool,
    },
    SymbolMerged {
        root: RootId,
        parent: Option<SymbolInfo>,
        child: Occurrence,
    },
}

impl IndexEvent {
    pub fn root(&self) -> RootId {
        match self {
            IndexEvent::Started { root, .. }
            | IndexEvent::Finished { root, .. }
            | IndexEvent::SymbolMerged { root, .. } => *root,
        }
    }
}

/// Observer that keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<IndexEvent>>,
    record_merges: bool,
}

impl EventRecorder {
    /// Record lifecycle events only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record lifecycle events and every tree mutation.
    pub fn with_merges() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            record_merges: true,
        }
    }

    fn push(&self, event: IndexEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<IndexEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_for(&self, root: RootId) -> Vec<IndexEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.root() == root)
            .collect()
    }

    /// Every `finished` result delivered for `root`, in order.
    pub fn finished_results(&self, root: RootId) -> Vec<bool> {
        self.events_for(root)
            .into_iter()
            .filter_map(|event| match event {
                IndexEvent::Finished { success, .. } => Some(success),
                _ => None,
            })
            .collect()
    }
}

impl IndexObserver for EventRecorder {
    fn started(&self, root: RootId, total_files: usize) {
        self.push(IndexEvent::Started { root, total_files });
    }

    fn finished(&self, root: RootId, success: bool) {
        self.push(IndexEvent::Finished { root, success });
    }

    fn symbol_merged(&self, root: RootId, parent: Option<&SymbolInfo>, child: &Occurrence) {
        if self.record_merges {
            self.push(IndexEvent::SymbolMerged {
                root,
                parent: parent.cloned(),
                child: child.clone(),
            });
        }
    }
}
