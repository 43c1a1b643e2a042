//! Thread-safe find-or-create merging of accepted edges into one root's tree.
//!
//! Each root owns one [`SymbolMerger`] and therefore one lock. Lookups that
//! would change nothing are answered under the read lock; anything else is
//! redone from scratch under the write lock so that a concurrent insert of the
//! same symbol between the two phases cannot produce a duplicate node.

use crate::indexing::tree::{insert_sorted, NodePath, SymbolNode, SymbolTree};
use crate::models::Occurrence;
use std::sync::{PoisonError, RwLock};
use tracing::trace;

/// What a single merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub parent_created: bool,
    pub child_created: bool,
    /// A provisional top-level node was moved under its real parent.
    pub child_reparented: bool,
    pub locations_added: usize,
}

impl MergeOutcome {
    pub fn is_noop(&self) -> bool {
        *self == MergeOutcome::default()
    }
}

pub struct SymbolMerger {
    tree: RwLock<SymbolTree>,
}

impl SymbolMerger {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            tree: RwLock::new(SymbolTree::new(root_name)),
        }
    }

    /// Merge one accepted `(parent, child)` edge.
    ///
    /// `parent` is `None` when the parent cursor is a translation unit, in which
    /// case the child lands directly under the root.
    pub fn merge(&self, parent: Option<&Occurrence>, child: &Occurrence) -> MergeOutcome {
        {
            let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
            if is_already_merged(&tree, parent, child) {
                return MergeOutcome::default();
            }
        }

        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let outcome = match parent {
            None => merge_top_level(&mut tree, child),
            Some(parent) => merge_edge(&mut tree, parent, child),
        };
        trace!(
            "Merged {} into {}: {:?}",
            child.info.label(),
            tree.name,
            outcome
        );
        outcome
    }

    /// Read access to the live tree.
    pub fn with_tree<R>(&self, f: impl FnOnce(&SymbolTree) -> R) -> R {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        f(&tree)
    }

    pub fn snapshot(&self) -> SymbolTree {
        self.with_tree(SymbolTree::clone)
    }

    pub fn node_count(&self) -> usize {
        self.with_tree(SymbolTree::node_count)
    }

    /// Take the tree out, leaving an empty one with the same name behind.
    pub fn detach(&self) -> SymbolTree {
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let name = tree.name.clone();
        std::mem::replace(&mut *tree, SymbolTree::new(name))
    }
}

fn is_already_merged(tree: &SymbolTree, parent: Option<&Occurrence>, child: &Occurrence) -> bool {
    match parent {
        None => tree
            .children
            .iter()
            .find(|node| node.info == child.info)
            .is_some_and(|node| !node.provisional && node.has_location(&child.location)),
        Some(parent) => tree
            .find_path(&parent.info)
            .and_then(|path| tree.node(&path))
            .filter(|node| node.has_location(&parent.location))
            .and_then(|node| node.child(&child.info))
            .is_some_and(|node| node.has_location(&child.location)),
    }
}

fn merge_top_level(tree: &mut SymbolTree, child: &Occurrence) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    match tree.children.iter_mut().find(|node| node.info == child.info) {
        Some(node) => {
            // A translation-unit edge is the real placement of this symbol.
            node.provisional = false;
            if node.add_location(&child.location) {
                outcome.locations_added += 1;
            }
        }
        None => {
            insert_sorted(
                &mut tree.children,
                SymbolNode::new(child.info.clone(), child.location.clone()),
            );
            outcome.child_created = true;
        }
    }

    outcome
}

fn merge_edge(tree: &mut SymbolTree, parent: &Occurrence, child: &Occurrence) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    let mut parent_path: NodePath = match tree.find_path(&parent.info) {
        Some(path) => {
            if let Some(node) = tree.node_mut(&path) {
                if node.add_location(&parent.location) {
                    outcome.locations_added += 1;
                }
            }
            path
        }
        None => {
            let mut node = SymbolNode::new(parent.info.clone(), parent.location.clone());
            node.provisional = true;
            outcome.parent_created = true;
            vec![insert_sorted(&mut tree.children, node)]
        }
    };

    let existing = tree
        .node(&parent_path)
        .and_then(|node| node.child_position(&child.info));
    if let Some(index) = existing {
        let mut child_path = parent_path;
        child_path.push(index);
        if let Some(node) = tree.node_mut(&child_path) {
            if node.add_location(&child.location) {
                outcome.locations_added += 1;
            }
        }
        return outcome;
    }

    let child_node = match tree.provisional_position(&child.info, &parent_path) {
        Some(index) => {
            let mut node = tree.children.remove(index);
            if index < parent_path[0] {
                parent_path[0] -= 1;
            }
            node.provisional = false;
            if node.add_location(&child.location) {
                outcome.locations_added += 1;
            }
            outcome.child_reparented = true;
            node
        }
        None => {
            outcome.child_created = true;
            SymbolNode::new(child.info.clone(), child.location.clone())
        }
    };

    if let Some(parent_node) = tree.node_mut(&parent_path) {
        insert_sorted(&mut parent_node.children, child_node);
    }
    outcome
}
