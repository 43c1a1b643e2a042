//! The per-root symbol outline.
//!
//! A [`SymbolTree`] is the synthetic root of one project. It owns its
//! top-level [`SymbolNode`]s, which own their children in turn. Nodes are plain
//! data: presentation (label, tooltip) is derived from the current state on
//! demand.

use crate::models::{Location, SymbolInfo};
use serde::{Deserialize, Serialize};

/// Index path from the tree root to a node.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub info: SymbolInfo,
    /// Every distinct place the symbol was seen, in arrival order.
    pub locations: Vec<Location>,
    /// Children ordered by uppercased display name.
    pub children: Vec<SymbolNode>,
    /// Created as a placeholder parent before its own parent was known.
    #[serde(skip)]
    pub(crate) provisional: bool,
}

impl SymbolNode {
    pub fn new(info: SymbolInfo, location: Location) -> Self {
        Self {
            info,
            locations: vec![location],
            children: Vec::new(),
            provisional: false,
        }
    }

    pub fn label(&self) -> String {
        self.info.label()
    }

    pub fn tooltip(&self) -> String {
        format!(
            "Kind: {}\nType: {}\nValue: {}\nLocation Count: {}",
            self.info.kind,
            self.info.type_spelling,
            self.info.display_name,
            self.locations.len()
        )
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional
    }

    /// Record another location. Returns false if it was already known.
    pub fn add_location(&mut self, location: &Location) -> bool {
        if self.locations.contains(location) {
            return false;
        }
        self.locations.push(location.clone());
        true
    }

    pub fn has_location(&self, location: &Location) -> bool {
        self.locations.contains(location)
    }

    /// Position of the direct child with identity `info`.
    pub fn child_position(&self, info: &SymbolInfo) -> Option<usize> {
        self.children.iter().position(|child| &child.info == info)
    }

    pub fn child(&self, info: &SymbolInfo) -> Option<&SymbolNode> {
        self.children.iter().find(|child| &child.info == info)
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SymbolNode::subtree_size)
            .sum::<usize>()
    }
}

/// Insert `node` among `siblings`, after every sibling whose key is not
/// greater. Returns the index it landed at.
pub(crate) fn insert_sorted(siblings: &mut Vec<SymbolNode>, node: SymbolNode) -> usize {
    let key = node.info.sort_key();
    let index = siblings.partition_point(|sibling| sibling.info.sort_key() <= key);
    siblings.insert(index, node);
    index
}

/// Synthetic root of one project's outline, named after the workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolTree {
    pub name: String,
    pub children: Vec<SymbolNode>,
}

impl SymbolTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of symbol nodes below the root.
    pub fn node_count(&self) -> usize {
        self.children.iter().map(SymbolNode::subtree_size).sum()
    }

    /// Pre-order search of the whole tree for the first node with identity `info`.
    pub fn find_path(&self, info: &SymbolInfo) -> Option<NodePath> {
        fn search(nodes: &[SymbolNode], info: &SymbolInfo, path: &mut NodePath) -> bool {
            for (index, node) in nodes.iter().enumerate() {
                path.push(index);
                if &node.info == info || search(&node.children, info, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = Vec::new();
        search(&self.children, info, &mut path).then_some(path)
    }

    pub fn find(&self, info: &SymbolInfo) -> Option<&SymbolNode> {
        self.find_path(info).and_then(|path| self.node(&path))
    }

    pub fn node(&self, path: &[usize]) -> Option<&SymbolNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get(*first)?;
        for index in rest {
            node = node.children.get(*index)?;
        }
        Some(node)
    }

    pub fn node_mut(&mut self, path: &[usize]) -> Option<&mut SymbolNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get_mut(*first)?;
        for index in rest {
            node = node.children.get_mut(*index)?;
        }
        Some(node)
    }

    /// Every node with identity `info`, wherever it sits.
    pub fn find_all(&self, info: &SymbolInfo) -> Vec<&SymbolNode> {
        let mut found = Vec::new();
        self.for_each(|_, node| {
            if &node.info == info {
                found.push(node);
            }
        });
        found
    }

    /// Visit every node in pre-order with its depth (top level is 0).
    pub fn for_each<'a, F>(&'a self, mut f: F)
    where
        F: FnMut(usize, &'a SymbolNode),
    {
        fn walk<'a, F>(nodes: &'a [SymbolNode], depth: usize, f: &mut F)
        where
            F: FnMut(usize, &'a SymbolNode),
        {
            for node in nodes {
                f(depth, node);
                walk(&node.children, depth + 1, f);
            }
        }

        walk(&self.children, 0, &mut f);
    }

    /// Top-level position of a provisional node with identity `info` that is
    /// not an ancestor of the node at `parent_path`.
    ///
    /// Provisional nodes only ever live at the top level, so the first path
    /// element is the only ancestor that can match. When sources disagree on
    /// nesting (`A { B }` in one file, `B { A }` in another) the cycle is cut
    /// by adding a second node, and which of the two ends up on top depends
    /// on the order the edges arrive in. The set of identities is the same
    /// either way.
    pub(crate) fn provisional_position(
        &self,
        info: &SymbolInfo,
        parent_path: &[usize],
    ) -> Option<usize> {
        self.children
            .iter()
            .enumerate()
            .find(|(index, node)| {
                node.provisional && &node.info == info && parent_path.first() != Some(index)
            })
            .map(|(index, _)| index)
    }
}
