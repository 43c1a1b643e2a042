use crate::models::SymbolKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Cursor kinds an AST provider can report.
///
/// This is wider than [`SymbolKind`]: providers report everything they see
/// and the [`KindFilter`] decides what reaches the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AstKind {
    TranslationUnit,
    Namespace,
    ClassDecl,
    StructDecl,
    UnionDecl,
    EnumDecl,
    TypedefDecl,
    FunctionDecl,
    CXXMethod,
    Constructor,
    Destructor,
    FieldDecl,
    VarDecl,
    CompoundStmt,
}

impl AstKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AstKind::TranslationUnit => "TranslationUnit",
            AstKind::Namespace => "Namespace",
            AstKind::ClassDecl => "ClassDecl",
            AstKind::StructDecl => "StructDecl",
            AstKind::UnionDecl => "UnionDecl",
            AstKind::EnumDecl => "EnumDecl",
            AstKind::TypedefDecl => "TypedefDecl",
            AstKind::FunctionDecl => "FunctionDecl",
            AstKind::CXXMethod => "CXXMethod",
            AstKind::Constructor => "Constructor",
            AstKind::Destructor => "Destructor",
            AstKind::FieldDecl => "FieldDecl",
            AstKind::VarDecl => "VarDecl",
            AstKind::CompoundStmt => "CompoundStmt",
        }
    }

    /// The outline kind for this cursor, if it can be indexed at all.
    pub fn symbol_kind(&self) -> Option<SymbolKind> {
        match self {
            AstKind::Namespace => Some(SymbolKind::Namespace),
            AstKind::ClassDecl => Some(SymbolKind::ClassDecl),
            AstKind::StructDecl => Some(SymbolKind::StructDecl),
            AstKind::UnionDecl => Some(SymbolKind::UnionDecl),
            AstKind::TypedefDecl => Some(SymbolKind::TypedefDecl),
            AstKind::FunctionDecl => Some(SymbolKind::FunctionDecl),
            AstKind::CXXMethod => Some(SymbolKind::CXXMethod),
            AstKind::FieldDecl => Some(SymbolKind::FieldDecl),
            _ => None,
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(
            self,
            AstKind::ClassDecl | AstKind::StructDecl | AstKind::UnionDecl
        )
    }
}

impl fmt::Display for AstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which `(parent, child)` cursor pairs are recorded in the outline.
///
/// An edge missing from the table is ignored at that level; the walk still
/// descends into the child so deeper edges can match.
#[derive(Debug, Clone)]
pub struct KindFilter {
    transitions: HashMap<AstKind, HashSet<AstKind>>,
}

impl KindFilter {
    /// A filter that accepts nothing.
    pub fn empty() -> Self {
        Self {
            transitions: HashMap::new(),
        }
    }

    /// Allow `child` cursors directly beneath `parent` cursors.
    ///
    /// Only kinds with an outline representation are accepted on either side
    /// (the translation unit is allowed as a parent and stands for the root).
    pub fn allow(mut self, parent: AstKind, children: &[AstKind]) -> Self {
        if parent != AstKind::TranslationUnit && parent.symbol_kind().is_none() {
            return self;
        }
        let entry = self.transitions.entry(parent).or_default();
        entry.extend(
            children
                .iter()
                .copied()
                .filter(|child| child.symbol_kind().is_some()),
        );
        self
    }

    pub fn accepts(&self, parent: AstKind, child: AstKind) -> bool {
        self.transitions
            .get(&parent)
            .is_some_and(|children| children.contains(&child))
    }

    pub fn is_indexed_parent(&self, parent: AstKind) -> bool {
        self.transitions.contains_key(&parent)
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        use AstKind::*;

        KindFilter::empty()
            .allow(
                TranslationUnit,
                &[StructDecl, ClassDecl, UnionDecl, TypedefDecl, FunctionDecl],
            )
            .allow(StructDecl, &[StructDecl, FieldDecl])
            .allow(UnionDecl, &[FieldDecl])
            .allow(
                ClassDecl,
                &[
                    ClassDecl,
                    UnionDecl,
                    StructDecl,
                    TypedefDecl,
                    FieldDecl,
                    CXXMethod,
                ],
            )
            .allow(
                Namespace,
                &[
                    Namespace,
                    ClassDecl,
                    UnionDecl,
                    StructDecl,
                    TypedefDecl,
                    FieldDecl,
                    CXXMethod,
                ],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_edges() {
        let filter = KindFilter::default();

        assert!(filter.accepts(AstKind::TranslationUnit, AstKind::ClassDecl));
        assert!(filter.accepts(AstKind::TranslationUnit, AstKind::FunctionDecl));
        assert!(filter.accepts(AstKind::ClassDecl, AstKind::CXXMethod));
        assert!(filter.accepts(AstKind::ClassDecl, AstKind::FieldDecl));
        assert!(filter.accepts(AstKind::Namespace, AstKind::Namespace));
        assert!(filter.accepts(AstKind::UnionDecl, AstKind::FieldDecl));
    }

    #[test]
    fn test_unlisted_edges_are_rejected() {
        let filter = KindFilter::default();

        assert!(!filter.accepts(AstKind::TranslationUnit, AstKind::VarDecl));
        assert!(!filter.accepts(AstKind::TranslationUnit, AstKind::CXXMethod));
        assert!(!filter.accepts(AstKind::TranslationUnit, AstKind::Namespace));
        assert!(!filter.accepts(AstKind::StructDecl, AstKind::CXXMethod));
        assert!(!filter.accepts(AstKind::FunctionDecl, AstKind::StructDecl));
        assert!(!filter.accepts(AstKind::ClassDecl, AstKind::Constructor));
        assert!(!filter.is_indexed_parent(AstKind::CompoundStmt));
    }

    #[test]
    fn test_allow_drops_kinds_without_outline_form() {
        let filter = KindFilter::empty()
            .allow(AstKind::ClassDecl, &[AstKind::VarDecl, AstKind::Constructor])
            .allow(AstKind::CompoundStmt, &[AstKind::ClassDecl]);

        assert!(!filter.accepts(AstKind::ClassDecl, AstKind::VarDecl));
        assert!(!filter.accepts(AstKind::ClassDecl, AstKind::Constructor));
        assert!(!filter.is_indexed_parent(AstKind::CompoundStmt));
    }

    #[test]
    fn test_symbol_kind_mapping() {
        assert_eq!(AstKind::CXXMethod.symbol_kind(), Some(SymbolKind::CXXMethod));
        assert_eq!(AstKind::VarDecl.symbol_kind(), None);
        assert_eq!(AstKind::TranslationUnit.symbol_kind(), None);
        assert!(AstKind::UnionDecl.is_record());
        assert!(!AstKind::Namespace.is_record());
    }
}
