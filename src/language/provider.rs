//! Contract between the indexer and whatever front end produces the AST.
//!
//! The indexer only needs two primitives: turn a file into a translation unit,
//! and walk that unit reporting `(parent, child)` cursor pairs to a callback.
//! Everything else about the front end stays behind [`AstProvider`].

use crate::language::kind::AstKind;
use crate::models::{Location, Occurrence, SymbolInfo};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// One cursor in a translation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstNode {
    pub kind: AstKind,
    /// Plain name of the declaration, empty for anonymous entities.
    pub spelling: String,
    pub type_spelling: String,
    pub location: Location,
}

impl AstNode {
    pub fn new(
        kind: AstKind,
        spelling: impl Into<String>,
        type_spelling: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            type_spelling: type_spelling.into(),
            location,
        }
    }

    /// File-level cursor for `path`.
    pub fn translation_unit(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let spelling = path.to_string_lossy().into_owned();
        Self::new(
            AstKind::TranslationUnit,
            spelling,
            "",
            Location::file_start(path),
        )
    }

    pub fn file(&self) -> &Path {
        self.location.file()
    }

    /// Outline identity of this cursor, if its kind can be indexed.
    pub fn symbol_info(&self) -> Option<SymbolInfo> {
        self.kind.symbol_kind().map(|kind| {
            SymbolInfo::new(kind, self.type_spelling.clone(), self.spelling.clone())
        })
    }

    pub fn occurrence(&self) -> Option<Occurrence> {
        self.symbol_info()
            .map(|info| Occurrence::new(info, self.location.clone()))
    }
}

/// What the visitor wants the walk to do after seeing a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Descend into the child's own children.
    Continue,
    /// Move on to the next sibling without descending.
    SkipChildren,
    /// Stop the whole walk.
    Abort,
}

/// How a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitStatus {
    Completed,
    Aborted,
}

/// Failure to create a translation unit for a file.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not a C/C++ source or header: {path}")]
    UnsupportedFile { path: PathBuf },

    #[error("File {path} is {size} bytes, above the {limit} byte limit")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Failed to load grammar: {0}")]
    Grammar(String),

    #[error("Parser produced no tree for {path}")]
    ParseFailed { path: PathBuf },

    #[error("Front end unavailable: {0}")]
    Unavailable(String),
}

pub type Visitor<'a> = dyn FnMut(&AstNode, &AstNode) -> VisitResult + 'a;

/// A parsed file, ready to be walked.
pub trait TranslationUnit: Send {
    /// The file this unit was created from.
    fn main_file(&self) -> &Path;

    /// Walk every cursor in pre-order, calling `visitor(parent, child)`.
    fn visit(&self, visitor: &mut Visitor<'_>) -> VisitStatus;
}

/// Front end that turns files into translation units.
pub trait AstProvider: Send + Sync {
    fn parse(&self, path: &Path) -> Result<Box<dyn TranslationUnit>, ParseError>;
}
