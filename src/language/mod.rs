// Language module - the C/C++ front end: file classification, cursor kinds,
// the provider contract and its tree-sitter implementation.

pub mod classify;
pub mod kind;
pub mod parser_pool;
pub mod provider;
pub mod tree_sitter_provider;

pub use classify::{classify, is_cxx_file, Dialect, FileClass};
pub use kind::{AstKind, KindFilter};
pub use provider::{
    AstNode, AstProvider, ParseError, TranslationUnit, VisitResult, VisitStatus, Visitor,
};
pub use tree_sitter_provider::{ProviderOptions, TreeSitterProvider};
