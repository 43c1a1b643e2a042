//! cxx-symbol-index builds a per-project outline of C/C++ declarations.
//!
//! Every file of an open project is parsed on a per-project worker pool. The
//! declarations each translation unit reports are filtered by kind and
//! location, then merged into one symbol tree per project, so a class
//! declared in a header and defined in several sources shows up once with
//! all of its locations.

pub mod config;
pub mod discovery;
pub mod indexing;
pub mod language;
pub mod logging;
pub mod models;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::IndexConfig;
pub use discovery::discover_project;
pub use indexing::{IndexError, IndexObserver, RootId, RootIndexRegistry, SymbolNode, SymbolTree};
pub use language::{AstProvider, KindFilter, TreeSitterProvider};
pub use models::{Location, Occurrence, ProjectDescriptor, SymbolInfo, SymbolKind};
