use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A source position where a symbol was declared or defined.
///
/// Lines and columns are 1-based, `byte_offset` is 0-based. A cursor that has
/// no real position (the translation unit itself) uses line and column 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file_path: PathBuf,
    pub line: u32,
    pub column: u32,
    pub byte_offset: usize,
}

impl Location {
    pub fn new(file_path: impl Into<PathBuf>, line: u32, column: u32, byte_offset: usize) -> Self {
        Self {
            file_path: file_path.into(),
            line,
            column,
            byte_offset,
        }
    }

    /// Location of a file-level cursor (no line or column).
    pub fn file_start(file_path: impl Into<PathBuf>) -> Self {
        Self::new(file_path, 0, 0, 0)
    }

    pub fn file(&self) -> &Path {
        &self.file_path
    }

    pub fn is_valid(&self) -> bool {
        !self.file_path.as_os_str().is_empty() && self.line > 0 && self.column > 0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.file_path.display(),
            self.line,
            self.column
        )
    }
}

/// Declaration kinds that can appear in the symbol outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SymbolKind {
    Namespace,
    ClassDecl,
    StructDecl,
    UnionDecl,
    TypedefDecl,
    FunctionDecl,
    CXXMethod,
    FieldDecl,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Namespace => "Namespace",
            SymbolKind::ClassDecl => "ClassDecl",
            SymbolKind::StructDecl => "StructDecl",
            SymbolKind::UnionDecl => "UnionDecl",
            SymbolKind::TypedefDecl => "TypedefDecl",
            SymbolKind::FunctionDecl => "FunctionDecl",
            SymbolKind::CXXMethod => "CXXMethod",
            SymbolKind::FieldDecl => "FieldDecl",
        }
    }

    /// Records can own fields and methods.
    pub fn is_record(&self) -> bool {
        matches!(
            self,
            SymbolKind::ClassDecl | SymbolKind::StructDecl | SymbolKind::UnionDecl
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a symbol in the outline.
///
/// Two occurrences denote the same symbol iff kind, type spelling and display
/// name are all equal. This is a name-based approximation: two unrelated
/// overload-free declarations with identical spellings collapse into one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub kind: SymbolKind,
    pub type_spelling: String,
    pub display_name: String,
}

impl SymbolInfo {
    pub fn new(
        kind: SymbolKind,
        type_spelling: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            type_spelling: type_spelling.into(),
            display_name: display_name.into(),
        }
    }

    /// Text shown for the symbol in an outline row.
    pub fn label(&self) -> String {
        if self.type_spelling.is_empty() {
            self.display_name.clone()
        } else {
            format!("{} {}", self.display_name, self.type_spelling)
        }
    }

    /// Key used to keep siblings ordered without a separate sort pass.
    pub fn sort_key(&self) -> String {
        self.display_name.to_uppercase()
    }
}

/// One observed declaration: which symbol, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub info: SymbolInfo,
    pub location: Location,
}

impl Occurrence {
    pub fn new(info: SymbolInfo, location: Location) -> Self {
        Self { info, location }
    }
}

/// A project handed over by the project model when it is opened.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub workspace_root: PathBuf,
    pub files: Vec<PathBuf>,
}

impl ProjectDescriptor {
    pub fn new(workspace_root: impl Into<PathBuf>, files: Vec<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            files,
        }
    }

    /// Name of the synthetic root node: the workspace directory name.
    pub fn root_name(&self) -> String {
        self.workspace_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.workspace_root.to_string_lossy().into_owned())
    }
}
