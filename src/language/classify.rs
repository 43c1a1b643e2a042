use std::path::Path;

/// Grammar used to parse a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    C,
    Cpp,
}

impl Dialect {
    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            Dialect::C => tree_sitter_c::LANGUAGE.into(),
            Dialect::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

const C_SOURCE_EXTENSIONS: &[&str] = &["c"];
const CPP_SOURCE_EXTENSIONS: &[&str] = &["cc", "cpp", "cxx", "c++", "C"];
const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "h++", "H", "inl", "ipp", "tpp"];

/// Role of a C/C++ file in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Source(Dialect),
    Header,
}

impl FileClass {
    /// Headers are parsed as C++, which accepts nearly all C headers.
    pub fn dialect(&self) -> Dialect {
        match self {
            FileClass::Source(dialect) => *dialect,
            FileClass::Header => Dialect::Cpp,
        }
    }
}

/// Classify a path by extension. Returns `None` for anything that is not C/C++.
pub fn classify(path: &Path) -> Option<FileClass> {
    let ext = path.extension()?.to_str()?;

    if C_SOURCE_EXTENSIONS.contains(&ext) {
        return Some(FileClass::Source(Dialect::C));
    }
    if CPP_SOURCE_EXTENSIONS.contains(&ext) {
        return Some(FileClass::Source(Dialect::Cpp));
    }
    if HEADER_EXTENSIONS.contains(&ext) {
        return Some(FileClass::Header);
    }

    let lowered = ext.to_ascii_lowercase();
    if lowered != ext {
        return classify_lowered(&lowered);
    }
    None
}

fn classify_lowered(ext: &str) -> Option<FileClass> {
    if CPP_SOURCE_EXTENSIONS.contains(&ext) {
        Some(FileClass::Source(Dialect::Cpp))
    } else if HEADER_EXTENSIONS.contains(&ext) {
        Some(FileClass::Header)
    } else {
        None
    }
}

pub fn is_cxx_file(path: &Path) -> bool {
    classify(path).is_some()
}
