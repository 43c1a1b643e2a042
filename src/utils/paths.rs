use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` segments and fold `..` into the
/// preceding segment. The filesystem is never consulted, so symlinks are kept
/// as written.
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    normalized.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/work/src/./../include/a.h")),
            PathBuf::from("/work/include/a.h")
        );
        assert_eq!(
            normalize_path(Path::new("src/../../a.h")),
            PathBuf::from("../a.h")
        );
        assert_eq!(normalize_path(Path::new("/../a.h")), PathBuf::from("/a.h"));
        assert_eq!(normalize_path(Path::new("a/b/c.h")), PathBuf::from("a/b/c.h"));
    }
}
