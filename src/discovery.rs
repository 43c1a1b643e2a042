//! Workspace scanning: find the C/C++ sources and headers of a project.

use crate::config::IndexConfig;
use crate::language::classify::is_cxx_file;
use crate::models::ProjectDescriptor;
use crate::utils::paths::normalize_path;
use anyhow::{anyhow, Context, Result};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Scan `workspace` for C/C++ files and describe it as a project.
///
/// Honours `.gitignore` (when enabled) and the configured exclude globs,
/// which are matched against paths relative to the workspace. The returned
/// file list is absolute, sorted and free of duplicates.
pub fn discover_project(workspace: &Path, config: &IndexConfig) -> Result<ProjectDescriptor> {
    let root = if workspace.is_absolute() {
        normalize_path(workspace)
    } else {
        let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
        normalize_path(&cwd.join(workspace))
    };
    if !root.is_dir() {
        return Err(anyhow!("Workspace is not a directory: {}", root.display()));
    }

    let excludes = config
        .exclude_patterns
        .iter()
        .map(|pattern| {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid exclude pattern: {pattern}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut builder = WalkBuilder::new(&root);
    builder
        .hidden(true)
        .git_ignore(config.respect_gitignore)
        .git_global(config.respect_gitignore)
        .git_exclude(config.respect_gitignore)
        .require_git(false);

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        if !is_cxx_file(path) {
            continue;
        }
        let relative = path.strip_prefix(&root).unwrap_or(path);
        if excludes.iter().any(|pattern| pattern.matches_path(relative)) {
            debug!("Excluded {}", relative.display());
            continue;
        }
        files.push(normalize_path(path));
    }

    files.sort();
    files.dedup();
    info!(
        "Discovered {} C/C++ files under {}",
        files.len(),
        root.display()
    );

    Ok(ProjectDescriptor::new(root, files))
}
