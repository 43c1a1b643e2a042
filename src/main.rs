use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

mod cli;

use cli::{render_json, render_text, Args, OutputFormat};
use cxx_symbol_index::config::IndexConfig;
use cxx_symbol_index::discovery::discover_project;
use cxx_symbol_index::indexing::RootIndexRegistry;
use cxx_symbol_index::language::TreeSitterProvider;
use cxx_symbol_index::logging::{init_logging, DiagnosticsBuffer};
use cxx_symbol_index::models::ProjectDescriptor;
use cxx_symbol_index::utils::paths::normalize_path;

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

/// Either the explicit `--file` list or a scan of the workspace.
fn project_for(args: &Args, config: &IndexConfig) -> Result<ProjectDescriptor> {
    if args.files.is_empty() {
        return discover_project(&args.workspace, config);
    }

    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    let workspace = absolute(&cwd, &args.workspace);
    let files = args
        .files
        .iter()
        .map(|file| absolute(&workspace, file))
        .collect();
    Ok(ProjectDescriptor::new(workspace, files))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let diagnostics = args.diagnostics.then(DiagnosticsBuffer::new);
    init_logging(&args.log_level, diagnostics.clone());

    let mut config = IndexConfig::load()?;
    args.apply_to(&mut config);
    config.validate()?;

    let descriptor = project_for(&args, &config)?;
    info!(
        "Indexing {} files of {}",
        descriptor.files.len(),
        descriptor.workspace_root.display()
    );

    let provider = Arc::new(TreeSitterProvider::from_config(&config));
    let registry = RootIndexRegistry::new(config, provider);

    let started = Instant::now();
    let root = registry.create_root(descriptor)?;
    let success = registry.wait_until_finished(root, Duration::from_secs(args.timeout_secs))?;
    if success.is_none() {
        warn!(
            "Indexing did not finish within {}s, cancelling",
            args.timeout_secs
        );
        registry.cancel(root)?;
    }

    let progress = registry.progress(root)?;
    let tree = registry
        .remove_root(root)
        .context("Failed to drain the index")?;
    info!(
        "Indexed {} symbols in {:.2?}",
        tree.node_count(),
        started.elapsed()
    );

    match args.format {
        OutputFormat::Text => print!("{}", render_text(&tree)),
        OutputFormat::Json => println!("{}", render_json(&tree, success, &progress)?),
    }

    if let Some(buffer) = diagnostics {
        for diagnostic in buffer.get_all() {
            eprintln!("{diagnostic}");
        }
    }

    if success != Some(true) {
        warn!("Outline is incomplete");
    }
    Ok(())
}
