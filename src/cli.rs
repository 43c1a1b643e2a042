use clap::{Parser as ClapParser, ValueEnum};
use cxx_symbol_index::config::IndexConfig;
use cxx_symbol_index::indexing::{ProgressSnapshot, SymbolTree};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented outline, one symbol per line
    Text,
    /// The whole tree with locations as JSON
    Json,
}

#[derive(ClapParser, Debug)]
#[command(
    author,
    version,
    about = "Index the C/C++ declarations of a workspace and print the symbol outline"
)]
pub struct Args {
    /// Workspace directory to index
    #[arg(value_name = "WORKSPACE")]
    pub workspace: PathBuf,

    /// Index only these files instead of scanning the workspace (repeatable)
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Worker threads for this workspace (0 = number of CPUs)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Give up waiting for indexing after this many seconds and cancel
    #[arg(short, long = "timeout-secs", default_value = "300")]
    pub timeout_secs: u64,

    /// Log level used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,

    /// Print the collected warnings and errors after the outline
    #[arg(long)]
    pub diagnostics: bool,
}

impl Args {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut IndexConfig) {
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
    }
}

/// Indented outline: one `label` per line, two spaces per level.
pub fn render_text(tree: &SymbolTree) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", tree.name);
    tree.for_each(|depth, node| {
        let _ = writeln!(
            out,
            "{}{}  [{}]",
            "  ".repeat(depth + 1),
            node.label(),
            node.info.kind
        );
    });
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    success: Option<bool>,
    progress: &'a ProgressSnapshot,
    tree: &'a SymbolTree,
}

pub fn render_json(
    tree: &SymbolTree,
    success: Option<bool>,
    progress: &ProgressSnapshot,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        success,
        progress,
        tree,
    })
}
