//! Common test utilities: a scripted in-memory AST provider and helpers for
//! building cursors and projects.

#![allow(dead_code)]

use anyhow::{bail, Result};
use cxx_symbol_index::config::IndexConfig;
use cxx_symbol_index::language::{
    AstKind, AstNode, AstProvider, ParseError, TranslationUnit, VisitResult, VisitStatus, Visitor,
};
use cxx_symbol_index::models::{Location, ProjectDescriptor};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub type Edge = (AstNode, AstNode);

/// Provider whose translation units replay fixed edge lists.
///
/// Files without a script parse to an empty unit. Failing files return a
/// parse error, panicking files panic inside `parse`, and every replayed edge
/// can be slowed down to keep jobs in flight for cancellation tests.
#[derive(Default)]
pub struct ScriptedProvider {
    units: HashMap<PathBuf, Vec<Edge>>,
    failing: HashSet<PathBuf>,
    panicking: HashSet<PathBuf>,
    edge_delay: Duration,
    parsed: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit(mut self, file: impl Into<PathBuf>, edges: Vec<Edge>) -> Self {
        self.units.insert(file.into(), edges);
        self
    }

    pub fn failing(mut self, file: impl Into<PathBuf>) -> Self {
        self.failing.insert(file.into());
        self
    }

    pub fn panicking(mut self, file: impl Into<PathBuf>) -> Self {
        self.panicking.insert(file.into());
        self
    }

    pub fn with_edge_delay(mut self, delay: Duration) -> Self {
        self.edge_delay = delay;
        self
    }

    /// How many `parse` calls were made so far.
    pub fn parsed(&self) -> usize {
        self.parsed.load(Ordering::SeqCst)
    }
}

impl AstProvider for ScriptedProvider {
    fn parse(&self, path: &Path) -> Result<Box<dyn TranslationUnit>, ParseError> {
        self.parsed.fetch_add(1, Ordering::SeqCst);
        if self.panicking.contains(path) {
            panic!("scripted panic for {}", path.display());
        }
        if self.failing.contains(path) {
            return Err(ParseError::Unavailable(format!(
                "scripted failure for {}",
                path.display()
            )));
        }

        Ok(Box::new(ScriptedUnit {
            file: path.to_path_buf(),
            edges: self.units.get(path).cloned().unwrap_or_default(),
            delay: self.edge_delay,
        }))
    }
}

struct ScriptedUnit {
    file: PathBuf,
    edges: Vec<Edge>,
    delay: Duration,
}

impl TranslationUnit for ScriptedUnit {
    fn main_file(&self) -> &Path {
        &self.file
    }

    fn visit(&self, visitor: &mut Visitor<'_>) -> VisitStatus {
        for (parent, child) in &self.edges {
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            if visitor(parent, child) == VisitResult::Abort {
                return VisitStatus::Aborted;
            }
        }
        VisitStatus::Completed
    }
}

pub fn tu(file: &str) -> AstNode {
    AstNode::translation_unit(file)
}

pub fn class(name: &str, qualified: &str, file: &str, line: u32) -> AstNode {
    AstNode::new(
        AstKind::ClassDecl,
        name,
        qualified,
        Location::new(file, line, 7, (line as usize) * 40),
    )
}

pub fn method(name: &str, signature: &str, file: &str, line: u32) -> AstNode {
    AstNode::new(
        AstKind::CXXMethod,
        name,
        signature,
        Location::new(file, line, 10, (line as usize) * 40 + 9),
    )
}

pub fn namespace(name: &str, file: &str, line: u32) -> AstNode {
    AstNode::new(
        AstKind::Namespace,
        name,
        "",
        Location::new(file, line, 11, (line as usize) * 40),
    )
}

pub fn variable(name: &str, ty: &str, file: &str, line: u32) -> AstNode {
    AstNode::new(
        AstKind::VarDecl,
        name,
        ty,
        Location::new(file, line, 5, (line as usize) * 40),
    )
}

/// `count` edges of one class with `count - 1` methods, all in `file`.
pub fn busy_unit(file: &str, class_name: &str, count: u32) -> Vec<Edge> {
    let owner = class(class_name, class_name, file, 1);
    let mut edges = vec![(tu(file), owner.clone())];
    for i in 1..count {
        edges.push((
            owner.clone(),
            method(&format!("m{i}"), "void ()", file, i + 1),
        ));
    }
    edges
}

pub fn project(root: &str, files: &[&str]) -> ProjectDescriptor {
    ProjectDescriptor::new(root, files.iter().map(PathBuf::from).collect())
}

/// Fast polling and a bounded drain so a hung test fails instead of blocking.
pub fn test_config(workers: usize) -> IndexConfig {
    IndexConfig {
        max_workers: workers,
        drain_poll_interval_ms: 5,
        drain_timeout_ms: 10_000,
        ..IndexConfig::default()
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> Result<()> {
    let started = Instant::now();
    while !condition() {
        if started.elapsed() > timeout {
            bail!("Condition not met within {:?}", timeout);
        }
        thread::sleep(Duration::from_millis(2));
    }
    Ok(())
}
