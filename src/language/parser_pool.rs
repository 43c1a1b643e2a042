use crate::language::classify::Dialect;
use crate::language::provider::ParseError;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use tree_sitter::Parser;

const DEFAULT_MAX_PARSERS_PER_DIALECT: usize = 4;

/// A thread-safe pool of tree-sitter parsers, keyed by dialect.
///
/// Creating a parser and loading its grammar is cheap compared to parsing, but
/// every worker of every root parses many files, so parsers are checked out
/// and returned instead of rebuilt per file.
pub struct ParserPool {
    parsers: Mutex<HashMap<Dialect, Vec<Parser>>>,
    max_per_dialect: usize,
}

impl ParserPool {
    pub fn new() -> Self {
        Self::with_capacity(std::cmp::max(
            rayon::current_num_threads(),
            DEFAULT_MAX_PARSERS_PER_DIALECT,
        ))
    }

    pub fn with_capacity(max_per_dialect: usize) -> Self {
        Self {
            parsers: Mutex::new(HashMap::new()),
            max_per_dialect,
        }
    }

    /// Take a parser for `dialect`, creating one if the pool is empty.
    pub fn checkout(&self, dialect: Dialect) -> Result<Parser, ParseError> {
        if let Ok(mut pool) = self.parsers.lock() {
            if let Some(parser) = pool.get_mut(&dialect).and_then(Vec::pop) {
                return Ok(parser);
            }
        }

        debug!("Creating new {:?} parser", dialect);
        let mut parser = Parser::new();
        parser
            .set_language(&dialect.grammar())
            .map_err(|e| ParseError::Grammar(e.to_string()))?;
        Ok(parser)
    }

    /// Hand a parser back. Parsers beyond the pool capacity are dropped.
    pub fn give_back(&self, dialect: Dialect, mut parser: Parser) {
        parser.reset();
        if let Ok(mut pool) = self.parsers.lock() {
            let slot = pool.entry(dialect).or_default();
            if slot.len() < self.max_per_dialect {
                slot.push(parser);
            }
        }
    }

    pub fn idle_count(&self, dialect: Dialect) -> usize {
        self.parsers
            .lock()
            .map(|pool| pool.get(&dialect).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

impl Default for ParserPool {
    fn default() -> Self {
        Self::new()
    }
}
