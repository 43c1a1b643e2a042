//! tree-sitter implementation of [`AstProvider`].
//!
//! A translation unit is the requested file plus every project header it
//! reaches through quoted `#include` directives. The walk reports cursors the
//! way a C++ front end would: declarations with their lexical parent, records
//! and typedefs spelled with their qualified name, functions spelled
//! `ret (params)`.

use crate::config::IndexConfig;
use crate::language::classify::{classify, Dialect};
use crate::language::kind::AstKind;
use crate::language::parser_pool::ParserPool;
use crate::language::provider::{
    AstNode, AstProvider, ParseError, TranslationUnit, VisitResult, VisitStatus, Visitor,
};
use crate::models::Location;
use crate::utils::paths::normalize_path;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tree_sitter::{Node, Tree};

/// Knobs for the tree-sitter front end.
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub expand_includes: bool,
    pub include_dirs: Vec<PathBuf>,
    pub max_include_depth: usize,
    pub max_file_size_bytes: u64,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self::from(&IndexConfig::default())
    }
}

impl From<&IndexConfig> for ProviderOptions {
    fn from(config: &IndexConfig) -> Self {
        Self {
            expand_includes: config.expand_includes,
            include_dirs: config.include_dirs.clone(),
            max_include_depth: config.max_include_depth,
            max_file_size_bytes: config.max_file_size_bytes,
        }
    }
}

pub struct TreeSitterProvider {
    pool: ParserPool,
    options: ProviderOptions,
}

impl TreeSitterProvider {
    pub fn new(options: ProviderOptions) -> Self {
        Self {
            pool: ParserPool::new(),
            options,
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(ProviderOptions::from(config))
    }

    fn load(&self, path: &Path, dialect: Dialect) -> Result<SourceFile, ParseError> {
        let size = fs::metadata(path)
            .map_err(|source| ParseError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        if size > self.options.max_file_size_bytes {
            return Err(ParseError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.options.max_file_size_bytes,
            });
        }

        let bytes = fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = String::from_utf8_lossy(&bytes).into_owned();

        let mut parser = self.pool.checkout(dialect)?;
        let tree = parser.parse(&source, None);
        self.pool.give_back(dialect, parser);

        let tree = tree.ok_or_else(|| ParseError::ParseFailed {
            path: path.to_path_buf(),
        })?;

        Ok(SourceFile {
            path: path.to_path_buf(),
            source,
            tree,
            includes: HashMap::new(),
        })
    }

    fn resolve_include(&self, including_file: &Path, target: &str) -> Option<PathBuf> {
        let local = including_file.parent().map(|dir| dir.join(target));
        let search = self.options.include_dirs.iter().map(|dir| dir.join(target));

        local
            .into_iter()
            .chain(search)
            .map(|candidate| normalize_path(&candidate))
            .find(|candidate| candidate.is_file())
    }

    /// Parse every project header reachable from `files[0]`.
    fn expand_includes(&self, files: &mut Vec<SourceFile>) {
        let mut index: HashMap<PathBuf, usize> = HashMap::new();
        index.insert(files[0].path.clone(), 0);
        let mut frontier = vec![(0usize, 0usize)];

        while let Some((file_idx, depth)) = frontier.pop() {
            if depth >= self.options.max_include_depth {
                debug!(
                    "Include depth limit reached at {}",
                    files[file_idx].path.display()
                );
                continue;
            }

            for (offset, target) in quoted_includes(&files[file_idx]) {
                let Some(resolved) = self.resolve_include(&files[file_idx].path, &target) else {
                    debug!(
                        "Unresolved include \"{}\" in {}",
                        target,
                        files[file_idx].path.display()
                    );
                    continue;
                };

                let header_idx = match index.get(&resolved) {
                    Some(&existing) => existing,
                    None => match self.load(&resolved, Dialect::Cpp) {
                        Ok(header) => {
                            files.push(header);
                            let new_idx = files.len() - 1;
                            index.insert(resolved, new_idx);
                            frontier.push((new_idx, depth + 1));
                            new_idx
                        }
                        Err(e) => {
                            debug!("Skipping header {}: {}", resolved.display(), e);
                            continue;
                        }
                    },
                };
                files[file_idx].includes.insert(offset, header_idx);
            }
        }
    }
}

impl Default for TreeSitterProvider {
    fn default() -> Self {
        Self::new(ProviderOptions::default())
    }
}

impl AstProvider for TreeSitterProvider {
    fn parse(&self, path: &Path) -> Result<Box<dyn TranslationUnit>, ParseError> {
        let class = classify(path).ok_or_else(|| ParseError::UnsupportedFile {
            path: path.to_path_buf(),
        })?;

        let mut files = vec![self.load(path, class.dialect())?];
        if self.options.expand_includes {
            self.expand_includes(&mut files);
        }

        debug!(
            "Created translation unit for {} ({} headers)",
            path.display(),
            files.len() - 1
        );
        Ok(Box::new(TreeSitterUnit { files }))
    }
}

struct SourceFile {
    path: PathBuf,
    source: String,
    tree: Tree,
    /// `#include` node start byte -> index of the parsed header.
    includes: HashMap<usize, usize>,
}

impl SourceFile {
    fn text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn location(&self, node: Node) -> Location {
        let position = node.start_position();
        Location::new(
            self.path.clone(),
            position.row as u32 + 1,
            position.column as u32 + 1,
            node.start_byte(),
        )
    }
}

fn quoted_includes(file: &SourceFile) -> Vec<(usize, String)> {
    let mut found = Vec::new();
    let mut stack = vec![file.tree.root_node()];

    while let Some(node) = stack.pop() {
        if node.kind() == "preproc_include" {
            if let Some(path) = node.child_by_field_name("path") {
                if path.kind() == "string_literal" {
                    let target = file.text(path).trim_matches('"').trim().to_string();
                    if !target.is_empty() {
                        found.push((node.start_byte(), target));
                    }
                }
            }
            continue;
        }
        if node.kind() == "function_definition" {
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.named_children(&mut cursor));
    }

    found
}

fn push_named_children<'t>(pending: &mut Vec<Node<'t>>, node: Node<'t>) {
    let start = pending.len();
    let mut cursor = node.walk();
    pending.extend(node.named_children(&mut cursor));
    pending[start..].reverse();
}

/// Split a namespace name into its identifiers with their locations.
fn namespace_segments(file: &SourceFile, name: Node) -> Vec<(String, Location)> {
    let mut segments = Vec::new();
    let mut pending = vec![name];
    while let Some(node) = pending.pop() {
        match node.kind() {
            "namespace_identifier" | "identifier" => {
                segments.push((file.text(node).trim().to_string(), file.location(node)));
            }
            _ => push_named_children(&mut pending, node),
        }
    }
    segments
}

pub struct TreeSitterUnit {
    files: Vec<SourceFile>,
}

impl TranslationUnit for TreeSitterUnit {
    fn main_file(&self) -> &Path {
        &self.files[0].path
    }

    fn visit(&self, visitor: &mut Visitor<'_>) -> VisitStatus {
        let main = &self.files[0];
        let root = AstNode::translation_unit(&main.path);

        let mut walk = Walk {
            unit: self,
            visitor,
            entered: HashSet::from([0]),
            scopes: Vec::new(),
            known_scopes: HashMap::new(),
            depth: 0,
            aborted: false,
        };
        walk.walk_children(main, main.tree.root_node(), &root);

        if walk.aborted {
            VisitStatus::Aborted
        } else {
            VisitStatus::Completed
        }
    }
}

/// Deepest chain of nested bodies (namespaces, records, functions, headers)
/// the walk descends into.
const MAX_DECLARATION_NESTING: usize = 256;

/// Shape of a declarator once pointer/array/init wrappers are peeled off.
enum Declarator<'t> {
    Function { function: Node<'t>, decoration: String },
    Value { name: Node<'t>, decoration: String },
}

struct Walk<'u, 'v, 'f> {
    unit: &'u TreeSitterUnit,
    visitor: &'v mut Visitor<'f>,
    /// Files already walked in this unit, as include guards would have it.
    entered: HashSet<usize>,
    scopes: Vec<String>,
    /// Qualified name -> kind for records and namespaces seen so far.
    known_scopes: HashMap<String, AstKind>,
    /// Bodies currently being walked, counting includes.
    depth: usize,
    aborted: bool,
}

impl<'u> Walk<'u, '_, '_> {
    fn emit(&mut self, parent: &AstNode, child: &AstNode) -> VisitResult {
        if self.aborted {
            return VisitResult::Abort;
        }
        let result = (self.visitor)(parent, child);
        if result == VisitResult::Abort {
            self.aborted = true;
        }
        result
    }

    /// Walk the named children of `node` in source order. Nodes without a
    /// cursor of their own (statements, expressions, preprocessor blocks) are
    /// flattened onto a work list, so only declaration nesting recurses.
    fn walk_children(&mut self, file: &'u SourceFile, node: Node<'u>, parent: &AstNode) {
        if self.depth >= MAX_DECLARATION_NESTING {
            debug!(
                "Declarations nested deeper than {} in {}, skipping the rest",
                MAX_DECLARATION_NESTING,
                file.path.display()
            );
            return;
        }
        self.depth += 1;

        let mut pending = Vec::new();
        push_named_children(&mut pending, node);
        while let Some(child) = pending.pop() {
            if self.aborted {
                break;
            }
            if !self.visit_node(file, child, parent) {
                push_named_children(&mut pending, child);
            }
        }

        self.depth -= 1;
    }

    /// Visit `node` if it declares something or is deliberately skipped.
    /// Returns false for grouping nodes the caller has to descend into.
    fn visit_node(&mut self, file: &'u SourceFile, node: Node<'u>, parent: &AstNode) -> bool {
        match node.kind() {
            "namespace_definition" => self.visit_namespace(file, node, parent),
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.visit_record(file, node, parent)
            }
            "enum_specifier" => self.visit_enum(file, node, parent),
            "function_definition" => self.visit_function_definition(file, node, parent),
            "declaration" | "field_declaration" => self.visit_declaration(file, node, parent),
            "type_definition" => self.visit_typedef(file, node, parent),
            "preproc_include" => self.visit_include(file, node, parent),
            "comment" | "preproc_def" | "preproc_function_def" | "preproc_call"
            | "access_specifier" | "using_declaration" | "alias_declaration"
            | "friend_declaration" | "static_assert_declaration"
            | "namespace_alias_definition" | "template_parameter_list" => {}
            _ => return false,
        }
        true
    }

    fn qualify(&self, name: &str) -> String {
        if self.scopes.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", self.scopes.join("::"), name)
        }
    }

    /// Find the qualified name a written scope refers to, innermost first.
    fn resolve_scope(&self, written: &str) -> Option<(String, AstKind)> {
        (0..=self.scopes.len()).rev().find_map(|depth| {
            let candidate = if depth == 0 {
                written.to_string()
            } else {
                format!("{}::{}", self.scopes[..depth].join("::"), written)
            };
            self.known_scopes
                .get(&candidate)
                .map(|kind| (candidate.clone(), *kind))
        })
    }

    fn visit_include(&mut self, file: &'u SourceFile, node: Node<'u>, parent: &AstNode) {
        let Some(&header_idx) = file.includes.get(&node.start_byte()) else {
            return;
        };
        if !self.entered.insert(header_idx) {
            return;
        }

        let unit = self.unit;
        let header = &unit.files[header_idx];
        let header_parent = if parent.kind == AstKind::TranslationUnit {
            AstNode::translation_unit(&header.path)
        } else {
            parent.clone()
        };
        self.walk_children(header, header.tree.root_node(), &header_parent);
    }

    /// `namespace a::b { }` reports one cursor per segment, each nested in
    /// the previous one, exactly as the spelled-out form would.
    fn visit_namespace(&mut self, file: &'u SourceFile, node: Node<'u>, parent: &AstNode) {
        let segments = match node.child_by_field_name("name") {
            Some(name) => namespace_segments(file, name),
            None => vec![(String::new(), file.location(node))],
        };
        if segments.is_empty() {
            return;
        }

        let mut current = parent.clone();
        let mut pushed = 0;
        for (name, location) in segments {
            let scope = if name.is_empty() {
                "(anonymous namespace)".to_string()
            } else {
                let qualified = self.qualify(&name);
                self.known_scopes.insert(qualified, AstKind::Namespace);
                name.clone()
            };

            let cursor = AstNode::new(AstKind::Namespace, name, "", location);
            if self.emit(&current, &cursor) != VisitResult::Continue {
                self.scopes.truncate(self.scopes.len() - pushed);
                return;
            }
            self.scopes.push(scope);
            pushed += 1;
            current = cursor;
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.walk_children(file, body, &current);
        }
        self.scopes.truncate(self.scopes.len() - pushed);
    }

    fn visit_record(&mut self, file: &'u SourceFile, node: Node<'u>, parent: &AstNode) {
        if !is_record_declaration(node) {
            return;
        }
        let kind = match node.kind() {
            "class_specifier" => AstKind::ClassDecl,
            "union_specifier" => AstKind::UnionDecl,
            _ => AstKind::StructDecl,
        };

        let name_node = node.child_by_field_name("name");
        let written = name_node.map(|n| file.text(n).to_string()).unwrap_or_default();
        let spelling = last_segment(&written).to_string();
        let location = file.location(name_node.unwrap_or(node));

        let qualified = if written.is_empty() {
            format!(
                "(anonymous {} at {}:{}:{})",
                record_keyword(node),
                location.file_path.display(),
                location.line,
                location.column
            )
        } else if written.contains("::") {
            self.resolve_scope(&written)
                .map(|(resolved, _)| resolved)
                .unwrap_or_else(|| self.qualify(&written))
        } else {
            self.qualify(&written)
        };
        if !written.is_empty() {
            self.known_scopes.insert(qualified.clone(), kind);
        }

        let cursor = AstNode::new(kind, spelling, qualified.clone(), location);
        if self.emit(parent, &cursor) != VisitResult::Continue {
            return;
        }

        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        // Members are qualified by the record's full name, not by the scope it
        // was written in.
        let saved = std::mem::take(&mut self.scopes);
        if !written.is_empty() {
            self.scopes = qualified.split("::").map(str::to_string).collect();
        } else {
            self.scopes = saved.clone();
        }
        self.walk_children(file, body, &cursor);
        self.scopes = saved;
    }

    fn visit_enum(&mut self, file: &'u SourceFile, node: Node<'u>, parent: &AstNode) {
        if !is_record_declaration(node) {
            return;
        }
        let name_node = node.child_by_field_name("name");
        let name = name_node.map(|n| file.text(n).to_string()).unwrap_or_default();
        let cursor = AstNode::new(
            AstKind::EnumDecl,
            name.clone(),
            self.qualify(&name),
            file.location(name_node.unwrap_or(node)),
        );
        // Enumerators are not tracked.
        self.emit(parent, &cursor);
    }

    fn visit_function_definition(
        &mut self,
        file: &'u SourceFile,
        node: Node<'u>,
        parent: &AstNode,
    ) {
        let body = node.child_by_field_name("body");
        let shape = node
            .child_by_field_name("declarator")
            .and_then(|declarator| unwrap_declarator(file, declarator));

        let Some(Declarator::Function {
            function,
            decoration,
        }) = shape
        else {
            if let Some(body) = body {
                let block = AstNode::new(AstKind::CompoundStmt, "", "", file.location(body));
                self.walk_children(file, body, &block);
            }
            return;
        };

        let Some(name_node) = function.child_by_field_name("declarator") else {
            return;
        };
        let return_type = join_type(&declared_type(file, node), &decoration);
        let type_spelling = function_type(file, &return_type, function);

        let (edge_parent, kind, spelling) = if name_node.kind() == "qualified_identifier" {
            let (scope, scope_node, name) = split_qualified(file, name_node);
            match self.resolve_scope(&scope) {
                Some((qualified, scope_kind)) => {
                    let scope_cursor = AstNode::new(
                        scope_kind,
                        last_segment(&scope),
                        if scope_kind == AstKind::Namespace {
                            String::new()
                        } else {
                            qualified
                        },
                        file.location(scope_node),
                    );
                    let kind = if scope_kind.is_record() {
                        member_kind(file, name, last_segment(&scope))
                    } else {
                        AstKind::FunctionDecl
                    };
                    (scope_cursor, kind, file.text(name).to_string())
                }
                None => {
                    debug!(
                        "Unknown scope {} for out-of-line definition in {}",
                        scope,
                        file.path.display()
                    );
                    if let Some(body) = body {
                        let block =
                            AstNode::new(AstKind::CompoundStmt, "", "", file.location(body));
                        self.walk_children(file, body, &block);
                    }
                    return;
                }
            }
        } else if parent.kind.is_record() {
            (
                parent.clone(),
                member_kind(file, name_node, &parent.spelling),
                file.text(name_node).to_string(),
            )
        } else {
            (
                parent.clone(),
                AstKind::FunctionDecl,
                file.text(name_node).to_string(),
            )
        };

        let cursor = AstNode::new(kind, spelling, type_spelling, file.location(name_node));
        if self.emit(&edge_parent, &cursor) != VisitResult::Continue {
            return;
        }

        if let Some(body) = body {
            let block = AstNode::new(AstKind::CompoundStmt, "", "", file.location(body));
            if self.emit(&cursor, &block) == VisitResult::Continue {
                self.walk_children(file, body, &block);
            }
        }
    }

    fn visit_declaration(&mut self, file: &'u SourceFile, node: Node<'u>, parent: &AstNode) {
        if let Some(ty) = node.child_by_field_name("type") {
            if is_type_specifier_definition(ty) {
                self.visit_node(file, ty, parent);
            }
        }

        let is_field = node.kind() == "field_declaration";
        let in_record = parent.kind.is_record();
        let base_type = declared_type(file, node);

        let mut cursor = node.walk();
        let declarators: Vec<Node<'u>> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();

        for declarator in declarators {
            if self.aborted {
                return;
            }
            let child = match unwrap_declarator(file, declarator) {
                Some(Declarator::Function {
                    function,
                    decoration,
                }) => {
                    let Some(name_node) = function.child_by_field_name("declarator") else {
                        continue;
                    };
                    if !is_name_node(name_node) {
                        // Function pointer: a variable or field, not a function.
                        let kind = if is_field { AstKind::FieldDecl } else { AstKind::VarDecl };
                        let Some(name) = innermost_name(name_node) else {
                            continue;
                        };
                        let type_spelling = collapse(&file.text(declarator).replace(file.text(name), ""));
                        AstNode::new(
                            kind,
                            file.text(name),
                            join_type(&base_type, &type_spelling),
                            file.location(name),
                        )
                    } else if name_node.kind() == "qualified_identifier" {
                        continue;
                    } else {
                        let return_type = join_type(&base_type, &decoration);
                        let kind = if in_record {
                            member_kind(file, name_node, &parent.spelling)
                        } else {
                            AstKind::FunctionDecl
                        };
                        AstNode::new(
                            kind,
                            file.text(name_node),
                            function_type(file, &return_type, function),
                            file.location(name_node),
                        )
                    }
                }
                Some(Declarator::Value { name, decoration }) => {
                    let kind = if is_field { AstKind::FieldDecl } else { AstKind::VarDecl };
                    AstNode::new(
                        kind,
                        file.text(name),
                        join_type(&base_type, &decoration),
                        file.location(name),
                    )
                }
                None => continue,
            };
            self.emit(parent, &child);
        }
    }

    fn visit_typedef(&mut self, file: &'u SourceFile, node: Node<'u>, parent: &AstNode) {
        if let Some(ty) = node.child_by_field_name("type") {
            if is_type_specifier_definition(ty) {
                self.visit_node(file, ty, parent);
            }
        }

        let mut cursor = node.walk();
        let declarators: Vec<Node<'u>> = node
            .children_by_field_name("declarator", &mut cursor)
            .collect();

        for declarator in declarators {
            if self.aborted {
                return;
            }
            let Some(name) = innermost_name(declarator) else {
                continue;
            };
            let spelling = file.text(name).to_string();
            let child = AstNode::new(
                AstKind::TypedefDecl,
                spelling.clone(),
                self.qualify(&spelling),
                file.location(name),
            );
            self.emit(parent, &child);
        }
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn last_segment(qualified: &str) -> &str {
    qualified.rsplit("::").next().unwrap_or(qualified).trim()
}

fn join_type(base: &str, decoration: &str) -> String {
    match (base.is_empty(), decoration.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => decoration.to_string(),
        (false, false) => format!("{} {}", base, decoration),
    }
}

fn record_keyword(node: Node) -> &'static str {
    match node.kind() {
        "class_specifier" => "class",
        "union_specifier" => "union",
        "enum_specifier" => "enum",
        _ => "struct",
    }
}

fn is_type_specifier_definition(node: Node) -> bool {
    matches!(
        node.kind(),
        "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
    )
}

/// A record specifier declares something when it has a body or stands alone
/// (`class Foo;`), as opposed to merely naming a type.
fn is_record_declaration(node: Node) -> bool {
    if node.child_by_field_name("body").is_some() {
        return true;
    }
    if node.child_by_field_name("name").is_none() {
        return false;
    }
    match node.parent() {
        Some(parent) => match parent.kind() {
            "field_declaration" | "declaration" => {
                parent.child_by_field_name("declarator").is_none()
            }
            "translation_unit" | "declaration_list" | "field_declaration_list"
            | "template_declaration" | "linkage_specification" | "compound_statement" => true,
            kind => kind.starts_with("preproc_"),
        },
        None => false,
    }
}

fn is_name_node(node: Node) -> bool {
    matches!(
        node.kind(),
        "identifier"
            | "field_identifier"
            | "qualified_identifier"
            | "destructor_name"
            | "operator_name"
            | "template_function"
            | "template_method"
    )
}

fn innermost_name(node: Node) -> Option<Node> {
    let mut pending = vec![node];
    while let Some(current) = pending.pop() {
        match current.kind() {
            "identifier" | "field_identifier" | "type_identifier" => return Some(current),
            "parameter_list" => {}
            _ => push_named_children(&mut pending, current),
        }
    }
    None
}

/// Peel init/pointer/reference/array wrappers off a declarator.
fn unwrap_declarator<'t>(file: &SourceFile, node: Node<'t>) -> Option<Declarator<'t>> {
    let mut pointers = String::new();
    let mut arrays = String::new();
    let mut current = node;

    loop {
        match current.kind() {
            "init_declarator" => current = current.child_by_field_name("declarator")?,
            "pointer_declarator" => {
                pointers.push('*');
                current = current.child_by_field_name("declarator")?;
            }
            "reference_declarator" => {
                let mut cursor = current.walk();
                let rvalue = current.children(&mut cursor).any(|c| c.kind() == "&&");
                pointers.push_str(if rvalue { "&&" } else { "&" });
                let inner = {
                    let mut cursor = current.walk();
                    let named: Vec<Node> = current.named_children(&mut cursor).collect();
                    named.into_iter().last()
                };
                current = inner?;
            }
            "array_declarator" => {
                let size = current
                    .child_by_field_name("size")
                    .map(|s| collapse(file.text(s)))
                    .unwrap_or_default();
                arrays.push_str(&format!("[{}]", size));
                current = current.child_by_field_name("declarator")?;
            }
            "parenthesized_declarator" | "attributed_declarator" => {
                let mut cursor = current.walk();
                let first = current.named_children(&mut cursor).next();
                current = first?;
            }
            "function_declarator" => {
                return Some(Declarator::Function {
                    function: current,
                    decoration: pointers + &arrays,
                });
            }
            "identifier" | "field_identifier" | "qualified_identifier" | "type_identifier"
            | "destructor_name" | "operator_name" => {
                return Some(Declarator::Value {
                    name: current,
                    decoration: pointers + &arrays,
                });
            }
            _ => return None,
        }
    }
}

/// Qualifiers written before the type plus the type itself.
fn declared_type(file: &SourceFile, node: Node) -> String {
    let Some(ty) = node.child_by_field_name("type") else {
        return String::new();
    };

    let mut cursor = node.walk();
    let mut parts: Vec<String> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "type_qualifier" && child.start_byte() < ty.start_byte())
        .map(|child| file.text(child).to_string())
        .collect();
    parts.push(type_text(file, ty));
    collapse(&parts.join(" "))
}

fn type_text(file: &SourceFile, ty: Node) -> String {
    if is_type_specifier_definition(ty) {
        let keyword = record_keyword(ty);
        return match ty.child_by_field_name("name") {
            Some(name) => format!("{} {}", keyword, file.text(name)),
            None => {
                let location = file.location(ty);
                format!(
                    "{} (anonymous {} at {}:{}:{})",
                    keyword,
                    keyword,
                    location.file_path.display(),
                    location.line,
                    location.column
                )
            }
        };
    }
    collapse(file.text(ty))
}

/// `ret (param, param)` with a trailing ` const` for const member functions.
fn function_type(file: &SourceFile, return_type: &str, function: Node) -> String {
    let mut params = Vec::new();
    if let Some(list) = function.child_by_field_name("parameters") {
        let mut cursor = list.walk();
        for param in list.named_children(&mut cursor) {
            match param.kind() {
                "parameter_declaration" | "optional_parameter_declaration" => {
                    params.push(parameter_type(file, param));
                }
                "variadic_parameter" | "variadic_parameter_declaration" => {
                    params.push("...".to_string());
                }
                "comment" => {}
                _ => params.push(collapse(file.text(param))),
            }
        }
    }

    let mut cursor = function.walk();
    let is_const = function
        .named_children(&mut cursor)
        .any(|child| child.kind() == "type_qualifier" && file.text(child) == "const");

    let return_type = if return_type.is_empty() {
        "void"
    } else {
        return_type
    };
    let mut spelling = format!("{} ({})", return_type, params.join(", "));
    if is_const {
        spelling.push_str(" const");
    }
    spelling
}

fn parameter_type(file: &SourceFile, param: Node) -> String {
    let base = declared_type(file, param);
    let Some(declarator) = param.child_by_field_name("declarator") else {
        return base;
    };
    if declarator.kind().starts_with("abstract_") {
        return join_type(&base, &collapse(file.text(declarator)));
    }
    match unwrap_declarator(file, declarator) {
        Some(Declarator::Value { decoration, .. }) => join_type(&base, &decoration),
        Some(Declarator::Function { .. }) | None => {
            let name = innermost_name(declarator)
                .map(|n| file.text(n).to_string())
                .unwrap_or_default();
            join_type(&base, &collapse(&file.text(declarator).replace(&name, "")))
        }
    }
}

/// Split `A::B::name` into (`A::B`, node of `B`, node of `name`).
fn split_qualified<'t>(file: &SourceFile, node: Node<'t>) -> (String, Node<'t>, Node<'t>) {
    let mut segments = Vec::new();
    let mut scope_node = node;
    let mut current = node;

    while current.kind() == "qualified_identifier" {
        if let Some(scope) = current.child_by_field_name("scope") {
            segments.push(file.text(scope).to_string());
            scope_node = scope;
        }
        match current.child_by_field_name("name") {
            Some(name) => current = name,
            None => break,
        }
    }

    (segments.join("::"), scope_node, current)
}

fn member_kind(file: &SourceFile, name: Node, record_name: &str) -> AstKind {
    if name.kind() == "destructor_name" {
        AstKind::Destructor
    } else if !record_name.is_empty() && file.text(name) == record_name {
        AstKind::Constructor
    } else {
        AstKind::CXXMethod
    }
}
