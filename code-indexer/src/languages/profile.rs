//! Grammar-profile extraction core.
//!
//! Each built-in adapter is a [`LanguageProfile`]: tables of declaration,
//! import and call node kinds plus small hooks for the places grammars
//! genuinely differ (export detection, import parsing, callee shapes).
//! [`ProfileAdapter`] drives the shared cursor-stack walk over them.
//!
//! A new `Parser` is created per call; grammars are cheap to set and this
//! keeps the adapters `Sync` without a parser pool.

use crate::adapter::LanguageAdapter;
use crate::fingerprint::fingerprint_node;
use crate::languages::LanguageKind;
use crate::types::{CallKind, ExtractedCall, ExtractedImport, ExtractedSymbol};
use ledger_store::model::{SymbolKind, SymbolRange, Visibility};
use tree_sitter::{Language, Node, Parser, Tree};

const SIGNATURE_MAX: usize = 160;
const DOC_MAX: usize = 240;

/// How to find the name of a declaration node.
#[derive(Debug, Clone, Copy)]
pub(crate) enum NameRule {
    /// Named field on the node (`name`, `declarator`, ...).
    Field(&'static str),
    /// Descend through `declarator` fields until an identifier (C-family).
    Declarator,
    /// First identifier-like descendant.
    FirstIdentifier,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DeclRule {
    pub kinds: &'static [&'static str],
    pub symbol: SymbolKind,
    pub name: NameRule,
    /// Children of this node get its name pushed onto their owner chain.
    pub container: bool,
    /// `false` for anonymous containers that group members without being a
    /// symbol themselves (Rust `impl` blocks).
    pub emit: bool,
    /// Only match nodes that carry a `body` field. Keeps C-family type
    /// *usages* (`struct foo x;`) from emitting duplicate declarations.
    pub requires_body: bool,
}

impl DeclRule {
    pub(crate) const fn new(kinds: &'static [&'static str], symbol: SymbolKind) -> Self {
        Self {
            kinds,
            symbol,
            name: NameRule::Field("name"),
            container: false,
            emit: true,
            requires_body: false,
        }
    }

    pub(crate) const fn container(mut self) -> Self {
        self.container = true;
        self
    }

    pub(crate) const fn named(mut self, rule: NameRule) -> Self {
        self.name = rule;
        self
    }

    pub(crate) const fn anonymous(mut self) -> Self {
        self.emit = false;
        self
    }

    pub(crate) const fn with_body(mut self) -> Self {
        self.requires_body = true;
        self
    }
}

pub(crate) struct CalleeInfo {
    pub callee: String,
    pub receiver: Option<String>,
    pub kind: CallKind,
}

pub(crate) type ExportHook = fn(node: Node<'_>, source: &str, name: &str) -> (bool, Option<Visibility>);
pub(crate) type ImportHook = fn(node: Node<'_>, source: &str, out: &mut Vec<ExtractedImport>);
pub(crate) type CallHook = fn(node: Node<'_>, source: &str) -> Option<CalleeInfo>;
pub(crate) type KindHook = fn(name: &str, owner: &[String], kind: SymbolKind) -> SymbolKind;

pub(crate) struct LanguageProfile {
    pub language: LanguageKind,
    pub grammar: fn() -> Language,
    pub decls: &'static [DeclRule],
    pub import_kinds: &'static [&'static str],
    pub call_kinds: &'static [&'static str],
    pub export_hook: ExportHook,
    pub import_hook: ImportHook,
    pub call_hook: CallHook,
    pub kind_hook: KindHook,
}

/// Shared adapter over a [`LanguageProfile`].
pub(crate) struct ProfileAdapter {
    profile: LanguageProfile,
}

impl ProfileAdapter {
    pub(crate) fn new(profile: LanguageProfile) -> Self {
        Self { profile }
    }

    fn rule_for(&self, kind: &str) -> Option<&DeclRule> {
        self.profile
            .decls
            .iter()
            .find(|r| r.kinds.contains(&kind))
    }
}

impl LanguageAdapter for ProfileAdapter {
    fn language(&self) -> LanguageKind {
        self.profile.language
    }

    fn parse(&self, source: &str) -> Option<Tree> {
        let mut parser = Parser::new();
        parser.set_language(&(self.profile.grammar)()).ok()?;
        parser.parse(source, None)
    }

    fn extract_symbols(&self, tree: &Tree, source: &str, _rel_path: &str) -> Vec<ExtractedSymbol> {
        let mut out = Vec::new();
        let mut stack: Vec<(Node<'_>, Vec<String>)> = vec![(tree.root_node(), Vec::new())];

        while let Some((node, owner)) = stack.pop() {
            let mut owner_for_children = owner.clone();

            if let Some(rule) = self
                .rule_for(node.kind())
                .filter(|r| !r.requires_body || node.child_by_field_name("body").is_some())
            {
                let name = resolve_name(node, source, rule.name);
                match name {
                    Some(name) if !name.is_empty() => {
                        if rule.emit {
                            let (exported, visibility) =
                                (self.profile.export_hook)(node, source, &name);
                            let vis_str = visibility.map(|v| v.as_str()).unwrap_or("");
                            let fingerprint = fingerprint_node(node, source, &name, vis_str);
                            let mut kind = rule.symbol;
                            if kind == SymbolKind::Function && !owner.is_empty() {
                                kind = SymbolKind::Method;
                            }
                            kind = (self.profile.kind_hook)(&name, &owner, kind);
                            out.push(ExtractedSymbol {
                                kind,
                                name: name.clone(),
                                range: node_range(node),
                                byte_start: node.start_byte(),
                                byte_end: node.end_byte(),
                                exported,
                                visibility,
                                ast_fingerprint: fingerprint,
                                signature: signature_of(node, source),
                                doc: doc_of(node, source),
                                owner_path: owner.clone(),
                            });
                        }
                        if rule.container {
                            owner_for_children.push(name);
                        }
                    }
                    _ if rule.container && !rule.emit => {
                        // Anonymous container: group members under its head text.
                        owner_for_children.push(container_head(node, source));
                    }
                    _ => {}
                }
            }

            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push((child, owner_for_children.clone()));
                }
            }
        }
        out
    }

    fn extract_imports(&self, tree: &Tree, source: &str, _rel_path: &str) -> Vec<ExtractedImport> {
        let mut out = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if self.profile.import_kinds.contains(&node.kind()) {
                (self.profile.import_hook)(node, source, &mut out);
            }
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
        out
    }

    fn extract_calls(
        &self,
        tree: &Tree,
        source: &str,
        _rel_path: &str,
        symbols: &[ExtractedSymbol],
    ) -> Vec<ExtractedCall> {
        let mut out = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if self.profile.call_kinds.contains(&node.kind()) {
                if let Some(info) = (self.profile.call_hook)(node, source) {
                    let pos = node.start_position();
                    out.push(ExtractedCall {
                        caller: enclosing_symbol(symbols, node.start_byte()),
                        callee: info.callee,
                        receiver: info.receiver,
                        kind: info.kind,
                        line: pos.row as u32,
                        col: pos.column as u32,
                    });
                }
            }
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
        out
    }
}

/* ------------------------- node helpers ------------------------- */

pub(crate) fn text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

pub(crate) fn node_range(node: Node<'_>) -> SymbolRange {
    let start = node.start_position();
    let end = node.end_position();
    SymbolRange::new(
        start.row as u32,
        start.column as u32,
        end.row as u32,
        end.column as u32,
    )
}

pub(crate) fn node_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32
}

fn resolve_name(node: Node<'_>, source: &str, rule: NameRule) -> Option<String> {
    match rule {
        NameRule::Field(field) => node
            .child_by_field_name(field)
            .map(|n| text(n, source).to_string()),
        NameRule::Declarator => {
            let mut current = node.child_by_field_name("declarator")?;
            loop {
                if is_identifier_kind(current.kind()) {
                    return Some(text(current, source).to_string());
                }
                match current
                    .child_by_field_name("declarator")
                    .or_else(|| first_identifier(current))
                {
                    Some(next) if next.id() != current.id() => current = next,
                    _ => return None,
                }
            }
        }
        NameRule::FirstIdentifier => {
            first_identifier(node).map(|n| text(n, source).to_string())
        }
    }
}

pub(crate) fn is_identifier_kind(kind: &str) -> bool {
    kind.ends_with("identifier") || kind == "name" || kind == "word"
}

pub(crate) fn first_identifier(node: Node<'_>) -> Option<Node<'_>> {
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.id() != node.id() && is_identifier_kind(n.kind()) {
            return Some(n);
        }
        for i in (0..n.child_count()).rev() {
            if let Some(c) = n.child(i) {
                stack.push(c);
            }
        }
    }
    None
}

fn container_head(node: Node<'_>, source: &str) -> String {
    node.child_by_field_name("type")
        .or_else(|| node.child_by_field_name("name"))
        .or_else(|| first_identifier(node))
        .map(|n| text(n, source).to_string())
        .unwrap_or_else(|| node.kind().to_string())
}

/// Declaration head up to the body, single-spaced and capped.
fn signature_of(node: Node<'_>, source: &str) -> Option<String> {
    let head_end = node
        .child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or_else(|| node.end_byte());
    let raw = source.get(node.start_byte()..head_end)?;
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    let mut sig = collapsed;
    truncate_at_boundary(&mut sig, SIGNATURE_MAX);
    Some(sig)
}

/// Truncate without splitting a multi-byte character.
fn truncate_at_boundary(text: &mut String, max: usize) {
    if text.len() > max {
        let mut cut = max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
}

/// Leading comment attached to the declaration (or to its `export` wrapper).
fn doc_of(node: Node<'_>, source: &str) -> Option<String> {
    let anchor = match node.parent() {
        Some(p) if p.kind() == "export_statement" || p.kind() == "decorated_definition" => p,
        _ => node,
    };
    let prev = anchor.prev_sibling()?;
    if !prev.kind().contains("comment") {
        return None;
    }
    let raw = text(prev, source);
    let cleaned = raw
        .lines()
        .map(|l| {
            l.trim()
                .trim_start_matches("///")
                .trim_start_matches("//")
                .trim_start_matches("/*")
                .trim_end_matches("*/")
                .trim_start_matches('*')
                .trim_start_matches('#')
                .trim()
        })
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if cleaned.is_empty() {
        return None;
    }
    let mut doc = cleaned;
    truncate_at_boundary(&mut doc, DOC_MAX);
    Some(doc)
}

/// Innermost extracted symbol whose span contains the byte offset.
pub(crate) fn enclosing_symbol(symbols: &[ExtractedSymbol], byte: usize) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, s) in symbols.iter().enumerate() {
        if s.byte_start <= byte && byte < s.byte_end {
            best = match best {
                Some(b) if symbols[b].byte_end - symbols[b].byte_start
                    <= s.byte_end - s.byte_start =>
                {
                    Some(b)
                }
                _ => Some(i),
            };
        }
    }
    best
}

/// Default callee extraction for C-family call nodes.
pub(crate) fn default_callee(node: Node<'_>, source: &str) -> Option<CalleeInfo> {
    let function = node
        .child_by_field_name("function")
        .or_else(|| node.child_by_field_name("constructor"))
        .or_else(|| node.child_by_field_name("name"))
        .or_else(|| node.child(0))?;
    callee_from(function, source)
}

/// Classify a callee node: plain identifier → function call, member access
/// with a simple receiver → method call, anything else we can still name →
/// dynamic.
pub(crate) fn callee_from(function: Node<'_>, source: &str) -> Option<CalleeInfo> {
    if is_identifier_kind(function.kind()) {
        return Some(CalleeInfo {
            callee: text(function, source).to_string(),
            receiver: None,
            kind: CallKind::Function,
        });
    }

    let member = function
        .child_by_field_name("property")
        .or_else(|| function.child_by_field_name("attribute"))
        .or_else(|| function.child_by_field_name("field"))
        .or_else(|| function.child_by_field_name("name"));
    if let Some(member) = member {
        let receiver = function
            .child_by_field_name("object")
            .or_else(|| function.child_by_field_name("operand"))
            .or_else(|| function.child_by_field_name("value"))
            .or_else(|| function.child_by_field_name("expression"))
            .or_else(|| function.child_by_field_name("scope"))
            .or_else(|| function.child_by_field_name("path"))
            .filter(|r| is_identifier_kind(r.kind()))
            .map(|r| text(r, source).to_string());
        return Some(CalleeInfo {
            callee: text(member, source).to_string(),
            receiver,
            kind: CallKind::Method,
        });
    }

    // Parenthesized, chained or computed targets: name the last identifier
    // if there is one, classify as dynamic.
    first_identifier(function).map(|n| CalleeInfo {
        callee: text(n, source).to_string(),
        receiver: None,
        kind: CallKind::Dynamic,
    })
}

/// Passthrough kind hook.
pub(crate) fn keep_kind(_name: &str, _owner: &[String], kind: SymbolKind) -> SymbolKind {
    kind
}

/// Strip matching quotes from a string-literal's text.
pub(crate) fn unquote(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}
