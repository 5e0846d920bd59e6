//! Structural AST fingerprints.
//!
//! The fingerprint captures the shape of a declaration, not its text: two
//! symbols with the same structure but different comments, whitespace or
//! literal values hash identically. Composite layout (fixed order):
//! `fp|<node kind>|<name>|<param count>|<async>|<static>|<visibility>|<ret>|<subtree hash>`.

use crate::ids::{FNV_OFFSET, fingerprint_digest, fnv1a_step};
use std::collections::HashMap;
use tracing::warn;
use tree_sitter::Node;

/// Compute the fingerprint of a declaration node.
pub fn fingerprint_node(node: Node<'_>, source: &str, name: &str, visibility: &str) -> String {
    let params = param_count(node);
    let is_async = has_leading_token(node, source, "async");
    let is_static = has_leading_token(node, source, "static");
    let has_ret = node.child_by_field_name("return_type").is_some();
    let shape = subtree_shape(node);

    let composite = format!(
        "fp|{}|{}|{}|{}|{}|{}|{}|{:016x}",
        node.kind(),
        name,
        params,
        is_async,
        is_static,
        visibility,
        has_ret,
        shape
    );
    fingerprint_digest(&composite)
}

/// Depth-first enumeration of node kinds, skipping comments and literal
/// tokens, folded through FNV-1a. Identifier text inside bodies does not
/// participate; this is structural identity only.
pub fn subtree_shape(node: Node<'_>) -> u64 {
    let mut hash = FNV_OFFSET;
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if skip_kind(n.kind()) {
            continue;
        }
        hash = fnv1a_step(hash, n.kind().as_bytes());
        hash = fnv1a_step(hash, b"|");
        // Reverse push keeps the visit order depth-first, left to right.
        for i in (0..n.child_count()).rev() {
            if let Some(c) = n.child(i) {
                stack.push(c);
            }
        }
    }
    hash
}

fn skip_kind(kind: &str) -> bool {
    kind.contains("comment")
        || kind.contains("literal")
        || matches!(
            kind,
            "string"
                | "template_string"
                | "string_fragment"
                | "string_content"
                | "number"
                | "integer"
                | "float"
                | "escape_sequence"
                | "heredoc_body"
        )
}

fn param_count(node: Node<'_>) -> usize {
    let params = node
        .child_by_field_name("parameters")
        .or_else(|| node.child_by_field_name("parameter_list"));
    match params {
        Some(p) => p.named_child_count(),
        None => 0,
    }
}

fn has_leading_token(node: Node<'_>, source: &str, token: &str) -> bool {
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        if child.is_named() && !child.kind().contains("modifier") {
            // Flags precede the declaration head.
            break;
        }
        if child.kind() == token {
            return true;
        }
        if child.kind().contains("modifier") {
            if let Ok(text) = child.utf8_text(source.as_bytes()) {
                if text.split_whitespace().any(|t| t == token) {
                    return true;
                }
            }
        }
    }
    false
}

/// Tracks `{fingerprint → representative}` for one indexing run and reports
/// collisions between non-equal declarations. Diagnostic only.
#[derive(Debug, Default)]
pub struct CollisionTracker {
    seen: HashMap<String, (String, String)>,
    collisions: usize,
}

impl CollisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, fingerprint: &str, rel_path: &str, name: &str) {
        match self.seen.get(fingerprint) {
            Some((seen_path, seen_name)) if seen_path != rel_path || seen_name != name => {
                self.collisions += 1;
                warn!(
                    fingerprint,
                    first = %format!("{seen_path}:{seen_name}"),
                    second = %format!("{rel_path}:{name}"),
                    "fingerprint: collision between non-equal nodes"
                );
            }
            Some(_) => {}
            None => {
                self.seen.insert(
                    fingerprint.to_string(),
                    (rel_path.to_string(), name.to_string()),
                );
            }
        }
    }

    pub fn collisions(&self) -> usize {
        self.collisions
    }
}
