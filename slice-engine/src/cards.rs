//! Symbol-card projection and detail-level management.
//!
//! A card is the projected summary of one symbol at a detail level. The
//! serializer may downgrade the whole slice when the requested level would
//! blow the token budget; every decision is reported in
//! [`DetailLevelMetadata`].

use crate::errors::Result;
use crate::graph::EdgeData;
use code_indexer::ids;
use ledger_store::model::{EdgeType, SymbolKind, SymbolRange};
use ledger_store::rows::{MetricsRow, SymbolRow};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Dependency list cap at the full detail level.
pub const DEPS_CAP_FULL: usize = 24;
/// Dependency list cap at lightweight levels.
pub const DEPS_CAP_LIGHT: usize = 6;

/// Ordered detail levels: `minimal < signature < deps < compact < full`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Minimal,
    Signature,
    Deps,
    Compact,
    Full,
}

impl DetailLevel {
    pub fn as_str(&self) -> &'static str {
        use DetailLevel::*;
        match self {
            Minimal => "minimal",
            Signature => "signature",
            Deps => "deps",
            Compact => "compact",
            Full => "full",
        }
    }

    pub fn step_down(&self) -> Option<DetailLevel> {
        use DetailLevel::*;
        match self {
            Minimal => None,
            Signature => Some(Minimal),
            Deps => Some(Signature),
            Compact => Some(Deps),
            Full => Some(Compact),
        }
    }
}

impl FromStr for DetailLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        use DetailLevel::*;
        Ok(match s {
            "minimal" => Minimal,
            "signature" => Signature,
            "deps" => Deps,
            "compact" => Compact,
            "full" => Full,
            other => return Err(format!("unknown detail level: {other}")),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CardDeps {
    pub imports: Vec<String>,
    pub calls: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CardMetrics {
    pub fan_in: i64,
    pub fan_out: i64,
    pub churn30d: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolCard {
    pub symbol_id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    pub range: SymbolRange,
    pub exported: bool,
    pub version: String,
    pub detail: DetailLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deps: Option<CardDeps>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invariants: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CardMetrics>,
    pub etag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetailDecision {
    pub symbol_id: String,
    pub requested: DetailLevel,
    pub effective: DetailLevel,
    pub downgraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailLevelMetadata {
    pub requested: DetailLevel,
    pub effective: DetailLevel,
    pub budget_adaptive: bool,
    pub per_card: Vec<CardDetailDecision>,
}

/// Project one symbol row into a card at `level`. The ETag hashes the
/// canonicalized payload (ETag field excluded), keyed by symbol and version.
pub fn project_card(
    row: &SymbolRow,
    rel_path: &str,
    out_edges: &[(&str, EdgeData)],
    metrics: Option<&MetricsRow>,
    level: DetailLevel,
    version_id: &str,
) -> Result<SymbolCard> {
    let mut card = SymbolCard {
        symbol_id: row.symbol_id.clone(),
        name: row.name.clone(),
        kind: row.kind,
        file: rel_path.to_string(),
        range: row.range,
        exported: row.exported,
        version: version_id.to_string(),
        detail: level,
        signature: None,
        deps: None,
        summary: None,
        invariants: None,
        side_effects: None,
        metrics: None,
        etag: String::new(),
    };

    if level >= DetailLevel::Signature {
        card.signature = parse_signature(row);
    }
    if level >= DetailLevel::Deps {
        let cap = if level >= DetailLevel::Full {
            DEPS_CAP_FULL
        } else {
            DEPS_CAP_LIGHT
        };
        let mut deps = CardDeps::default();
        for (to, edge) in out_edges {
            let bucket = match edge.edge_type {
                EdgeType::Import => &mut deps.imports,
                EdgeType::Call => &mut deps.calls,
                EdgeType::Config => continue,
            };
            if bucket.len() < cap {
                bucket.push((*to).to_string());
            }
        }
        card.deps = Some(deps);
    }
    if level >= DetailLevel::Compact {
        card.summary = row.summary.as_ref().map(|s| trim_text(s, 200));
        card.invariants = parse_string_list(row.invariants_json.as_deref(), level)?;
        card.side_effects = parse_string_list(row.side_effects_json.as_deref(), level)?;
    }
    if level >= DetailLevel::Full {
        card.metrics = metrics.map(|m| CardMetrics {
            fan_in: m.fan_in,
            fan_out: m.fan_out,
            churn30d: m.churn30d,
        });
    }

    card.etag = compute_etag(&card, version_id)?;
    Ok(card)
}

/// ETag over the canonicalized card payload at its effective detail level.
pub fn compute_etag(card: &SymbolCard, version_id: &str) -> Result<String> {
    let mut value = serde_json::to_value(card)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("etag");
    }
    Ok(ids::card_etag(&card.symbol_id, version_id, &value.to_string()))
}

/// Size-based token estimate for a symbol at a level, without projecting.
pub fn estimate_tokens(row: &SymbolRow, level: DetailLevel) -> usize {
    let mut tokens = 32 + (row.name.len() + row.symbol_id.len()) / 4 + 8;
    if level >= DetailLevel::Signature {
        tokens += 24
            + row
                .signature_json
                .as_ref()
                .map(|s| s.len() / 4)
                .unwrap_or(0);
    }
    if level >= DetailLevel::Deps {
        // Dep lists hold opaque 32-hex IDs, ~10 tokens apiece at the cap.
        tokens += 12 + 10 * DEPS_CAP_LIGHT;
    }
    if level >= DetailLevel::Compact {
        tokens += 64
            + row.summary.as_ref().map(|s| s.len() / 4).unwrap_or(0)
            + row
                .invariants_json
                .as_ref()
                .map(|s| s.len() / 4)
                .unwrap_or(0);
    }
    if level >= DetailLevel::Full {
        tokens += 32;
    }
    tokens
}

/// Pick the highest detail level whose summed estimate fits the budget.
/// Returns the effective level and whether a downgrade happened.
pub fn fit_level(
    rows: &[&SymbolRow],
    requested: DetailLevel,
    max_tokens: usize,
    base_overhead: usize,
) -> (DetailLevel, bool) {
    let mut level = requested;
    loop {
        let total: usize = base_overhead
            + rows
                .iter()
                .map(|r| estimate_tokens(r, level))
                .sum::<usize>();
        if total <= max_tokens {
            return (level, level != requested);
        }
        match level.step_down() {
            Some(lower) => level = lower,
            None => return (DetailLevel::Minimal, requested != DetailLevel::Minimal),
        }
    }
}

fn parse_signature(row: &SymbolRow) -> Option<String> {
    let raw = row.signature_json.as_deref()?;
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value
        .get("text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
}

fn parse_string_list(
    raw: Option<&str>,
    level: DetailLevel,
) -> Result<Option<Vec<String>>> {
    let Some(raw) = raw else { return Ok(None) };
    let mut list: Vec<String> = serde_json::from_str(raw)?;
    // Compact trims; full keeps the whole array.
    if level < DetailLevel::Full {
        list.truncate(4);
        for item in &mut list {
            *item = trim_text(item, 120);
        }
    }
    Ok(Some(list))
}

fn trim_text(text: &str, max: usize) -> String {
    let mut out = text.trim().to_string();
    if out.len() > max {
        let mut cut = max;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_store::model::SymbolKind;

    fn row() -> SymbolRow {
        SymbolRow {
            symbol_id: "id_add".to_string(),
            repo_id: "r1".to_string(),
            file_id: "f1".to_string(),
            kind: SymbolKind::Function,
            name: "add".to_string(),
            exported: true,
            visibility: None,
            language: "typescript".to_string(),
            range: SymbolRange::new(0, 0, 0, 46),
            ast_fingerprint: "fp".to_string(),
            signature_json: Some(r#"{"text":"export function add(a:number,b:number)"}"#.to_string()),
            summary: Some("adds two numbers".to_string()),
            invariants_json: None,
            side_effects_json: None,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn levels_are_strictly_ordered() {
        assert!(DetailLevel::Minimal < DetailLevel::Signature);
        assert!(DetailLevel::Signature < DetailLevel::Deps);
        assert!(DetailLevel::Deps < DetailLevel::Compact);
        assert!(DetailLevel::Compact < DetailLevel::Full);
    }

    #[test]
    fn estimates_grow_with_level() {
        let r = row();
        let mut last = 0;
        for level in [
            DetailLevel::Minimal,
            DetailLevel::Signature,
            DetailLevel::Deps,
            DetailLevel::Compact,
            DetailLevel::Full,
        ] {
            let estimate = estimate_tokens(&r, level);
            assert!(estimate > last, "estimate must grow at {level:?}");
            last = estimate;
        }
    }

    #[test]
    fn minimal_card_has_no_optional_sections() {
        let r = row();
        let card =
            project_card(&r, "a.ts", &[], None, DetailLevel::Minimal, "v0000000001").unwrap();
        assert!(card.signature.is_none());
        assert!(card.deps.is_none());
        assert!(card.summary.is_none());
        assert!(card.metrics.is_none());
        assert!(!card.etag.is_empty());
    }

    #[test]
    fn compact_card_carries_signature_and_summary() {
        let r = row();
        let card =
            project_card(&r, "a.ts", &[], None, DetailLevel::Compact, "v0000000001").unwrap();
        assert_eq!(
            card.signature.as_deref(),
            Some("export function add(a:number,b:number)")
        );
        assert_eq!(card.summary.as_deref(), Some("adds two numbers"));
    }

    #[test]
    fn etag_is_stable_per_level_and_changes_across_levels() {
        let r = row();
        let a1 = project_card(&r, "a.ts", &[], None, DetailLevel::Compact, "v1").unwrap();
        let a2 = project_card(&r, "a.ts", &[], None, DetailLevel::Compact, "v1").unwrap();
        let b = project_card(&r, "a.ts", &[], None, DetailLevel::Minimal, "v1").unwrap();
        assert_eq!(a1.etag, a2.etag);
        assert_ne!(a1.etag, b.etag);

        // Version participates in the key.
        let c = project_card(&r, "a.ts", &[], None, DetailLevel::Compact, "v2").unwrap();
        assert_ne!(a1.etag, c.etag);
    }

    #[test]
    fn fit_level_downgrades_until_budget_fits() {
        let r = row();
        let rows = vec![&r];
        let (effective, downgraded) = fit_level(&rows, DetailLevel::Compact, 5_000, 64);
        assert_eq!(effective, DetailLevel::Compact);
        assert!(!downgraded);

        let (effective, downgraded) = fit_level(&rows, DetailLevel::Compact, 200, 64);
        assert!(effective <= DetailLevel::Signature);
        assert!(downgraded);
    }
}
