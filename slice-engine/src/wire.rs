//! Compact wire formats for slices.
//!
//! Three negotiated versions share one in-memory model:
//! - v1: structural JSON mirroring the entity model;
//! - v2: per-slice path table, integer edge-type table, symbol index,
//!   positional card rows, frontier reference indices;
//! - v3: v2 with edges grouped per source symbol into
//!   `{from, c: [...], i: [...], cf: [...]}` records.
//!
//! Decoders are strict: mixed or malformed grouping is rejected, and the
//! v3→v2 expander lets older clients consume v3 payloads.

use crate::beam::FrontierItem;
use crate::cards::{DetailLevelMetadata, SymbolCard};
use crate::errors::{Error, Result};
use ledger_store::model::EdgeType;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Edge-type table shared by v2/v3; indices are part of the wire contract.
const EDGE_TYPE_TABLE: [EdgeType; 3] = [EdgeType::Call, EdgeType::Import, EdgeType::Config];

pub const DEFAULT_WIRE_VERSION: u8 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Truncation {
    pub truncated: bool,
    pub dropped: usize,
}

/// Assembled slice, the serializer's single source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slice {
    pub repo_id: String,
    pub version: String,
    pub cards: Vec<SymbolCard>,
    pub edges: Vec<SliceEdge>,
    pub frontier: Vec<FrontierItem>,
    pub truncation: Truncation,
    pub detail_level_metadata: DetailLevelMetadata,
}

/// Encode at the negotiated wire version. The emitted schema is exactly the
/// advertised one; mixed modes are forbidden.
pub fn encode(slice: &Slice, wire_version: u8) -> Result<Value> {
    match wire_version {
        1 => encode_v1(slice),
        2 => encode_v2(slice),
        3 => encode_v3(slice),
        other => Err(Error::MalformedWire(format!(
            "unsupported wire format version {other}"
        ))),
    }
}

fn encode_v1(slice: &Slice) -> Result<Value> {
    let mut value = serde_json::to_value(slice)?;
    if let Some(map) = value.as_object_mut() {
        map.insert("format_version".to_string(), json!(1));
    }
    Ok(value)
}

/// Index space shared by cards, edges and frontier rows in v2/v3.
struct Tables {
    paths: Vec<String>,
    symbols: Vec<String>,
    path_index: BTreeMap<String, usize>,
    symbol_index: BTreeMap<String, usize>,
}

fn build_tables(slice: &Slice) -> Tables {
    let mut paths: Vec<String> = Vec::new();
    let mut path_index = BTreeMap::new();
    let mut symbols: Vec<String> = Vec::new();
    let mut symbol_index = BTreeMap::new();

    let mut intern_symbol = |id: &str, symbols: &mut Vec<String>, index: &mut BTreeMap<String, usize>| {
        if !index.contains_key(id) {
            index.insert(id.to_string(), symbols.len());
            symbols.push(id.to_string());
        }
    };

    for card in &slice.cards {
        intern_symbol(&card.symbol_id, &mut symbols, &mut symbol_index);
        if !path_index.contains_key(&card.file) {
            path_index.insert(card.file.clone(), paths.len());
            paths.push(card.file.clone());
        }
    }
    for edge in &slice.edges {
        intern_symbol(&edge.from, &mut symbols, &mut symbol_index);
        intern_symbol(&edge.to, &mut symbols, &mut symbol_index);
    }
    for item in &slice.frontier {
        intern_symbol(&item.symbol_id, &mut symbols, &mut symbol_index);
    }

    Tables {
        paths,
        symbols,
        path_index,
        symbol_index,
    }
}

fn card_extra(card: &SymbolCard) -> Value {
    let mut extra = serde_json::Map::new();
    if let Some(sig) = &card.signature {
        extra.insert("signature".to_string(), json!(sig));
    }
    if let Some(deps) = &card.deps {
        extra.insert("deps".to_string(), json!(deps));
    }
    if let Some(summary) = &card.summary {
        extra.insert("summary".to_string(), json!(summary));
    }
    if let Some(invariants) = &card.invariants {
        extra.insert("invariants".to_string(), json!(invariants));
    }
    if let Some(side_effects) = &card.side_effects {
        extra.insert("side_effects".to_string(), json!(side_effects));
    }
    if let Some(metrics) = &card.metrics {
        extra.insert("metrics".to_string(), json!(metrics));
    }
    Value::Object(extra)
}

fn encode_positional(slice: &Slice, tables: &Tables) -> Result<(Vec<Value>, Vec<Value>)> {
    let mut cards = Vec::with_capacity(slice.cards.len());
    for card in &slice.cards {
        let sym_idx = tables.symbol_index[&card.symbol_id];
        let path_idx = tables.path_index[&card.file];
        cards.push(json!([
            sym_idx,
            card.name,
            card.kind.as_str(),
            path_idx,
            card.range.start_line,
            card.range.end_line,
            u8::from(card.exported),
            card.detail.as_str(),
            card.etag,
            card_extra(card),
        ]));
    }

    let mut frontier = Vec::with_capacity(slice.frontier.len());
    for item in &slice.frontier {
        frontier.push(json!([
            tables.symbol_index[&item.symbol_id],
            item.score,
            item.why,
        ]));
    }
    Ok((cards, frontier))
}

fn edge_type_index(edge_type: EdgeType) -> usize {
    EDGE_TYPE_TABLE
        .iter()
        .position(|t| *t == edge_type)
        .unwrap_or(0)
}

fn envelope(slice: &Slice, tables: &Tables, format_version: u8) -> Result<serde_json::Map<String, Value>> {
    let (cards, frontier) = encode_positional(slice, tables)?;
    let mut map = serde_json::Map::new();
    map.insert("format_version".to_string(), json!(format_version));
    map.insert("repo_id".to_string(), json!(slice.repo_id));
    map.insert("version".to_string(), json!(slice.version));
    map.insert("paths".to_string(), json!(tables.paths));
    map.insert(
        "edge_types".to_string(),
        json!(
            EDGE_TYPE_TABLE
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
        ),
    );
    map.insert("symbols".to_string(), json!(tables.symbols));
    map.insert("cards".to_string(), Value::Array(cards));
    map.insert("frontier".to_string(), Value::Array(frontier));
    map.insert("truncation".to_string(), serde_json::to_value(&slice.truncation)?);
    map.insert(
        "detail_level_metadata".to_string(),
        serde_json::to_value(&slice.detail_level_metadata)?,
    );
    Ok(map)
}

fn encode_v2(slice: &Slice) -> Result<Value> {
    let tables = build_tables(slice);
    let mut map = envelope(slice, &tables, 2)?;
    let mut edges = Vec::with_capacity(slice.edges.len());
    for edge in &slice.edges {
        edges.push(json!([
            tables.symbol_index[&edge.from],
            tables.symbol_index[&edge.to],
            edge_type_index(edge.edge_type),
            edge.confidence,
        ]));
    }
    map.insert("edges".to_string(), Value::Array(edges));
    Ok(Value::Object(map))
}

fn encode_v3(slice: &Slice) -> Result<Value> {
    let tables = build_tables(slice);
    let mut map = envelope(slice, &tables, 3)?;

    // Group by source symbol; groups sorted by `from`, targets sorted.
    let mut groups: BTreeMap<usize, (Vec<usize>, Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for edge in &slice.edges {
        let from = tables.symbol_index[&edge.from];
        let to = tables.symbol_index[&edge.to];
        let group = groups.entry(from).or_default();
        match edge.edge_type {
            EdgeType::Call => group.0.push(to),
            EdgeType::Import => group.1.push(to),
            EdgeType::Config => group.2.push(to),
        }
    }
    let mut records = Vec::with_capacity(groups.len());
    for (from, (mut calls, mut imports, mut configs)) in groups {
        calls.sort_unstable();
        imports.sort_unstable();
        configs.sort_unstable();
        let mut record = serde_json::Map::new();
        record.insert("from".to_string(), json!(from));
        if !calls.is_empty() {
            record.insert("c".to_string(), json!(calls));
        }
        if !imports.is_empty() {
            record.insert("i".to_string(), json!(imports));
        }
        if !configs.is_empty() {
            record.insert("cf".to_string(), json!(configs));
        }
        records.push(Value::Object(record));
    }
    map.insert("edge_groups".to_string(), Value::Array(records));
    Ok(Value::Object(map))
}

/// Expand a v3 payload to v2 so older clients can consume it.
pub fn expand_v3_to_v2(payload: &Value) -> Result<Value> {
    let map = payload
        .as_object()
        .ok_or_else(|| Error::MalformedWire("payload is not an object".into()))?;
    if map.get("format_version").and_then(Value::as_u64) != Some(3) {
        return Err(Error::MalformedWire("expander requires format_version 3".into()));
    }
    let symbol_count = map
        .get("symbols")
        .and_then(Value::as_array)
        .map(|a| a.len())
        .ok_or_else(|| Error::MalformedWire("missing symbols table".into()))?;
    if map.contains_key("edges") {
        return Err(Error::MalformedWire(
            "mixed grouping: v3 payload carries flat edges".into(),
        ));
    }

    let groups = decode_v3_groups(map, symbol_count)?;
    let mut out = map.clone();
    out.remove("edge_groups");
    out.insert("format_version".to_string(), json!(2));
    let mut edges = Vec::new();
    for (from, to, type_idx) in groups {
        edges.push(json!([from, to, type_idx]));
    }
    out.insert("edges".to_string(), Value::Array(edges));
    Ok(Value::Object(out))
}

/// Validated `(from, to, type index)` triples out of v3 edge groups.
fn decode_v3_groups(
    map: &serde_json::Map<String, Value>,
    symbol_count: usize,
) -> Result<Vec<(usize, usize, usize)>> {
    let records = map
        .get("edge_groups")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedWire("missing edge_groups".into()))?;

    let mut out = Vec::new();
    let mut last_from: Option<usize> = None;
    for record in records {
        let record = record
            .as_object()
            .ok_or_else(|| Error::MalformedWire("edge group is not an object".into()))?;
        for key in record.keys() {
            if !matches!(key.as_str(), "from" | "c" | "i" | "cf") {
                return Err(Error::MalformedWire(format!(
                    "unknown edge-group key: {key}"
                )));
            }
        }
        let from = record
            .get("from")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::MalformedWire("edge group missing 'from'".into()))?
            as usize;
        if from >= symbol_count {
            return Err(Error::MalformedWire(format!(
                "edge group 'from' {from} out of range"
            )));
        }
        if let Some(prev) = last_from {
            if from <= prev {
                return Err(Error::MalformedWire(
                    "edge groups must be strictly sorted by 'from'".into(),
                ));
            }
        }
        last_from = Some(from);

        for (key, type_idx) in [("c", 0usize), ("i", 1), ("cf", 2)] {
            let Some(targets) = record.get(key) else { continue };
            let targets = targets
                .as_array()
                .ok_or_else(|| Error::MalformedWire(format!("'{key}' is not an array")))?;
            for target in targets {
                let to = target
                    .as_u64()
                    .ok_or_else(|| Error::MalformedWire(format!("'{key}' target is not an index")))?
                    as usize;
                if to >= symbol_count {
                    return Err(Error::MalformedWire(format!(
                        "edge target {to} out of range"
                    )));
                }
                out.push((from, to, type_idx));
            }
        }
    }
    Ok(out)
}

/// Decode `(from, to, type)` edges from any wire version; used by clients
/// and round-trip tests.
pub fn decode_edges(payload: &Value) -> Result<Vec<(String, String, EdgeType)>> {
    let map = payload
        .as_object()
        .ok_or_else(|| Error::MalformedWire("payload is not an object".into()))?;
    let format = map
        .get("format_version")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::MalformedWire("missing format_version".into()))?;

    match format {
        1 => {
            let edges = map
                .get("edges")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::MalformedWire("missing edges".into()))?;
            let mut out = Vec::new();
            for edge in edges {
                let edge: SliceEdge = serde_json::from_value(edge.clone())?;
                out.push((edge.from, edge.to, edge.edge_type));
            }
            Ok(out)
        }
        2 => {
            if map.contains_key("edge_groups") {
                return Err(Error::MalformedWire(
                    "mixed grouping: v2 payload carries edge_groups".into(),
                ));
            }
            let symbols = decode_symbols(map)?;
            let edges = map
                .get("edges")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::MalformedWire("missing edges".into()))?;
            let mut out = Vec::new();
            for edge in edges {
                let row = edge
                    .as_array()
                    .filter(|a| a.len() >= 3)
                    .ok_or_else(|| Error::MalformedWire("edge row is not a tuple".into()))?;
                let from = index_into(&symbols, &row[0])?;
                let to = index_into(&symbols, &row[1])?;
                let type_idx = row[2]
                    .as_u64()
                    .ok_or_else(|| Error::MalformedWire("edge type is not an index".into()))?
                    as usize;
                let edge_type = *EDGE_TYPE_TABLE
                    .get(type_idx)
                    .ok_or_else(|| Error::MalformedWire("edge type index out of range".into()))?;
                out.push((from, to, edge_type));
            }
            Ok(out)
        }
        3 => {
            if map.contains_key("edges") {
                return Err(Error::MalformedWire(
                    "mixed grouping: v3 payload carries flat edges".into(),
                ));
            }
            let symbols = decode_symbols(map)?;
            let groups = decode_v3_groups(map, symbols.len())?;
            Ok(groups
                .into_iter()
                .map(|(from, to, type_idx)| {
                    (
                        symbols[from].clone(),
                        symbols[to].clone(),
                        EDGE_TYPE_TABLE[type_idx],
                    )
                })
                .collect())
        }
        other => Err(Error::MalformedWire(format!(
            "unsupported format_version {other}"
        ))),
    }
}

/// Card order (symbol IDs) from any wire version.
pub fn decode_card_order(payload: &Value) -> Result<Vec<String>> {
    let map = payload
        .as_object()
        .ok_or_else(|| Error::MalformedWire("payload is not an object".into()))?;
    let format = map
        .get("format_version")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::MalformedWire("missing format_version".into()))?;
    let cards = map
        .get("cards")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedWire("missing cards".into()))?;

    match format {
        1 => cards
            .iter()
            .map(|c| {
                c.get("symbol_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::MalformedWire("card missing symbol_id".into()))
            })
            .collect(),
        2 | 3 => {
            let symbols = decode_symbols(map)?;
            cards
                .iter()
                .map(|c| {
                    let row = c
                        .as_array()
                        .filter(|a| !a.is_empty())
                        .ok_or_else(|| Error::MalformedWire("card row is not a tuple".into()))?;
                    index_into(&symbols, &row[0])
                })
                .collect()
        }
        other => Err(Error::MalformedWire(format!(
            "unsupported format_version {other}"
        ))),
    }
}

fn decode_symbols(map: &serde_json::Map<String, Value>) -> Result<Vec<String>> {
    map.get("symbols")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::MalformedWire("missing symbols table".into()))?
        .iter()
        .map(|s| {
            s.as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::MalformedWire("symbol entry is not a string".into()))
        })
        .collect()
}

fn index_into(symbols: &[String], value: &Value) -> Result<String> {
    let idx = value
        .as_u64()
        .ok_or_else(|| Error::MalformedWire("expected symbol index".into()))? as usize;
    symbols
        .get(idx)
        .cloned()
        .ok_or_else(|| Error::MalformedWire(format!("symbol index {idx} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardDetailDecision, DetailLevel, SymbolCard};
    use ledger_store::model::{SymbolKind, SymbolRange};

    fn card(id: &str, file: &str) -> SymbolCard {
        SymbolCard {
            symbol_id: id.to_string(),
            name: format!("name_{id}"),
            kind: SymbolKind::Function,
            file: file.to_string(),
            range: SymbolRange::new(0, 0, 3, 1),
            exported: true,
            version: "v0000000001".to_string(),
            detail: DetailLevel::Compact,
            signature: Some("fn x()".to_string()),
            deps: None,
            summary: None,
            invariants: None,
            side_effects: None,
            metrics: None,
            etag: format!("etag_{id}"),
        }
    }

    fn fixture() -> Slice {
        Slice {
            repo_id: "r1".to_string(),
            version: "v0000000001".to_string(),
            cards: vec![card("id_a", "a.ts"), card("id_b", "b.ts")],
            edges: vec![
                SliceEdge {
                    from: "id_b".to_string(),
                    to: "id_a".to_string(),
                    edge_type: EdgeType::Call,
                    confidence: 1.0,
                },
                SliceEdge {
                    from: "id_b".to_string(),
                    to: "id_a".to_string(),
                    edge_type: EdgeType::Import,
                    confidence: 1.0,
                },
            ],
            frontier: vec![],
            truncation: Truncation {
                truncated: false,
                dropped: 0,
            },
            detail_level_metadata: DetailLevelMetadata {
                requested: DetailLevel::Compact,
                effective: DetailLevel::Compact,
                budget_adaptive: false,
                per_card: vec![CardDetailDecision {
                    symbol_id: "id_a".to_string(),
                    requested: DetailLevel::Compact,
                    effective: DetailLevel::Compact,
                    downgraded: false,
                }],
            },
        }
    }

    #[test]
    fn all_versions_agree_on_edges_and_card_order() {
        let slice = fixture();
        let v1 = encode(&slice, 1).unwrap();
        let v2 = encode(&slice, 2).unwrap();
        let v3 = encode(&slice, 3).unwrap();

        let mut e1 = decode_edges(&v1).unwrap();
        let mut e2 = decode_edges(&v2).unwrap();
        let mut e3 = decode_edges(&v3).unwrap();
        e1.sort();
        e2.sort();
        e3.sort();
        assert_eq!(e1, e2);
        assert_eq!(e2, e3);

        assert_eq!(decode_card_order(&v1).unwrap(), decode_card_order(&v2).unwrap());
        assert_eq!(decode_card_order(&v2).unwrap(), decode_card_order(&v3).unwrap());
    }

    #[test]
    fn expander_recovers_v2_from_v3() {
        let slice = fixture();
        let v3 = encode(&slice, 3).unwrap();
        let expanded = expand_v3_to_v2(&v3).unwrap();

        assert_eq!(
            expanded.get("format_version").and_then(Value::as_u64),
            Some(2)
        );
        let mut from_v3 = decode_edges(&expanded).unwrap();
        let mut from_v2 = decode_edges(&encode(&slice, 2).unwrap()).unwrap();
        from_v3.sort();
        from_v2.sort();
        assert_eq!(from_v3, from_v2);
    }

    #[test]
    fn malformed_v3_groups_are_rejected() {
        let slice = fixture();
        let mut v3 = encode(&slice, 3).unwrap();

        // Unknown key in a group.
        let map = v3.as_object_mut().unwrap();
        let groups = map.get_mut("edge_groups").unwrap().as_array_mut().unwrap();
        groups[0]
            .as_object_mut()
            .unwrap()
            .insert("bogus".to_string(), json!([1]));
        assert!(decode_edges(&v3).is_err());

        // Mixed grouping: flat edges inside a v3 payload.
        let mut mixed = encode(&slice, 3).unwrap();
        mixed
            .as_object_mut()
            .unwrap()
            .insert("edges".to_string(), json!([[0, 1, 0]]));
        assert!(decode_edges(&mixed).is_err());

        // Target index out of range.
        let mut oob = encode(&slice, 3).unwrap();
        let map = oob.as_object_mut().unwrap();
        let groups = map.get_mut("edge_groups").unwrap().as_array_mut().unwrap();
        groups[0]
            .as_object_mut()
            .unwrap()
            .insert("c".to_string(), json!([999]));
        assert!(decode_edges(&oob).is_err());
    }

    #[test]
    fn unknown_wire_version_is_refused() {
        let slice = fixture();
        assert!(encode(&slice, 4).is_err());
    }
}
