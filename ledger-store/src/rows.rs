//! Persisted row types, mirroring the table layout one to one.
//!
//! All IDs are opaque strings; timestamps are ISO-8601 text. Row structs are
//! serde-friendly so they can travel into caches and wire payloads unchanged.

use crate::model::{EdgeType, ResolutionStrategy, SymbolKind, SymbolRange, Visibility};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRow {
    pub repo_id: String,
    pub root_path: String,
    #[serde(default)]
    pub config_json: Option<String>,
    pub created_at: String,
}

impl RepoRow {
    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            repo_id: r.get("repo_id")?,
            root_path: r.get("root_path")?,
            config_json: r.get("config_json")?,
            created_at: r.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRow {
    pub version_id: String,
    pub repo_id: String,
    pub created_at: String,
    #[serde(default)]
    pub parent: Option<String>,
}

impl VersionRow {
    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            version_id: r.get("version_id")?,
            repo_id: r.get("repo_id")?,
            created_at: r.get("created_at")?,
            parent: r.get("parent")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRow {
    pub file_id: String,
    pub repo_id: String,
    pub rel_path: String,
    pub content_hash: String,
    pub language: String,
    pub bytes: i64,
    pub last_seen_version: String,
}

impl FileRow {
    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            file_id: r.get("file_id")?,
            repo_id: r.get("repo_id")?,
            rel_path: r.get("rel_path")?,
            content_hash: r.get("content_hash")?,
            language: r.get("language")?,
            bytes: r.get("bytes")?,
            last_seen_version: r.get("last_seen_version")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRow {
    pub symbol_id: String,
    pub repo_id: String,
    pub file_id: String,
    pub kind: SymbolKind,
    pub name: String,
    pub exported: bool,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    pub language: String,
    pub range: SymbolRange,
    pub ast_fingerprint: String,
    #[serde(default)]
    pub signature_json: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub invariants_json: Option<String>,
    #[serde(default)]
    pub side_effects_json: Option<String>,
    pub updated_at: String,
}

impl SymbolRow {
    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        let kind_raw: String = r.get("kind")?;
        let vis_raw: Option<String> = r.get("visibility")?;
        Ok(Self {
            symbol_id: r.get("symbol_id")?,
            repo_id: r.get("repo_id")?,
            file_id: r.get("file_id")?,
            kind: SymbolKind::parse(&kind_raw).unwrap_or(SymbolKind::Variable),
            name: r.get("name")?,
            exported: r.get("exported")?,
            visibility: vis_raw.as_deref().and_then(Visibility::parse),
            language: r.get("language")?,
            range: SymbolRange {
                start_line: r.get::<_, i64>("start_line")? as u32,
                start_col: r.get::<_, i64>("start_col")? as u32,
                end_line: r.get::<_, i64>("end_line")? as u32,
                end_col: r.get::<_, i64>("end_col")? as u32,
            },
            ast_fingerprint: r.get("ast_fingerprint")?,
            signature_json: r.get("signature_json")?,
            summary: r.get("summary")?,
            invariants_json: r.get("invariants_json")?,
            side_effects_json: r.get("side_effects_json")?,
            updated_at: r.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRow {
    pub repo_id: String,
    pub from_symbol_id: String,
    pub to_symbol_id: String,
    pub edge_type: EdgeType,
    pub weight: f64,
    pub confidence: f64,
    pub resolution_strategy: ResolutionStrategy,
    #[serde(default)]
    pub provenance: Option<String>,
    pub created_at: String,
}

impl EdgeRow {
    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        let type_raw: String = r.get("edge_type")?;
        let strategy_raw: String = r.get("resolution_strategy")?;
        Ok(Self {
            repo_id: r.get("repo_id")?,
            from_symbol_id: r.get("from_symbol_id")?,
            to_symbol_id: r.get("to_symbol_id")?,
            edge_type: EdgeType::parse(&type_raw).unwrap_or(EdgeType::Call),
            weight: r.get("weight")?,
            confidence: r.get("confidence")?,
            resolution_strategy: ResolutionStrategy::parse(&strategy_raw)
                .unwrap_or(ResolutionStrategy::Unresolved),
            provenance: r.get("provenance")?,
            created_at: r.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRow {
    pub symbol_id: String,
    pub fan_in: i64,
    pub fan_out: i64,
    pub churn30d: i64,
    #[serde(default)]
    pub test_refs_json: Option<String>,
}

impl MetricsRow {
    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            symbol_id: r.get("symbol_id")?,
            fan_in: r.get("fan_in")?,
            fan_out: r.get("fan_out")?,
            churn30d: r.get("churn30d")?,
            test_refs_json: r.get("test_refs_json")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceHandleRow {
    pub handle: String,
    pub repo_id: String,
    pub created_at: String,
    pub expires_at: String,
    #[serde(default)]
    pub min_version: Option<String>,
    pub max_version: String,
    pub slice_hash: String,
    /// Ordered slice members with their ETags, for delta refresh.
    #[serde(default)]
    pub members_json: Option<String>,
    /// Ordered dropped-symbol list written at truncation, paged by cursor.
    #[serde(default)]
    pub spillover_json: Option<String>,
}

impl SliceHandleRow {
    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            handle: r.get("handle")?,
            repo_id: r.get("repo_id")?,
            created_at: r.get("created_at")?,
            expires_at: r.get("expires_at")?,
            min_version: r.get("min_version")?,
            max_version: r.get("max_version")?,
            slice_hash: r.get("slice_hash")?,
            members_json: r.get("members_json")?,
            spillover_json: r.get("spillover_json")?,
        })
    }
}
