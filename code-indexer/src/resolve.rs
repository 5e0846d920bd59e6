//! Generic call resolution.
//!
//! Adapters may bind calls themselves; everything they decline falls through
//! here. Strategy order: namespace member, imported name, same-file unique
//! name, repo-wide unique name, ambiguous split, unresolved placeholder.

use crate::adapter::{ResolveCtx, ResolvedCall};
use crate::types::ExtractedCall;
use ledger_store::model::{ResolutionStrategy, UNRESOLVED_CALL_PREFIX};

pub const CONFIDENCE_EXACT: f64 = 1.0;
pub const CONFIDENCE_SAME_FILE: f64 = 0.9;
pub const CONFIDENCE_REPO_UNIQUE: f64 = 0.7;
pub const CONFIDENCE_AMBIGUOUS_BASE: f64 = 0.5;
pub const CONFIDENCE_UNRESOLVED: f64 = 0.2;

/// Placeholder target for a call that could not be bound.
pub fn unresolved_target(callee: &str) -> String {
    format!("{UNRESOLVED_CALL_PREFIX}{callee}")
}

pub fn resolve_call(call: &ExtractedCall, ctx: &ResolveCtx<'_>) -> ResolvedCall {
    // Namespace lookup wins.
    if let Some(receiver) = &call.receiver {
        if let Some(members) = ctx.namespaces.get(receiver) {
            if let Some(id) = members.get(&call.callee) {
                return ResolvedCall {
                    symbol_id: id.clone(),
                    confidence: CONFIDENCE_EXACT,
                    strategy: ResolutionStrategy::Namespace,
                    candidates: 1,
                };
            }
        }
    }

    if let Some(ids) = ctx.imported.get(&call.callee) {
        if ids.len() == 1 {
            return ResolvedCall {
                symbol_id: ids[0].clone(),
                confidence: CONFIDENCE_EXACT,
                strategy: ResolutionStrategy::Import,
                candidates: 1,
            };
        }
        if ids.len() > 1 {
            return ambiguous(ids);
        }
    }

    if let Some(ids) = ctx.same_file.get(&call.callee) {
        if ids.len() == 1 {
            return ResolvedCall {
                symbol_id: ids[0].clone(),
                confidence: CONFIDENCE_SAME_FILE,
                strategy: ResolutionStrategy::SameFile,
                candidates: 1,
            };
        }
    }

    if let Some(ids) = ctx.repo_names.get(&call.callee) {
        if ids.len() == 1 {
            return ResolvedCall {
                symbol_id: ids[0].clone(),
                confidence: CONFIDENCE_REPO_UNIQUE,
                strategy: ResolutionStrategy::RepoUnique,
                candidates: 1,
            };
        }
        if ids.len() > 1 {
            return ambiguous(ids);
        }
    }

    ResolvedCall {
        symbol_id: unresolved_target(&call.callee),
        confidence: CONFIDENCE_UNRESOLVED,
        strategy: ResolutionStrategy::Unresolved,
        candidates: 0,
    }
}

/// Several candidates: confidence is split, the lexicographically smallest
/// ID is picked so the result is machine-independent.
fn ambiguous(ids: &[String]) -> ResolvedCall {
    let target = ids
        .iter()
        .min()
        .expect("ambiguous resolution requires candidates")
        .clone();
    ResolvedCall {
        symbol_id: target,
        confidence: CONFIDENCE_AMBIGUOUS_BASE / ids.len() as f64,
        strategy: ResolutionStrategy::Ambiguous,
        candidates: ids.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CallKind;
    use std::collections::{BTreeMap, HashMap};

    fn call(callee: &str, receiver: Option<&str>) -> ExtractedCall {
        ExtractedCall {
            caller: None,
            callee: callee.to_string(),
            receiver: receiver.map(str::to_string),
            kind: if receiver.is_some() {
                CallKind::Method
            } else {
                CallKind::Function
            },
            line: 0,
            col: 0,
        }
    }

    struct Maps {
        imported: HashMap<String, Vec<String>>,
        namespaces: HashMap<String, BTreeMap<String, String>>,
        same_file: HashMap<String, Vec<String>>,
        repo_names: HashMap<String, Vec<String>>,
    }

    impl Maps {
        fn empty() -> Self {
            Self {
                imported: HashMap::new(),
                namespaces: HashMap::new(),
                same_file: HashMap::new(),
                repo_names: HashMap::new(),
            }
        }

        fn ctx(&self) -> ResolveCtx<'_> {
            ResolveCtx {
                imported: &self.imported,
                namespaces: &self.namespaces,
                same_file: &self.same_file,
                repo_names: &self.repo_names,
            }
        }
    }

    #[test]
    fn namespace_beats_import() {
        let mut maps = Maps::empty();
        maps.namespaces.insert(
            "ns".to_string(),
            BTreeMap::from([("f".to_string(), "id_ns_f".to_string())]),
        );
        maps.imported
            .insert("f".to_string(), vec!["id_import_f".to_string()]);

        let bound = resolve_call(&call("f", Some("ns")), &maps.ctx());
        assert_eq!(bound.symbol_id, "id_ns_f");
        assert_eq!(bound.strategy, ResolutionStrategy::Namespace);
        assert_eq!(bound.confidence, CONFIDENCE_EXACT);
    }

    #[test]
    fn confidence_table_matches_strategies() {
        let mut maps = Maps::empty();
        maps.imported
            .insert("a".to_string(), vec!["id_a".to_string()]);
        maps.same_file
            .insert("b".to_string(), vec!["id_b".to_string()]);
        maps.repo_names
            .insert("c".to_string(), vec!["id_c".to_string()]);
        maps.repo_names.insert(
            "d".to_string(),
            vec!["id_d2".to_string(), "id_d1".to_string()],
        );
        let ctx = maps.ctx();

        assert_eq!(resolve_call(&call("a", None), &ctx).confidence, 1.0);
        assert_eq!(resolve_call(&call("b", None), &ctx).confidence, 0.9);
        assert_eq!(resolve_call(&call("c", None), &ctx).confidence, 0.7);

        let amb = resolve_call(&call("d", None), &ctx);
        assert_eq!(amb.confidence, 0.25);
        assert_eq!(amb.candidates, 2);
        assert_eq!(amb.symbol_id, "id_d1");

        let missing = resolve_call(&call("nope", None), &ctx);
        assert_eq!(missing.strategy, ResolutionStrategy::Unresolved);
        assert_eq!(missing.symbol_id, "unresolved:call:nope");
        assert!(missing.confidence < 0.5);
    }
}
