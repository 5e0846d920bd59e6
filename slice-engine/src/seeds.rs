//! Start-node resolution.
//!
//! Turns heterogeneous request inputs (explicit IDs, stack traces, failing
//! test paths, edited files, task text) into a scored, deduplicated seed
//! set. Each seed remembers its source so slice scoring and provenance
//! reporting stay explainable.

use crate::errors::Result;
use ledger_store::Store;
use ledger_store::model::UNRESOLVED_CALL_PREFIX;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// First-hop dependencies promoted per explicit entry.
const DEPS_PER_ENTRY: usize = 4;
/// Same-file siblings promoted per explicit entry.
const SIBLINGS_PER_ENTRY: usize = 3;
/// Shared-prefix length for sibling promotion.
const SIBLING_PREFIX: usize = 3;
/// Search bound per task-text token.
const MATCHES_PER_TOKEN: usize = 5;
/// Overall bound on task-text seeds.
const TASK_TEXT_LIMIT: usize = 20;
/// Overall bound on stack-trace seeds.
const STACK_TRACE_LIMIT: usize = 15;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "when", "where", "what", "why",
    "how", "have", "has", "are", "was", "were", "will", "would", "should", "could", "about",
    "after", "before", "then", "than", "them", "they", "there", "here", "not", "but", "all",
    "any", "can", "may", "its", "out", "our", "your", "fix", "bug", "add", "use", "make", "need",
];

/// Where a seed came from, in descending rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    EntrySymbol,
    EntryDependency,
    EntrySibling,
    StackTrace,
    FailingTest,
    EditedFile,
    TaskText,
}

/// Beam-score discount for first-hop dependencies promoted from an entry.
const DEPENDENCY_DISCOUNT: f64 = 0.75;
/// Beam-score discount for same-file siblings promoted from an entry.
const SIBLING_DISCOUNT: f64 = 0.6;

impl SeedSource {
    /// Source priority: entry=5, stack=4, test=3, edited=2, task=1. The two
    /// promoted tiers ride on their originating entry's priority; their
    /// lower rank comes from [`SeedSource::score`], not from the priority.
    pub fn priority(&self) -> u32 {
        use SeedSource::*;
        match self {
            EntrySymbol | EntryDependency | EntrySibling => 5,
            StackTrace => 4,
            FailingTest => 3,
            EditedFile => 2,
            TaskText => 1,
        }
    }

    /// Initial frontier score: the source-priority constant, discounted for
    /// the promoted entry tiers.
    pub fn score(&self) -> f64 {
        let base = f64::from(self.priority());
        match self {
            SeedSource::EntryDependency => base * DEPENDENCY_DISCOUNT,
            SeedSource::EntrySibling => base * SIBLING_DISCOUNT,
            _ => base,
        }
    }

    /// Provenance string surfaced in frontier reports.
    pub fn why(&self) -> &'static str {
        use SeedSource::*;
        match self {
            EntrySymbol => "entry symbol",
            EntryDependency => "entry dependency",
            EntrySibling => "entry sibling",
            StackTrace => "stack trace",
            FailingTest => "failing test",
            EditedFile => "edited file",
            TaskText => "task text",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seed {
    pub symbol_id: String,
    pub source: SeedSource,
    pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SeedInputs {
    pub entry_symbols: Vec<String>,
    pub stack_trace: Option<String>,
    pub failing_test_path: Option<String>,
    pub edited_files: Vec<String>,
    pub task_text: Option<String>,
}

impl SeedInputs {
    pub fn is_empty(&self) -> bool {
        self.entry_symbols.is_empty()
            && self.stack_trace.is_none()
            && self.failing_test_path.is_none()
            && self.edited_files.is_empty()
            && self.task_text.as_deref().map(str::trim).unwrap_or("").is_empty()
    }
}

/// Resolve all input sources into a deduplicated, deterministically ordered
/// seed list. Highest-priority source wins per symbol.
pub fn resolve_seeds(store: &Store, repo_id: &str, inputs: &SeedInputs) -> Result<Vec<Seed>> {
    let mut collected: Vec<Seed> = Vec::new();

    // 1. Explicit entries, plus promoted dependencies and siblings.
    for entry_id in &inputs.entry_symbols {
        let Some(row) = store.get_symbol(entry_id)? else {
            debug!(symbol = %entry_id, "seeds: unknown entry symbol skipped");
            continue;
        };
        push_seed(&mut collected, entry_id, SeedSource::EntrySymbol);

        let mut dep_count = 0;
        for edge in store.get_edges_from(entry_id)? {
            if dep_count >= DEPS_PER_ENTRY {
                break;
            }
            if edge.to_symbol_id.starts_with(UNRESOLVED_CALL_PREFIX) {
                continue;
            }
            push_seed(&mut collected, &edge.to_symbol_id, SeedSource::EntryDependency);
            dep_count += 1;
        }

        let prefix: String = row.name.chars().take(SIBLING_PREFIX).collect();
        if prefix.len() >= SIBLING_PREFIX {
            let mut siblings = store.get_symbols_by_file(&row.file_id)?;
            siblings.sort_by(|a, b| a.name.cmp(&b.name));
            let mut sibling_count = 0;
            for sibling in siblings {
                if sibling_count >= SIBLINGS_PER_ENTRY {
                    break;
                }
                if sibling.symbol_id == row.symbol_id || !sibling.name.starts_with(&prefix) {
                    continue;
                }
                push_seed(&mut collected, &sibling.symbol_id, SeedSource::EntrySibling);
                sibling_count += 1;
            }
        }
    }

    // 2. Stack-trace frames.
    if let Some(trace) = &inputs.stack_trace {
        let mut stack_seeds = 0;
        for name in frame_names(trace) {
            if stack_seeds >= STACK_TRACE_LIMIT {
                break;
            }
            for row in store.get_symbols_by_name(repo_id, &name)? {
                if stack_seeds >= STACK_TRACE_LIMIT {
                    break;
                }
                push_seed(&mut collected, &row.symbol_id, SeedSource::StackTrace);
                stack_seeds += 1;
            }
        }
    }

    // 3. Failing-test path.
    if let Some(test_path) = &inputs.failing_test_path {
        for row in symbols_in_path(store, repo_id, test_path)? {
            push_seed(&mut collected, &row, SeedSource::FailingTest);
        }
    }

    // 4. Edited files.
    for edited in &inputs.edited_files {
        for row in symbols_in_path(store, repo_id, edited)? {
            push_seed(&mut collected, &row, SeedSource::EditedFile);
        }
    }

    // 5. Task text tokens.
    if let Some(text) = &inputs.task_text {
        let mut task_seeds = 0;
        for token in task_tokens(text) {
            if task_seeds >= TASK_TEXT_LIMIT {
                break;
            }
            for row in store.search_symbols(repo_id, &token, MATCHES_PER_TOKEN)? {
                if task_seeds >= TASK_TEXT_LIMIT {
                    break;
                }
                push_seed(&mut collected, &row.symbol_id, SeedSource::TaskText);
                task_seeds += 1;
            }
        }
    }

    // Dedup: highest-priority source wins per symbol; within one priority
    // (the entry family) the better-scored tier wins.
    let mut best: HashMap<String, Seed> = HashMap::new();
    for seed in collected {
        match best.get(&seed.symbol_id) {
            Some(existing)
                if (existing.source.priority(), existing.score)
                    >= (seed.source.priority(), seed.score) => {}
            _ => {
                best.insert(seed.symbol_id.clone(), seed);
            }
        }
    }

    let mut seeds: Vec<Seed> = best.into_values().collect();
    seeds.sort_by(|a, b| {
        b.source
            .priority()
            .cmp(&a.source.priority())
            .then(b.score.total_cmp(&a.score))
            .then(a.symbol_id.cmp(&b.symbol_id))
    });
    debug!(count = seeds.len(), "seeds: resolved");
    Ok(seeds)
}

fn push_seed(out: &mut Vec<Seed>, symbol_id: &str, source: SeedSource) {
    out.push(Seed {
        symbol_id: symbol_id.to_string(),
        source,
        score: source.score(),
    });
}

fn symbols_in_path(store: &Store, repo_id: &str, path: &str) -> Result<Vec<String>> {
    let normalized = path.replace('\\', "/");
    let mut out = Vec::new();
    for file in store.get_files(repo_id)? {
        if file.rel_path == normalized || normalized.ends_with(&file.rel_path) {
            for row in store.get_symbols_by_file(&file.file_id)? {
                out.push(row.symbol_id);
            }
        }
    }
    Ok(out)
}

/// Candidate symbol names from stack-trace frame lines.
fn frame_names(trace: &str) -> Vec<String> {
    // `at obj.name (file:1:2)` (v8), `in name` (python), bare `name(...)`.
    let patterns = [
        Regex::new(r"at\s+(?:[A-Za-z_$][\w$]*\.)*([A-Za-z_$][\w$]*)\s*\(").expect("frame regex"),
        Regex::new(r"in\s+([A-Za-z_][\w]*)").expect("frame regex"),
        Regex::new(r"([A-Za-z_][\w]*)\s*\(").expect("frame regex"),
    ];
    let mut names = Vec::new();
    for line in trace.lines() {
        for pattern in &patterns {
            if let Some(captures) = pattern.captures(line) {
                if let Some(m) = captures.get(1) {
                    let name = m.as_str().to_string();
                    if !names.contains(&name) {
                        names.push(name);
                    }
                    break;
                }
            }
        }
    }
    names
}

/// Tokens worth searching: at least three chars, not a stop word.
fn task_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
        let token = raw.trim().to_string();
        if token.len() < 3 {
            continue;
        }
        if STOP_WORDS.contains(&token.to_ascii_lowercase().as_str()) {
            continue;
        }
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_names_cover_v8_and_python_styles() {
        let trace = "\
Error: boom
    at Parser.parseFile (src/parser.ts:10:5)
    at run (src/main.ts:3:1)
  File \"walker.py\", line 12, in descend
";
        let names = frame_names(trace);
        assert!(names.contains(&"parseFile".to_string()));
        assert!(names.contains(&"run".to_string()));
        assert!(names.contains(&"descend".to_string()));
    }

    #[test]
    fn task_tokens_drop_stop_words_and_short_tokens() {
        let tokens = task_tokens("fix the cache eviction bug in beam search");
        assert!(tokens.contains(&"cache".to_string()));
        assert!(tokens.contains(&"eviction".to_string()));
        assert!(tokens.contains(&"beam".to_string()));
        assert!(!tokens.iter().any(|t| t == "the" || t == "in" || t == "fix"));
    }

    #[test]
    fn priorities_follow_the_source_scale() {
        use SeedSource::*;
        assert_eq!(EntrySymbol.priority(), 5);
        assert_eq!(StackTrace.priority(), 4);
        assert_eq!(FailingTest.priority(), 3);
        assert_eq!(EditedFile.priority(), 2);
        assert_eq!(TaskText.priority(), 1);

        // Promotions share the entry priority; their rank drop is in score.
        assert_eq!(EntryDependency.priority(), EntrySymbol.priority());
        assert_eq!(EntrySibling.priority(), EntrySymbol.priority());
        assert!(EntryDependency.score() < EntrySymbol.score());
        assert!(EntrySibling.score() < EntryDependency.score());

        // Every promoted tier still outranks the next priority band.
        assert!(EntrySibling.priority() > StackTrace.priority());
    }
}
