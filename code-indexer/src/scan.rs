//! Filesystem scanning with ignore globs and size/language filters.

use crate::errors::{Error, Result};
use crate::languages::{LanguageKind, detect_language};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
pub struct ScanFilters {
    /// Glob patterns to ignore, in addition to the coarse directory filter.
    pub ignore: Vec<String>,
    /// Workspace globs; when non-empty, only matching files are candidates.
    pub workspaces: Vec<String>,
    /// Restrict to these languages; empty means all built-ins.
    pub languages: Vec<LanguageKind>,
    pub max_file_bytes: u64,
}

impl Default for ScanFilters {
    fn default() -> Self {
        Self {
            ignore: vec![
                String::from("**/.git/**"),
                String::from("**/node_modules/**"),
                String::from("**/build/**"),
                String::from("**/target/**"),
                String::from("**/dist/**"),
            ],
            workspaces: Vec::new(),
            languages: Vec::new(),
            max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub abs_path: PathBuf,
    /// Repo-relative path with `/` separators (portable key).
    pub rel_path: String,
    pub language: LanguageKind,
    pub size: u64,
}

pub fn scan_repo(root: &Path, filters: &ScanFilters) -> Result<Vec<ScannedFile>> {
    if !root.exists() {
        return Err(Error::Scan(format!(
            "root does not exist: {}",
            root.display()
        )));
    }
    let root = dunce::canonicalize(root)?;

    let ignore_set = build_globset(&filters.ignore);
    let workspace_set = build_globset(&filters.workspaces);

    let mut skipped_ignored = 0usize;
    let mut skipped_too_big = 0usize;
    let mut skipped_language = 0usize;
    let mut files = Vec::<ScannedFile>::new();

    let walker = WalkDir::new(&root)
        .follow_links(true)
        .into_iter()
        .filter_entry(keep_entry);

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let rel_path = relative_key(&root, path);

        if let Some(set) = &ignore_set {
            if set.is_match(&rel_path) || set.is_match(path) {
                skipped_ignored += 1;
                continue;
            }
        }
        if let Some(set) = &workspace_set {
            if !set.is_match(&rel_path) {
                skipped_ignored += 1;
                continue;
            }
        }

        let Some(language) = detect_language(path) else {
            continue;
        };
        if !filters.languages.is_empty() && !filters.languages.contains(&language) {
            skipped_language += 1;
            continue;
        }

        let size = match std::fs::metadata(path) {
            Ok(m) => m.len(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "scan: metadata failed");
                continue;
            }
        };
        if size > filters.max_file_bytes {
            skipped_too_big += 1;
            debug!(path = %path.display(), size, "scan: skip oversized file");
            continue;
        }

        files.push(ScannedFile {
            abs_path: path.to_path_buf(),
            rel_path,
            language,
            size,
        });
    }

    // Deterministic order regardless of directory iteration.
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    info!(
        total = files.len(),
        ignored = skipped_ignored,
        too_big = skipped_too_big,
        filtered_language = skipped_language,
        "scan: done"
    );
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(g) => {
                builder.add(g);
            }
            Err(err) => warn!(pattern = %pattern, error = %err, "scan: invalid glob pattern"),
        }
    }
    builder.build().ok()
}

/// Coarse directory filter to avoid descending into heavy/vendor folders.
fn keep_entry(entry: &DirEntry) -> bool {
    if entry.file_type().is_dir() {
        if let Some(name) = entry.file_name().to_str() {
            return !matches!(
                name,
                ".git" | "node_modules" | "target" | "dist" | ".idea" | ".vscode" | "__pycache__"
            );
        }
    }
    true
}

fn relative_key(root: &Path, path: &Path) -> String {
    let rel = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_applies_ignore_and_language_filters() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "export const x = 1;\n").unwrap();
        std::fs::write(dir.path().join("b.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "no language\n").unwrap();
        std::fs::create_dir_all(dir.path().join("vendor")).unwrap();
        std::fs::write(dir.path().join("vendor/c.ts"), "export const y = 2;\n").unwrap();

        let filters = ScanFilters {
            ignore: vec![String::from("vendor/**")],
            languages: vec![LanguageKind::TypeScript],
            ..Default::default()
        };
        let files = scan_repo(dir.path(), &filters).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["a.ts"]);
    }

    #[test]
    fn scan_orders_results_deterministically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["z.ts", "a.ts", "m.ts"] {
            std::fs::write(dir.path().join(name), "export const x = 1;\n").unwrap();
        }
        let files = scan_repo(dir.path(), &ScanFilters::default()).unwrap();
        let rels: Vec<&str> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(rels, vec!["a.ts", "m.ts", "z.ts"]);
    }
}
