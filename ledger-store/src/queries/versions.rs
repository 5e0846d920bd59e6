use crate::errors::Result;
use crate::rows::VersionRow;
use crate::store::Store;
use rusqlite::OptionalExtension;

/// Width of the zero-padded version counter. Keeps version IDs monotone in
/// lexicographic order without any wall-clock input.
const COUNTER_WIDTH: usize = 10;

/// Derive the next version ID from the previous one (`v0000000001`, ...).
pub fn next_version_id(prev: Option<&str>) -> String {
    let counter = prev
        .and_then(|p| p.strip_prefix('v'))
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("v{:0width$}", counter + 1, width = COUNTER_WIDTH)
}

impl Store {
    /// Latest version for a repo, if it has ever been indexed.
    pub fn get_latest_version(&self, repo_id: &str) -> Result<Option<VersionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT * FROM versions WHERE repo_id = ?1 ORDER BY version_id DESC LIMIT 1",
            )?;
            Ok(stmt.query_row([repo_id], VersionRow::from_row).optional()?)
        })
    }

    /// Allocate (but do not persist) the next version row for a repo.
    /// Persisting happens last inside [`Store::commit_index_run`].
    pub fn next_version(&self, repo_id: &str) -> Result<VersionRow> {
        let prev = self.get_latest_version(repo_id)?;
        Ok(VersionRow {
            version_id: next_version_id(prev.as_ref().map(|v| v.version_id.as_str())),
            repo_id: repo_id.to_string(),
            created_at: Self::now_iso(),
            parent: prev.map(|v| v.version_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ids_are_lexicographically_monotone() {
        let v1 = next_version_id(None);
        let v2 = next_version_id(Some(v1.as_str()));
        let v3 = next_version_id(Some(v2.as_str()));
        assert_eq!(v1, "v0000000001");
        assert!(v1 < v2 && v2 < v3);
    }
}
