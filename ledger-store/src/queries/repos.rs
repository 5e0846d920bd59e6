use crate::errors::{Error, Result};
use crate::rows::RepoRow;
use crate::store::Store;
use rusqlite::{OptionalExtension, params};

impl Store {
    pub fn get_repo(&self, repo_id: &str) -> Result<Option<RepoRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM repos WHERE repo_id = ?1")?;
            Ok(stmt
                .query_row([repo_id], RepoRow::from_row)
                .optional()?)
        })
    }

    pub fn create_repo(&self, repo_id: &str, root_path: &str, config_json: Option<&str>) -> Result<RepoRow> {
        let row = RepoRow {
            repo_id: repo_id.to_string(),
            root_path: root_path.to_string(),
            config_json: config_json.map(str::to_string),
            created_at: Self::now_iso(),
        };
        self.with_tx(|tx| {
            tx.execute(
                "INSERT OR IGNORE INTO repos(repo_id, root_path, config_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.repo_id, row.root_path, row.config_json, row.created_at],
            )?;
            Ok(())
        })?;
        Ok(row)
    }

    pub fn update_repo(&self, repo_id: &str, root_path: &str, config_json: Option<&str>) -> Result<()> {
        let changed = self.with_tx(|tx| {
            Ok(tx.execute(
                "UPDATE repos SET root_path = ?2, config_json = ?3 WHERE repo_id = ?1",
                params![repo_id, root_path, config_json],
            )?)
        })?;
        if changed == 0 {
            return Err(Error::NotFound(format!("repo {repo_id}")));
        }
        Ok(())
    }
}
