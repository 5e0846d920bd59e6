use crate::errors::Result;
use crate::rows::MetricsRow;
use crate::store::{Store, WRITE_BATCH};
use rusqlite::OptionalExtension;

impl Store {
    pub fn get_metrics(&self, symbol_id: &str) -> Result<Option<MetricsRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT * FROM metrics WHERE symbol_id = ?1")?;
            Ok(stmt
                .query_row([symbol_id], MetricsRow::from_row)
                .optional()?)
        })
    }

    pub fn get_metrics_by_ids(&self, ids: &[String]) -> Result<Vec<MetricsRow>> {
        self.with_conn(|conn| {
            let mut out = Vec::new();
            for chunk in ids.chunks(WRITE_BATCH) {
                let placeholders = vec!["?"; chunk.len()].join(",");
                let sql = format!("SELECT * FROM metrics WHERE symbol_id IN ({placeholders})");
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(
                        rusqlite::params_from_iter(chunk.iter()),
                        MetricsRow::from_row,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                out.extend(rows);
            }
            Ok(out)
        })
    }
}
