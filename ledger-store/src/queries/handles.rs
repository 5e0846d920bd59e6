use crate::errors::Result;
use crate::rows::SliceHandleRow;
use crate::store::Store;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

impl Store {
    pub fn create_slice_handle(&self, row: &SliceHandleRow) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT OR REPLACE INTO slice_handles(
                     handle, repo_id, created_at, expires_at,
                     min_version, max_version, slice_hash, members_json, spillover_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    row.handle,
                    row.repo_id,
                    row.created_at,
                    row.expires_at,
                    row.min_version,
                    row.max_version,
                    row.slice_hash,
                    row.members_json,
                    row.spillover_json
                ],
            )?;
            Ok(())
        })
    }

    /// Read a handle. An expired row is garbage-collected on read and
    /// reported as absent.
    pub fn get_slice_handle(&self, handle: &str, now_iso: &str) -> Result<Option<SliceHandleRow>> {
        let row = self.with_conn(|conn| {
            let mut stmt =
                conn.prepare_cached("SELECT * FROM slice_handles WHERE handle = ?1")?;
            Ok(stmt
                .query_row([handle], SliceHandleRow::from_row)
                .optional()?)
        })?;
        match row {
            Some(r) if r.expires_at.as_str() <= now_iso => {
                self.delete_slice_handle(handle)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Renew a handle's lease and (optionally) move it to a new version with
    /// fresh members.
    pub fn refresh_slice_handle(
        &self,
        handle: &str,
        expires_at: &str,
        max_version: &str,
        slice_hash: &str,
        members_json: Option<&str>,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE slice_handles
                 SET expires_at = ?2, max_version = ?3, slice_hash = ?4,
                     members_json = COALESCE(?5, members_json)
                 WHERE handle = ?1",
                params![handle, expires_at, max_version, slice_hash, members_json],
            )?;
            Ok(())
        })
    }

    pub fn delete_slice_handle(&self, handle: &str) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute("DELETE FROM slice_handles WHERE handle = ?1", [handle])?;
            Ok(())
        })
    }

    /// Scheduled sweep of expired leases.
    pub fn delete_expired_slice_handles(&self, now_iso: &str) -> Result<usize> {
        let swept = self.with_tx(|tx| {
            Ok(tx.execute(
                "DELETE FROM slice_handles WHERE expires_at <= ?1",
                [now_iso],
            )?)
        })?;
        if swept > 0 {
            debug!(swept, "handles: expired leases swept");
        }
        Ok(swept)
    }
}
