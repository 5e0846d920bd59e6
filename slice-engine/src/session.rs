//! Slice sessions: leased handles, delta refresh, spillover paging.
//!
//! A handle is a leased entry for an ongoing slice session. Refresh either
//! renews the lease (`notModified`) or reports a symbol-level delta against
//! a newer ledger version. Spillover serves the dropped list recorded at
//! truncation, cursor-paginated.

use crate::beam::DroppedCandidate;
use crate::cards::DetailLevel;
use crate::errors::{Error, Result};
use code_indexer::ids;
use ledger_store::Store;
use ledger_store::rows::SliceHandleRow;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Lease duration for slice handles.
pub const HANDLE_TTL_SECS: i64 = 15 * 60;
/// Default spillover page size.
pub const SPILLOVER_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceMember {
    pub symbol_id: String,
    pub etag: String,
    /// Effective detail level the ETag was computed at; refresh recomputes
    /// at the same level.
    pub detail: DetailLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub handle: String,
    pub expires_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceDelta {
    pub changed_symbols: Vec<String>,
    pub removed_symbols: Vec<String>,
    pub new_version: String,
}

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    NotModified { lease: Lease },
    Modified { delta: SliceDelta, lease: Lease },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpilloverPage {
    pub items: Vec<DroppedCandidate>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn lease_expiry() -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(HANDLE_TTL_SECS))
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Hash of the ordered member ETags; identifies slice content.
pub fn slice_hash(members: &[SliceMember]) -> String {
    let joined = members
        .iter()
        .map(|m| m.etag.as_str())
        .collect::<Vec<_>>()
        .join("|");
    let mut hash = ids::sha256_hex(joined.as_bytes());
    hash.truncate(32);
    hash
}

/// Create and persist a leased handle for a freshly built slice.
pub fn create_handle(
    store: &Store,
    repo_id: &str,
    version_id: &str,
    members: &[SliceMember],
    spillover: &[DroppedCandidate],
) -> Result<SliceHandleRow> {
    let row = SliceHandleRow {
        handle: Uuid::new_v4().to_string(),
        repo_id: repo_id.to_string(),
        created_at: now_iso(),
        expires_at: lease_expiry(),
        min_version: None,
        max_version: version_id.to_string(),
        slice_hash: slice_hash(members),
        members_json: Some(serde_json::to_string(members)?),
        spillover_json: if spillover.is_empty() {
            None
        } else {
            Some(serde_json::to_string(spillover)?)
        },
    };
    store.create_slice_handle(&row)?;
    debug!(handle = %row.handle, repo = repo_id, version = version_id, "session: handle created");
    Ok(row)
}

/// Refresh a handle against the current version. `recompute_etag` re-prices
/// a member at the new version (at the member's recorded detail level);
/// `None` means the symbol no longer exists.
pub fn refresh_handle(
    store: &Store,
    handle: &str,
    current_version: &str,
    recompute_etag: impl Fn(&SliceMember) -> Result<Option<String>>,
) -> Result<RefreshOutcome> {
    let row = store
        .get_slice_handle(handle, &now_iso())?
        .ok_or_else(|| Error::HandleExpired(handle.to_string()))?;

    let expires_at = lease_expiry();
    if row.max_version == current_version {
        store.refresh_slice_handle(handle, &expires_at, &row.max_version, &row.slice_hash, None)?;
        return Ok(RefreshOutcome::NotModified {
            lease: Lease {
                handle: handle.to_string(),
                expires_at,
            },
        });
    }

    let members: Vec<SliceMember> = row
        .members_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?
        .unwrap_or_default();

    let mut changed = Vec::new();
    let mut removed = Vec::new();
    let mut fresh_members = Vec::with_capacity(members.len());
    for member in &members {
        match recompute_etag(member)? {
            Some(etag) => {
                if etag != member.etag {
                    changed.push(member.symbol_id.clone());
                }
                fresh_members.push(SliceMember {
                    symbol_id: member.symbol_id.clone(),
                    etag,
                    detail: member.detail,
                });
            }
            None => removed.push(member.symbol_id.clone()),
        }
    }

    let new_hash = slice_hash(&fresh_members);
    let fresh_json = serde_json::to_string(&fresh_members)?;
    store.refresh_slice_handle(
        handle,
        &expires_at,
        current_version,
        &new_hash,
        Some(fresh_json.as_str()),
    )?;

    debug!(
        handle,
        changed = changed.len(),
        removed = removed.len(),
        new_version = current_version,
        "session: handle refreshed with delta"
    );
    Ok(RefreshOutcome::Modified {
        delta: SliceDelta {
            changed_symbols: changed,
            removed_symbols: removed,
            new_version: current_version.to_string(),
        },
        lease: Lease {
            handle: handle.to_string(),
            expires_at,
        },
    })
}

/// One page of the recorded dropped list. The cursor is a decimal offset.
pub fn spillover_page(
    store: &Store,
    handle: &str,
    cursor: Option<&str>,
    page_size: Option<usize>,
) -> Result<SpilloverPage> {
    let row = store
        .get_slice_handle(handle, &now_iso())?
        .ok_or_else(|| Error::HandleExpired(handle.to_string()))?;
    page_spillover_row(&row, cursor, page_size)
}

pub(crate) fn page_spillover_row(
    row: &SliceHandleRow,
    cursor: Option<&str>,
    page_size: Option<usize>,
) -> Result<SpilloverPage> {
    let all: Vec<DroppedCandidate> = row
        .spillover_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?
        .unwrap_or_default();

    let offset = match cursor {
        None | Some("") => 0,
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| Error::InvalidCursor(raw.to_string()))?,
    };
    let page_size = page_size.unwrap_or(SPILLOVER_PAGE_SIZE).max(1);

    let end = (offset + page_size).min(all.len());
    let items: Vec<DroppedCandidate> = all
        .get(offset..end)
        .map(|s| s.to_vec())
        .unwrap_or_default();
    let has_more = end < all.len();
    Ok(SpilloverPage {
        next_cursor: has_more.then(|| end.to_string()),
        has_more,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dropped(n: usize) -> Vec<DroppedCandidate> {
        (0..n)
            .map(|i| DroppedCandidate {
                symbol_id: format!("id_{i:03}"),
                score: 100.0 - i as f64,
                reason: "card budget exhausted".to_string(),
                priority: 10,
            })
            .collect()
    }

    fn handle_row(spillover: &[DroppedCandidate]) -> SliceHandleRow {
        SliceHandleRow {
            handle: "h1".to_string(),
            repo_id: "r1".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            expires_at: "2099-01-01T00:00:00Z".to_string(),
            min_version: None,
            max_version: "v0000000001".to_string(),
            slice_hash: "hash".to_string(),
            members_json: None,
            spillover_json: Some(serde_json::to_string(spillover).unwrap()),
        }
    }

    #[test]
    fn spillover_pages_concatenate_to_the_recorded_list() {
        let all = dropped(45);
        let row = handle_row(&all);

        let page1 = page_spillover_row(&row, None, Some(20)).unwrap();
        assert_eq!(page1.items.len(), 20);
        assert_eq!(page1.next_cursor.as_deref(), Some("20"));
        assert!(page1.has_more);

        let page2 = page_spillover_row(&row, Some("20"), Some(20)).unwrap();
        assert_eq!(page2.items.len(), 20);
        assert_eq!(page2.next_cursor.as_deref(), Some("40"));

        let page3 = page_spillover_row(&row, Some("40"), Some(20)).unwrap();
        assert_eq!(page3.items.len(), 5);
        assert!(!page3.has_more);
        assert!(page3.next_cursor.is_none());

        let mut concat = page1.items;
        concat.extend(page2.items);
        concat.extend(page3.items);
        let ids: Vec<&str> = concat.iter().map(|d| d.symbol_id.as_str()).collect();
        let expected: Vec<&str> = all.iter().map(|d| d.symbol_id.as_str()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn bad_cursor_is_rejected() {
        let row = handle_row(&dropped(5));
        assert!(page_spillover_row(&row, Some("not-a-number"), None).is_err());
    }

    #[test]
    fn slice_hash_tracks_member_etags() {
        let a = vec![SliceMember {
            symbol_id: "s1".to_string(),
            etag: "e1".to_string(),
            detail: DetailLevel::Compact,
        }];
        let b = vec![SliceMember {
            symbol_id: "s1".to_string(),
            etag: "e2".to_string(),
            detail: DetailLevel::Compact,
        }];
        assert_ne!(slice_hash(&a), slice_hash(&b));
        assert_eq!(slice_hash(&a), slice_hash(&a));
    }
}
