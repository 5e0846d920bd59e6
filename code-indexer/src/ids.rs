//! Stable identifiers and content hashing.
//!
//! - SHA-256 for file hashes, symbol IDs and card ETags (hex, truncated where
//!   a shorter opaque key is enough);
//! - FNV-1a 64-bit for the subtree shape hash (dependency-free, fixed
//!   constants, byte-identical across architectures).
//!
//! Identical source must yield identical IDs across runs and machines, so
//! every key below is a fixed-order composite with `|` separators and no
//! wall-clock or locale input.

use sha2::{Digest, Sha256};

const SYMBOL_ID_LEN: usize = 32;
const ETAG_LEN: usize = 32;
const FINGERPRINT_LEN: usize = 16;

pub(crate) const FNV_OFFSET: u64 = 0xcbf29ce484222325;
pub(crate) const FNV_PRIME: u64 = 0x100000001b3;

/// Lowercase-hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn short_hash(key: &str, len: usize) -> String {
    let mut h = sha256_hex(key.as_bytes());
    h.truncate(len);
    h
}

/// Content hash of a file, stable over line-ending differences.
pub fn file_content_hash(bytes: &[u8]) -> String {
    let mut normalized = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
            i += 1;
            continue;
        }
        normalized.push(bytes[i]);
        i += 1;
    }
    sha256_hex(&normalized)
}

/// Stable file ID from the repo and the normalized repo-relative path.
pub fn file_id(repo_id: &str, rel_path: &str) -> String {
    short_hash(&format!("file|{repo_id}|{rel_path}"), SYMBOL_ID_LEN)
}

/// Content-addressed symbol ID: identical source yields the identical ID on
/// every machine.
pub fn symbol_id(
    repo_id: &str,
    rel_path: &str,
    kind: &str,
    name: &str,
    ast_fingerprint: &str,
) -> String {
    short_hash(
        &format!("sym|{repo_id}|{rel_path}|{kind}|{name}|{ast_fingerprint}"),
        SYMBOL_ID_LEN,
    )
}

/// ETag of a card payload, keyed by the symbol and the ledger version.
pub fn card_etag(symbol_id: &str, version_id: &str, canonical_payload: &str) -> String {
    short_hash(
        &format!("card|{symbol_id}|{version_id}|{canonical_payload}"),
        ETAG_LEN,
    )
}

/// Hash of an AST fingerprint composite key (see `fingerprint` module).
pub(crate) fn fingerprint_digest(composite: &str) -> String {
    short_hash(composite, FINGERPRINT_LEN)
}

/// FNV-1a 64-bit over raw bytes.
pub(crate) fn fnv1a_step(mut hash: u64, bytes: &[u8]) -> u64 {
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_hash_ignores_crlf() {
        let unix = b"fn main() {\n}\n";
        let dos = b"fn main() {\r\n}\r\n";
        assert_eq!(file_content_hash(unix), file_content_hash(dos));
    }

    #[test]
    fn symbol_id_is_reproducible_and_fixed_width() {
        let a = symbol_id("repo", "src/a.ts", "function", "add", "deadbeef");
        let b = symbol_id("repo", "src/a.ts", "function", "add", "deadbeef");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn any_key_component_changes_the_id() {
        let base = symbol_id("repo", "a.ts", "function", "add", "fp");
        assert_ne!(base, symbol_id("repo2", "a.ts", "function", "add", "fp"));
        assert_ne!(base, symbol_id("repo", "b.ts", "function", "add", "fp"));
        assert_ne!(base, symbol_id("repo", "a.ts", "method", "add", "fp"));
        assert_ne!(base, symbol_id("repo", "a.ts", "function", "sub", "fp"));
        assert_ne!(base, symbol_id("repo", "a.ts", "function", "add", "fp2"));
    }
}
