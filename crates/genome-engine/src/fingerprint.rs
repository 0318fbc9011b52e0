use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Stable content fingerprint for one file: path and bytes, truncated to
/// 64 bits of hex. Drives incremental change detection.
pub fn file_fingerprint(path: &str, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(content);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(23);
    hex.push_str("sha256:");
    for byte in &digest[..8] {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Tree-level hash over the sorted fingerprint table. Identifies the
/// analyzed repository state independent of working-copy timestamps.
pub fn repo_hash(fingerprints: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (path, fingerprint) in fingerprints {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(fingerprint.as_bytes());
        hasher.update([0u8]);
    }
    format!("sha256:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fingerprint_changes_with_content_and_path() {
        let a = file_fingerprint("a.py", b"x = 1");
        let b = file_fingerprint("a.py", b"x = 2");
        let c = file_fingerprint("b.py", b"x = 1");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("sha256:"));
        assert_eq!(a, file_fingerprint("a.py", b"x = 1"));
    }

    #[test]
    fn repo_hash_is_order_independent() {
        let mut table = BTreeMap::new();
        table.insert("a.py".to_string(), file_fingerprint("a.py", b"1"));
        table.insert("b.py".to_string(), file_fingerprint("b.py", b"2"));
        let first = repo_hash(&table);

        let mut reversed = BTreeMap::new();
        reversed.insert("b.py".to_string(), file_fingerprint("b.py", b"2"));
        reversed.insert("a.py".to_string(), file_fingerprint("a.py", b"1"));
        assert_eq!(first, repo_hash(&reversed));
    }
}
