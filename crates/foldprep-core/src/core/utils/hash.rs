use sha1::{Digest, Sha1};

/// Hex-encoded SHA-1 digest of a sequence, used for cache keys and
/// output-directory names. The digest depends only on the byte content,
/// so the same sequence always maps to the same cache entry.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// First five hex characters of the content hash, used as a short job tag.
pub fn short_hash(content: &str) -> String {
    let mut h = content_hash(content);
    h.truncate(5);
    h
}
