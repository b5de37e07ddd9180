//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Session identifiers and upload paths are user data. Spans only ever carry
//! a file name or a short fingerprint.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Full lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Short deterministic fingerprint of a session id, safe for logs.
pub fn session_fingerprint(session_id: &str) -> String {
    let mut digest = sha256_hex(session_id.as_bytes());
    digest.truncate(12);
    digest
}
