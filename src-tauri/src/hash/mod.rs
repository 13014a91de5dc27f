// Streaming BLAKE3 hashing and perceptual hashing.
//
// The full 64-hex BLAKE3 of a media file's original bytes is both its
// primary key and its deduplication key (data model invariant 1). Locations
// and sub-locations use a 16-hex truncation of a stable seed instead, since
// they are user-editable records rather than content-addressed blobs.

mod phash;

pub use phash::compute_perceptual_hash;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use rusqlite::Connection;
use serde::Deserialize;

use crate::constants::HASH_CHUNK_SIZE;
use crate::db::schema;
use crate::error::{CoreError, Result};
use crate::media_path::MediaPathPlanner;

/// Compute the full 64-hex BLAKE3 hash of a file's contents, streamed
/// through a bounded buffer so hashing a multi-gigabyte video never holds
/// the whole file in memory.
pub fn compute_full_hash(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| CoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| CoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute the full BLAKE3 hash of an in-memory buffer (manifest bytes,
/// serialized sidecar payloads).
pub fn compute_full_hash_from_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Truncate a full hash to the 16-hex-character form used for location and
/// sub-location identifiers.
pub fn truncate_id(hash: &str) -> String {
    hash.chars().take(16).collect()
}

/// Derive a stable 16-hex location/sub-location id from a creation
/// timestamp and the user-entered name. The seed is not reversible and is
/// only required to be stable for the lifetime of the record.
pub fn derive_entity_id(created_at_rfc3339: &str, name: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(created_at_rfc3339.as_bytes());
    hasher.update(b"\0");
    hasher.update(name.as_bytes());
    truncate_id(&hasher.finalize().to_hex().to_string())
}

/// Verify a file on disk still matches a previously computed full hash.
/// Used by the import pipeline's validate phase and by the BagIt validator.
pub fn verify_hash(path: &Path, expected_hash: &str) -> Result<bool> {
    let actual = compute_full_hash(path)?;
    Ok(actual == expected_hash)
}

/// Fingerprint used only for relink/offline-match heuristics, never as a
/// catalog identifier: size and duration alone are not collision-resistant.
pub fn compute_size_duration_fingerprint(size_bytes: i64, duration_ms: Option<i64>) -> String {
    match duration_ms {
        Some(d) => format!("size_duration:{}:{}", size_bytes, d),
        None => format!("size_duration:{}:0", size_bytes),
    }
}

#[derive(Deserialize)]
struct PerceptualHashJobPayload {
    hash: String,
    table: String,
    archive_path: String,
}

/// Job handler for the `perceptual-hash` queue: compute the image's pHash
/// and persist it, so the near-duplicate search index (bucketed on the
/// first 4 hex characters, invariant 6) has something to bucket.
pub fn run_perceptual_hash_job(
    conn: &Connection,
    _planner: &MediaPathPlanner,
    job: &schema::Job,
) -> Result<String> {
    let payload: PerceptualHashJobPayload = serde_json::from_str(&job.payload_json)?;
    let phash = compute_perceptual_hash(std::path::Path::new(&payload.archive_path))?;

    let sql = format!("UPDATE {} SET perceptual_hash = ?1 WHERE hash = ?2", payload.table);
    conn.execute(&sql, rusqlite::params![phash, payload.hash])?;

    Ok(phash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn full_hash_is_64_hex_chars() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Hello, World!").unwrap();

        let hash = compute_full_hash(file.path()).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn full_hash_matches_in_memory_hash() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"matching content").unwrap();

        let from_file = compute_full_hash(file.path()).unwrap();
        let from_bytes = compute_full_hash_from_bytes(b"matching content");
        assert_eq!(from_file, from_bytes);
    }

    #[test]
    fn truncate_id_keeps_first_16_chars() {
        let full = compute_full_hash_from_bytes(b"location seed");
        let id = truncate_id(&full);
        assert_eq!(id.len(), 16);
        assert_eq!(id, &full[..16]);
    }

    #[test]
    fn derive_entity_id_is_deterministic() {
        let a = derive_entity_id("2024-01-01T00:00:00Z", "Old Mill");
        let b = derive_entity_id("2024-01-01T00:00:00Z", "Old Mill");
        let c = derive_entity_id("2024-01-01T00:00:00Z", "Different Mill");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn verify_hash_detects_mismatch() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"original bytes").unwrap();
        let real_hash = compute_full_hash(file.path()).unwrap();

        let zero_hash = "0".repeat(64);
        assert!(verify_hash(file.path(), &real_hash).unwrap());
        assert!(!verify_hash(file.path(), &zero_hash).unwrap());
    }
}
