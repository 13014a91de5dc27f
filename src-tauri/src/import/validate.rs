// Phase 4: Validate. Re-hashes every copied file from its archive location
// and compares against the hash recorded during the Hash phase. A mismatch
// means the copy was corrupted in transit; the bad file is deleted rather
// than left as a silent catalog/disk divergence.

use crate::error::Result;
use crate::hash::verify_hash;
use crate::media_path::MediaPathPlanner;

use super::types::{CopyResult, ValidatePhaseResult};

pub fn validate_items(planner: &MediaPathPlanner, copy_results: &[CopyResult]) -> ValidatePhaseResult {
    let mut valid_count = 0;
    let mut corrupted = Vec::new();

    for result in copy_results {
        if result.status != "copied" {
            continue;
        }
        let (Some(hash), Some(archive_path)) = (&result.hash, &result.archive_path) else {
            continue;
        };

        let path = std::path::Path::new(archive_path);
        if planner.validate_archive_path(path).is_err() {
            corrupted.push(archive_path.clone());
            let _ = std::fs::remove_file(path);
            continue;
        }

        match verify_hash(path, hash) {
            Ok(true) => valid_count += 1,
            Ok(false) | Err(_) => {
                corrupted.push(archive_path.clone());
                let _ = std::fs::remove_file(path);
            }
        }
    }

    ValidatePhaseResult {
        valid_count,
        corrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::compute_full_hash;
    use tempfile::tempdir;

    #[test]
    fn validate_items_accepts_matching_hash() {
        let dir = tempdir().unwrap();
        let planner = MediaPathPlanner::new(dir.path());
        planner.ensure_directories().unwrap();
        planner.ensure_location_directories("loc1").unwrap();

        let path = planner.media_archive_path("loc1", "aabb00112233", "jpg").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"hello world").unwrap();
        let hash = compute_full_hash(&path).unwrap();

        let copy_result = CopyResult {
            scan_index: 0,
            hash: Some(hash),
            archive_path: Some(path.display().to_string()),
            status: "copied".to_string(),
            error: None,
        };

        let result = validate_items(&planner, &[copy_result]);
        assert_eq!(result.valid_count, 1);
        assert!(result.corrupted.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn validate_items_deletes_file_on_hash_mismatch() {
        let dir = tempdir().unwrap();
        let planner = MediaPathPlanner::new(dir.path());
        planner.ensure_directories().unwrap();
        planner.ensure_location_directories("loc1").unwrap();

        let path = planner.media_archive_path("loc1", "aabb00112233", "jpg").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"hello world").unwrap();

        let copy_result = CopyResult {
            scan_index: 0,
            hash: Some("0".repeat(64)),
            archive_path: Some(path.display().to_string()),
            status: "copied".to_string(),
            error: None,
        };

        let result = validate_items(&planner, &[copy_result]);
        assert_eq!(result.valid_count, 0);
        assert_eq!(result.corrupted.len(), 1);
        assert!(!path.exists());
    }

    #[test]
    fn validate_items_skips_non_copied_results() {
        let dir = tempdir().unwrap();
        let planner = MediaPathPlanner::new(dir.path());
        planner.ensure_directories().unwrap();

        let copy_result = CopyResult {
            scan_index: 0,
            hash: Some("ab".repeat(32)),
            archive_path: None,
            status: "duplicate".to_string(),
            error: None,
        };

        let result = validate_items(&planner, &[copy_result]);
        assert_eq!(result.valid_count, 0);
        assert!(result.corrupted.is_empty());
    }
}
