// Phase 3: Copy. Moves every successfully-hashed item into its
// content-addressed archive location. A hash already present anywhere in
// the catalog is recorded as `duplicate` and never copied twice, the
// import pipeline's idempotent-reimport invariant.

use std::path::Path;

use filetime::FileTime;
use rusqlite::Connection;

use crate::db::schema;
use crate::error::Result;
use crate::media_path::MediaPathPlanner;

use super::types::{CopyPhaseResult, CopyResult, HashResult, ScanItem};

pub fn copy_items(
    conn: &Connection,
    planner: &MediaPathPlanner,
    location_id: &str,
    items: &[ScanItem],
    hash_results: &[HashResult],
) -> Result<CopyPhaseResult> {
    let mut results = Vec::with_capacity(hash_results.len());

    for hash_result in hash_results {
        let Some(item) = items.get(hash_result.scan_index) else {
            continue;
        };
        results.push(copy_one(conn, planner, location_id, item, hash_result));
    }

    Ok(CopyPhaseResult { results })
}

fn copy_one(
    conn: &Connection,
    planner: &MediaPathPlanner,
    location_id: &str,
    item: &ScanItem,
    hash_result: &HashResult,
) -> CopyResult {
    let scan_index = hash_result.scan_index;

    let Some(hash) = &hash_result.hash else {
        return CopyResult {
            scan_index,
            hash: None,
            archive_path: None,
            status: "error".to_string(),
            error: hash_result.error.clone(),
        };
    };

    match schema::any_media_hash_exists(conn, hash) {
        Ok(true) => {
            return CopyResult {
                scan_index,
                hash: Some(hash.clone()),
                archive_path: None,
                status: "duplicate".to_string(),
                error: None,
            }
        }
        Ok(false) => {}
        Err(e) => {
            return CopyResult {
                scan_index,
                hash: Some(hash.clone()),
                archive_path: None,
                status: "error".to_string(),
                error: Some(e.to_string()),
            }
        }
    }

    match copy_into_archive(planner, location_id, item, hash) {
        Ok(dest) => CopyResult {
            scan_index,
            hash: Some(hash.clone()),
            archive_path: Some(dest.display().to_string()),
            status: "copied".to_string(),
            error: None,
        },
        Err(e) => CopyResult {
            scan_index,
            hash: Some(hash.clone()),
            archive_path: None,
            status: "error".to_string(),
            error: Some(e.to_string()),
        },
    }
}

/// Atomic copy: write to a `.tmp` sibling in the destination bucket, then
/// rename into place, so a crash mid-copy never leaves a half-written file
/// at the final content-addressed path.
fn copy_into_archive(
    planner: &MediaPathPlanner,
    location_id: &str,
    item: &ScanItem,
    hash: &str,
) -> Result<std::path::PathBuf> {
    let dest = planner.media_archive_path(location_id, hash, &item.extension)?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| crate::error::CoreError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let tmp = dest.with_extension(format!("{}.tmp", item.extension));
    let source = Path::new(&item.path);
    std::fs::copy(source, &tmp).map_err(|e| crate::error::CoreError::Io {
        path: source.display().to_string(),
        source: e,
    })?;

    if let Ok(meta) = std::fs::metadata(source) {
        let mtime = FileTime::from_last_modification_time(&meta);
        let _ = filetime::set_file_mtime(&tmp, mtime);
    }

    std::fs::rename(&tmp, &dest).map_err(|e| crate::error::CoreError::Io {
        path: dest.display().to_string(),
        source: e,
    })?;

    planner.validate_archive_path(&dest)?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db;
    use tempfile::tempdir;

    fn item(path: &std::path::Path) -> ScanItem {
        ScanItem {
            path: path.display().to_string(),
            bytes: 5,
            mtime: 0,
            extension: "jpg".to_string(),
            detected_kind: "image".to_string(),
            hidden: false,
            hidden_reason: None,
            over_ceiling: false,
        }
    }

    #[test]
    fn copy_one_copies_new_file_into_bucketed_path() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("archive");
        let planner = MediaPathPlanner::new(&archive);
        planner.ensure_directories().unwrap();
        planner.ensure_location_directories("loc1").unwrap();

        let conn = open_db(&planner.db_path()).unwrap();

        let src_dir = tempdir().unwrap();
        let src = src_dir.path().join("photo.jpg");
        std::fs::write(&src, b"hello").unwrap();

        let scan_item = item(&src);
        let hash_result = HashResult {
            scan_index: 0,
            hash: Some("aabbccdd00112233445566778899aabbccdd00112233445566778899aabbcc".to_string()),
            perceptual_hash: None,
            error: None,
        };

        let result = copy_items(&conn, &planner, "loc1", &[scan_item], &[hash_result]).unwrap();
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].status, "copied");
        let dest = std::path::PathBuf::from(result.results[0].archive_path.as_ref().unwrap());
        assert!(dest.exists());
    }

    #[test]
    fn copy_one_skips_already_catalogued_hash() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("archive");
        let planner = MediaPathPlanner::new(&archive);
        planner.ensure_directories().unwrap();
        planner.ensure_location_directories("loc1").unwrap();

        let conn = open_db(&planner.db_path()).unwrap();
        schema::insert_location(&conn, "loc1", "Test Site", None, None, None).unwrap();

        let hash = "aabbccdd00112233445566778899aabbccdd00112233445566778899aabbcc";
        schema::insert_media_image_if_absent(
            &conn,
            &schema::NewMediaImage {
                hash: hash.to_string(),
                original_filename: "existing.jpg".to_string(),
                canonical_filename: "existing.jpg".to_string(),
                archive_path: "/somewhere.jpg".to_string(),
                original_path: None,
                location_id: Some("loc1".to_string()),
                sub_location_id: None,
                importer: None,
                file_size: 5,
                gps_lat: None,
                gps_lng: None,
                captured_at: None,
                image_width: None,
                image_height: None,
                perceptual_hash: None,
            },
        )
        .unwrap();

        let src_dir = tempdir().unwrap();
        let src = src_dir.path().join("photo.jpg");
        std::fs::write(&src, b"hello").unwrap();

        let scan_item = item(&src);
        let hash_result = HashResult {
            scan_index: 0,
            hash: Some(hash.to_string()),
            perceptual_hash: None,
            error: None,
        };

        let result = copy_items(&conn, &planner, "loc1", &[scan_item], &[hash_result]).unwrap();
        assert_eq!(result.results[0].status, "duplicate");
    }
}
