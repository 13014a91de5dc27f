// Phase 5: Finalize. Inserts one media row per successfully-copied file,
// refreshes the owning location's cached counters, records an `imports`
// history row, closes the session, and enqueues the derived-asset jobs
// (thumbnail, proxy, exiftool, perceptual hash) that turn a bare archive
// copy into a browsable catalog entry.

use rusqlite::Connection;

use crate::db::schema;
use crate::error::Result;
use crate::jobs;

use super::types::{CopyResult, ImportResult, ScanItem};

/// Phase 5 proper: a single transaction inserts every non-duplicate media
/// row, refreshes the owning location's cached counters, records a
/// permanent `imports` history row, and marks the session `completed` — a
/// failure anywhere in the batch rolls back the whole phase rather than
/// leaving a half-finalized session (spec.md 4.E).
pub fn finalize_items(
    conn: &Connection,
    import_session_id: i64,
    location_id: &str,
    items: &[ScanItem],
    copy_results: &[CopyResult],
) -> Result<ImportResult> {
    let tx = conn.unchecked_transaction()?;

    let mut result = ImportResult {
        total: copy_results.len(),
        ..Default::default()
    };
    let mut copied_bytes: i64 = 0;

    for copy_result in copy_results {
        let Some(item) = items.get(copy_result.scan_index) else {
            continue;
        };

        match copy_result.status.as_str() {
            "copied" => match finalize_one(&tx, location_id, item, copy_result) {
                Ok(true) => {
                    result.copied += 1;
                    copied_bytes += item.bytes as i64;
                }
                Ok(false) => result.duplicate += 1,
                Err(e) => {
                    result.errored += 1;
                    result.warnings.push(e.to_string());
                }
            },
            "duplicate" => result.duplicate += 1,
            _ => {
                result.errored += 1;
                if let Some(err) = &copy_result.error {
                    result.warnings.push(err.clone());
                }
            }
        }
    }

    schema::refresh_location_media_counts(&tx, location_id)?;
    schema::insert_import_record(
        &tx,
        import_session_id,
        location_id,
        result.copied as i64,
        result.duplicate as i64,
        result.errored as i64,
        copied_bytes,
    )?;
    schema::update_import_session_phase(
        &tx,
        import_session_id,
        "completed",
        "finalize",
        "finalize_result_json",
        &serde_json::to_string(&result)?,
    )?;

    tx.commit()?;
    Ok(result)
}

fn finalize_one(
    conn: &Connection,
    location_id: &str,
    item: &ScanItem,
    copy_result: &CopyResult,
) -> Result<bool> {
    let hash = copy_result.hash.clone().unwrap_or_default();
    let archive_path = copy_result.archive_path.clone().unwrap_or_default();
    let original_filename = std::path::Path::new(&item.path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| item.path.clone());
    let canonical_filename = std::path::Path::new(&archive_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("{}.{}", hash, item.extension));

    let common = schema::NewMediaCommon {
        hash: hash.clone(),
        original_filename,
        canonical_filename,
        archive_path: archive_path.clone(),
        original_path: Some(item.path.clone()),
        location_id: Some(location_id.to_string()),
        sub_location_id: None,
        importer: None,
        file_size: item.bytes as i64,
        gps_lat: None,
        gps_lng: None,
        captured_at: None,
    };

    let table;
    let inserted = match item.detected_kind.as_str() {
        "image" => {
            table = "media_images";
            schema::insert_media_image_if_absent(
                conn,
                &schema::NewMediaImage {
                    hash: common.hash.clone(),
                    original_filename: common.original_filename.clone(),
                    canonical_filename: common.canonical_filename.clone(),
                    archive_path: common.archive_path.clone(),
                    original_path: common.original_path.clone(),
                    location_id: common.location_id.clone(),
                    sub_location_id: common.sub_location_id.clone(),
                    importer: common.importer.clone(),
                    file_size: common.file_size,
                    gps_lat: None,
                    gps_lng: None,
                    captured_at: None,
                    image_width: None,
                    image_height: None,
                    perceptual_hash: None,
                },
            )?
        }
        "video" => {
            table = "media_videos";
            schema::insert_media_video_if_absent(
                conn,
                &schema::NewMediaVideo {
                    common,
                    video_duration_ms: None,
                    video_codec: None,
                    video_fps: None,
                },
            )?
        }
        "map" => {
            table = "media_maps";
            schema::insert_media_map_if_absent(
                conn,
                &schema::NewMediaMap {
                    common,
                    map_format: Some(item.extension.clone()),
                },
            )?
        }
        _ => {
            table = "media_documents";
            schema::insert_media_document_if_absent(
                conn,
                &schema::NewMediaDocument {
                    common,
                    doc_page_count: None,
                    doc_author: None,
                    doc_title: None,
                },
            )?
        }
    };

    if inserted {
        enqueue_derived_jobs(conn, &hash, table, &archive_path, item.detected_kind.as_str())?;
    }

    Ok(inserted)
}

fn enqueue_derived_jobs(
    conn: &Connection,
    hash: &str,
    table: &str,
    archive_path: &str,
    kind: &str,
) -> Result<()> {
    #[derive(serde::Serialize)]
    struct DerivedJobPayload<'a> {
        hash: &'a str,
        table: &'a str,
        archive_path: &'a str,
    }
    let payload = serde_json::to_string(&DerivedJobPayload {
        hash,
        table,
        archive_path,
    })?;

    jobs::create_job(conn, "exiftool", 0, &payload, None, crate::constants::JOB_MAX_ATTEMPTS)?;

    if kind == "image" {
        jobs::create_job(conn, "thumbnail", 0, &payload, None, crate::constants::JOB_MAX_ATTEMPTS)?;
        jobs::create_job(
            conn,
            "perceptual-hash",
            0,
            &payload,
            None,
            crate::constants::JOB_MAX_ATTEMPTS,
        )?;
    } else if kind == "video" {
        jobs::create_job(conn, "thumbnail", 0, &payload, None, crate::constants::JOB_MAX_ATTEMPTS)?;
        jobs::create_job(conn, "proxy", 0, &payload, None, crate::constants::JOB_MAX_ATTEMPTS)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db;
    use tempfile::tempdir;

    fn item(kind: &str) -> ScanItem {
        ScanItem {
            path: format!("/source/photo.{}", if kind == "image" { "jpg" } else { "mp4" }),
            bytes: 42,
            mtime: 0,
            extension: if kind == "image" { "jpg".to_string() } else { "mp4".to_string() },
            detected_kind: kind.to_string(),
            hidden: false,
            hidden_reason: None,
            over_ceiling: false,
        }
    }

    #[test]
    fn finalize_items_inserts_media_row_and_enqueues_jobs() {
        let dir = tempdir().unwrap();
        let conn = open_db(&dir.path().join("catalog.db")).unwrap();
        schema::insert_location(&conn, "loc1", "Test Site", None, None, None).unwrap();
        let session_id = schema::create_import_session(&conn, "loc1", "[]").unwrap();

        let scan_item = item("image");
        let copy_result = CopyResult {
            scan_index: 0,
            hash: Some("a".repeat(64)),
            archive_path: Some("/archive/locations/loc1/media/aa/aaa.jpg".to_string()),
            status: "copied".to_string(),
            error: None,
        };

        let result = finalize_items(&conn, session_id, "loc1", &[scan_item], &[copy_result]).unwrap();
        assert_eq!(result.copied, 1);

        let pending = jobs::runner::count_pending_jobs(&conn).unwrap();
        let total: i64 = pending.iter().map(|(_, n)| n).sum();
        assert!(total >= 3); // exiftool + thumbnail + perceptual-hash

        let imports_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM imports WHERE import_session_id = ?1",
                rusqlite::params![session_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(imports_count, 1);

        let session = schema::get_import_session(&conn, session_id).unwrap().unwrap();
        assert_eq!(session.status, "completed");
    }

    #[test]
    fn finalize_items_counts_duplicates_without_inserting() {
        let dir = tempdir().unwrap();
        let conn = open_db(&dir.path().join("catalog.db")).unwrap();
        schema::insert_location(&conn, "loc1", "Test Site", None, None, None).unwrap();
        let session_id = schema::create_import_session(&conn, "loc1", "[]").unwrap();

        let scan_item = item("document");
        let copy_result = CopyResult {
            scan_index: 0,
            hash: Some("b".repeat(64)),
            archive_path: None,
            status: "duplicate".to_string(),
            error: None,
        };

        let result = finalize_items(&conn, session_id, "loc1", &[scan_item], &[copy_result]).unwrap();
        assert_eq!(result.duplicate, 1);
        assert_eq!(result.copied, 0);
    }
}
