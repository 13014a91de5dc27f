// BagIt-style archive validator: writes bag-info.txt and
// manifest-blake3.txt into a location's folder on finalize, then rehashes
// every manifest-listed file on demand to confirm nothing on disk has
// rotted, moved, or been tampered with. Grounded on the teacher's
// ingest/verification.rs rehash-and-compare idea, generalized from a single
// per-clip checksum to a whole-folder manifest, and on
// db/schema.rs::set_bagit_status, which already writes the result back onto
// the location row the way the teacher writes `assets.verified_at`.

use std::fs;
use std::path::Path;

use rusqlite::Connection;
use serde::Deserialize;

use crate::constants::{ARCHIVE_VERSION, BAG_INFO_FILENAME, MANIFEST_FILENAME};
use crate::db::schema;
use crate::error::{CoreError, Result};
use crate::hash::compute_full_hash;
use crate::media_path::MediaPathPlanner;

/// Outcome of a single validation pass, returned to the caller and also
/// persisted onto the location row via `bagit_status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BagValidation {
    pub location_id: String,
    pub files_checked: usize,
    pub mismatches: Vec<String>,
    pub missing: Vec<String>,
    pub valid: bool,
}

/// Write `bag-info.txt` and `manifest-blake3.txt` for `location_id`,
/// reflecting every media file currently catalogued under it. Called from
/// the import pipeline's finalize phase after a batch lands, and re-callable
/// any time to refresh the manifest after new media is added.
pub fn write_bag(conn: &Connection, planner: &MediaPathPlanner, location_id: &str) -> Result<()> {
    let location = schema::get_location(conn, location_id)?
        .ok_or_else(|| CoreError::LocationNotFound(location_id.to_string()))?;
    let entries = schema::list_media_archive_paths_for_location(conn, location_id)?;

    let location_dir = planner.location_dir(location_id);
    fs::create_dir_all(&location_dir).map_err(|e| CoreError::Io {
        path: location_dir.display().to_string(),
        source: e,
    })?;

    let bag_info = format!(
        "BagIt-Version: {version}\nLocation-Id: {id}\nLocation-Name: {name}\nPayload-Oxum: {bytes}.{count}\nBagging-Date: {date}\n",
        version = ARCHIVE_VERSION,
        id = location.id,
        name = location.name,
        bytes = location.media_total_bytes,
        count = entries.len(),
        date = chrono::Utc::now().to_rfc3339(),
    );
    write_file(&location_dir.join(BAG_INFO_FILENAME), &bag_info)?;

    let mut manifest = String::new();
    for (hash, archive_path) in &entries {
        let relative = relative_to_location(planner, location_id, archive_path);
        manifest.push_str(&format!("{}  {}\n", hash, relative));
    }
    write_file(&location_dir.join(MANIFEST_FILENAME), &manifest)?;

    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|e| CoreError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Express an absolute archive path as a path relative to the location's own
/// folder, the form BagIt manifests record entries in.
fn relative_to_location(planner: &MediaPathPlanner, location_id: &str, archive_path: &str) -> String {
    let location_dir = planner.location_dir(location_id);
    Path::new(archive_path)
        .strip_prefix(&location_dir)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| archive_path.to_string())
}

/// Parse `manifest-blake3.txt`'s `"<hash>  <relative path>"` lines.
fn parse_manifest(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(2, char::is_whitespace);
            let hash = parts.next()?.trim();
            let path = parts.next()?.trim();
            if hash.is_empty() || path.is_empty() {
                None
            } else {
                Some((hash.to_string(), path.to_string()))
            }
        })
        .collect()
}

/// Rehash every file the manifest lists and compare against the recorded
/// hash. Writes the resulting `bagit_status` (`"valid"` or `"invalid"`) back
/// onto the location row.
pub fn validate_bag(conn: &Connection, planner: &MediaPathPlanner, location_id: &str) -> Result<BagValidation> {
    let location_dir = planner.location_dir(location_id);
    let manifest_path = location_dir.join(MANIFEST_FILENAME);

    let manifest_contents = fs::read_to_string(&manifest_path).map_err(|e| CoreError::Io {
        path: manifest_path.display().to_string(),
        source: e,
    })?;
    let entries = parse_manifest(&manifest_contents);

    let mut mismatches = Vec::new();
    let mut missing = Vec::new();

    for (expected_hash, relative_path) in &entries {
        let full_path = location_dir.join(relative_path);
        let validated = match planner.validate_archive_path(&full_path) {
            Ok(p) => p,
            Err(_) => {
                missing.push(relative_path.clone());
                continue;
            }
        };
        if !validated.exists() {
            missing.push(relative_path.clone());
            continue;
        }
        match compute_full_hash(&validated) {
            Ok(actual) if actual == *expected_hash => {}
            Ok(_) => mismatches.push(relative_path.clone()),
            Err(_) => missing.push(relative_path.clone()),
        }
    }

    let valid = mismatches.is_empty() && missing.is_empty();
    let error = if valid {
        None
    } else {
        Some(format!("{} mismatch(es), {} missing", mismatches.len(), missing.len()))
    };
    schema::set_bagit_status(
        conn,
        location_id,
        if valid { "valid" } else { "invalid" },
        error.as_deref(),
    )?;

    Ok(BagValidation {
        location_id: location_id.to_string(),
        files_checked: entries.len(),
        mismatches,
        missing,
        valid,
    })
}

#[derive(Deserialize)]
struct ValidateJobPayload {
    location_id: String,
}

/// Job handler for the `bagit-validate` queue.
pub fn run_validate_job(conn: &Connection, planner: &MediaPathPlanner, job: &schema::Job) -> Result<String> {
    let payload: ValidateJobPayload = serde_json::from_str(&job.payload_json)?;
    let result = validate_bag(conn, planner, &payload.location_id)?;
    Ok(serde_json::to_string(&result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use tempfile::tempdir;

    fn fresh(dir: &Path) -> (Connection, MediaPathPlanner) {
        let planner = MediaPathPlanner::new(dir);
        planner.ensure_directories().unwrap();
        let conn = Connection::open(planner.db_path()).unwrap();
        run_migrations(&conn).unwrap();
        (conn, planner)
    }

    fn seed_location_with_media(conn: &Connection, planner: &MediaPathPlanner, location_id: &str) -> String {
        schema::insert_location(conn, location_id, "Test Place", None, None, None).unwrap();
        planner.ensure_location_directories(location_id).unwrap();

        let bytes = b"hello world";
        let hash = blake3::hash(bytes).to_hex().to_string();
        let path = planner.media_archive_path(location_id, &hash, "jpg").unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();

        schema::insert_media_image_if_absent(
            conn,
            &schema::NewMediaImage {
                hash: hash.clone(),
                original_filename: "a.jpg".into(),
                canonical_filename: "a.jpg".into(),
                archive_path: path.display().to_string(),
                original_path: None,
                location_id: Some(location_id.to_string()),
                sub_location_id: None,
                importer: None,
                file_size: bytes.len() as i64,
                gps_lat: None,
                gps_lng: None,
                captured_at: None,
                image_width: None,
                image_height: None,
                perceptual_hash: None,
            },
        )
        .unwrap();
        hash
    }

    #[test]
    fn write_then_validate_round_trips_clean() {
        let dir = tempdir().unwrap();
        let (conn, planner) = fresh(dir.path());
        seed_location_with_media(&conn, &planner, "loc1");

        write_bag(&conn, &planner, "loc1").unwrap();
        let result = validate_bag(&conn, &planner, "loc1").unwrap();

        assert!(result.valid);
        assert_eq!(result.files_checked, 1);
        let location = schema::get_location(&conn, "loc1").unwrap().unwrap();
        assert_eq!(location.bagit_status, "valid");
    }

    #[test]
    fn tampered_file_is_detected_as_mismatch() {
        let dir = tempdir().unwrap();
        let (conn, planner) = fresh(dir.path());
        let hash = seed_location_with_media(&conn, &planner, "loc1");
        write_bag(&conn, &planner, "loc1").unwrap();

        let path = planner.media_archive_path("loc1", &hash, "jpg").unwrap();
        fs::write(&path, b"tampered contents").unwrap();

        let result = validate_bag(&conn, &planner, "loc1").unwrap();
        assert!(!result.valid);
        assert_eq!(result.mismatches.len(), 1);
        let location = schema::get_location(&conn, "loc1").unwrap().unwrap();
        assert_eq!(location.bagit_status, "invalid");
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let (conn, planner) = fresh(dir.path());
        let hash = seed_location_with_media(&conn, &planner, "loc1");
        write_bag(&conn, &planner, "loc1").unwrap();

        let path = planner.media_archive_path("loc1", &hash, "jpg").unwrap();
        fs::remove_file(&path).unwrap();

        let result = validate_bag(&conn, &planner, "loc1").unwrap();
        assert!(!result.valid);
        assert_eq!(result.missing.len(), 1);
    }
}
