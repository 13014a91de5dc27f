// Web-source archiver: captures a URL's HTML (or PDF), stores the bytes
// content-addressed under the owning location's web-sources folder, extracts
// title/metadata/text via CSS selectors, records a WARC framing of the
// capture, and keeps an FTS5 index of extracted text in sync (triggers in
// db/schema.rs do the index maintenance; this module only ever writes to
// `web_sources.extracted_text`). Grounded on the teacher's preview pipeline
// shape (job creates work, a queue handler does the I/O, the result lands
// back on the owning row) generalized from image/video derivatives to web
// captures.

pub mod extract;
pub mod fetch;
pub mod versions;

use std::fs;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::constants::JOB_MAX_ATTEMPTS;
use crate::db::schema;
use crate::error::{CoreError, Result};
use crate::hash::derive_entity_id;
use crate::jobs;
use crate::media_path::MediaPathPlanner;

/// Register a URL for archival and enqueue the job that actually fetches
/// it. The capture directory is resolved up front (while a `MediaPathPlanner`
/// is on hand) and carried in the job payload, so the queue handler itself
/// needs only the database connection.
pub fn archive_url(
    conn: &Connection,
    planner: &MediaPathPlanner,
    location_id: Option<&str>,
    url: &str,
) -> Result<String> {
    let now = chrono::Utc::now().to_rfc3339();
    let id = derive_entity_id(&now, url);
    schema::insert_web_source(conn, &id, url, location_id)?;

    let capture_dir = match location_id {
        Some(loc) => planner.location_web_sources_dir(loc),
        None => planner.unlinked_web_sources_dir(),
    };
    fs::create_dir_all(&capture_dir).map_err(|e| CoreError::Io {
        path: capture_dir.display().to_string(),
        source: e,
    })?;

    let payload = serde_json::to_string(&ExtractionJobPayload {
        id: id.clone(),
        url: url.to_string(),
        capture_dir: capture_dir.display().to_string(),
    })?;
    jobs::create_job(conn, "extraction", 0, &payload, None, JOB_MAX_ATTEMPTS)?;

    Ok(id)
}

#[derive(Deserialize)]
struct ExtractionJobPayload {
    id: String,
    url: String,
    capture_dir: String,
}

/// Job handler for the `extraction` queue: fetch, hash, store, extract,
/// version, and index one web source capture.
pub fn run_extraction_job(conn: &Connection, job: &schema::Job) -> Result<String> {
    let payload: ExtractionJobPayload = serde_json::from_str(&job.payload_json)?;
    let capture_dir = PathBuf::from(&payload.capture_dir);

    let fetched = fetch::fetch(&payload.url)?;
    let mut component_status = serde_json::Map::new();

    let (title, extracted_text, html_hash, html_path) = if let Some(html) = &fetched.html {
        let hash = blake3::hash(html.as_bytes()).to_hex().to_string();
        let path = capture_dir.join(format!("{}.html", hash));
        write_bytes(&path, html.as_bytes())?;

        let metadata = extract::extract(html);
        let title = metadata
            .title
            .clone()
            .or(metadata.og_title.clone())
            .or(metadata.twitter_title.clone());

        let warc = fetch::write_warc_record(&payload.url, fetched.status, fetched.content_type.as_deref(), html);
        let warc_hash = blake3::hash(&warc).to_hex().to_string();
        let warc_path = capture_dir.join(format!("{}.warc", warc_hash));
        write_bytes(&warc_path, &warc)?;

        component_status.insert("html".into(), serde_json::json!("captured"));
        component_status.insert("warc".into(), serde_json::json!("captured"));
        component_status.insert("screenshot".into(), serde_json::json!("unavailable"));

        let metadata_json = serde_json::to_string(&metadata)?;
        versions::record_if_changed(conn, &payload.id, Some(&hash), Some(&metadata.text))?;
        update_paths(conn, &payload.id, Some(&path), Some(&hash), None, None, Some(&warc_path), Some(&warc_hash))?;

        (title, Some(metadata.text), Some(hash), Some(path))
    } else if let Some(pdf_bytes) = &fetched.pdf_bytes {
        let hash = blake3::hash(pdf_bytes).to_hex().to_string();
        let path = capture_dir.join(format!("{}.pdf", hash));
        write_bytes(&path, pdf_bytes)?;

        component_status.insert("pdf".into(), serde_json::json!("captured"));
        component_status.insert(
            "pdf_text".into(),
            serde_json::json!("unavailable: no bundled PDF text extractor configured"),
        );

        update_paths(conn, &payload.id, None, None, Some(&path), Some(&hash), None, None)?;
        (None, None, None, Some(path))
    } else {
        (None, None, None, None)
    };

    let component_status_json = serde_json::to_string(&component_status)?;
    schema::update_web_source_capture(
        conn,
        &payload.id,
        title.as_deref(),
        extracted_text.as_deref(),
        &component_status_json,
    )?;

    Ok(serde_json::json!({
        "id": payload.id,
        "html_hash": html_hash,
        "html_path": html_path.map(|p| p.display().to_string()),
    })
    .to_string())
}

#[allow(clippy::too_many_arguments)]
fn update_paths(
    conn: &Connection,
    id: &str,
    html_path: Option<&PathBuf>,
    html_hash: Option<&str>,
    pdf_path: Option<&PathBuf>,
    pdf_hash: Option<&str>,
    warc_path: Option<&PathBuf>,
    warc_hash: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE web_sources SET
            html_path = COALESCE(?1, html_path), html_hash = COALESCE(?2, html_hash),
            pdf_path = COALESCE(?3, pdf_path), pdf_hash = COALESCE(?4, pdf_hash),
            warc_path = COALESCE(?5, warc_path), warc_hash = COALESCE(?6, warc_hash)
         WHERE id = ?7",
        rusqlite::params![
            html_path.map(|p| p.display().to_string()),
            html_hash,
            pdf_path.map(|p| p.display().to_string()),
            pdf_hash,
            warc_path.map(|p| p.display().to_string()),
            warc_hash,
            id,
        ],
    )?;
    Ok(())
}

fn write_bytes(path: &std::path::Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| CoreError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Full-text search over every captured page's extracted text.
pub fn search(conn: &Connection, query: &str, limit: i64) -> Result<Vec<String>> {
    schema::search_web_sources_fts(conn, query, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use tempfile::tempdir;

    #[test]
    fn archive_url_creates_pending_row_and_job() {
        let dir = tempdir().unwrap();
        let planner = MediaPathPlanner::new(dir.path());
        planner.ensure_directories().unwrap();
        let conn = Connection::open(planner.db_path()).unwrap();
        run_migrations(&conn).unwrap();
        schema::insert_location(&conn, "loc1", "Test", None, None, None).unwrap();
        planner.ensure_location_directories("loc1").unwrap();

        let id = archive_url(&conn, &planner, Some("loc1"), "https://example.com/page").unwrap();
        let pending = jobs::count_pending_by_queue(&conn).unwrap();
        assert!(pending.iter().any(|(q, n)| q == "extraction" && *n == 1));
        assert!(!id.is_empty());
    }
}
