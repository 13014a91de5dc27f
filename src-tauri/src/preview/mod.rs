// Preview pipeline: thumbnails (three tiers) and video proxies, keyed by
// content hash rather than by clip/asset id since every media row's
// identity already is its hash. Grounded on the teacher's preview/mod.rs
// (DerivedParams/staleness-by-pipeline-version idea, job-queueing shape),
// generalized from a library-relative derived-asset table to the Media
// Path Planner's `{tier}/{bucket}/{hash}.jpg` layout.

pub mod proxy;
pub mod thumb;

use std::path::Path;

use rusqlite::Connection;
use serde::Deserialize;

use crate::db::schema;
use crate::error::Result;
use crate::media_path::MediaPathPlanner;
use crate::metadata::MediaMetadata;

#[derive(Deserialize)]
struct PreviewJobPayload {
    hash: String,
    table: String,
    archive_path: String,
    #[serde(default)]
    duration_ms: Option<i64>,
}

/// Job handler for the `thumbnail` queue: generate all three thumbnail
/// tiers for one media item and record their paths on its row.
pub fn run_thumbnail_job(conn: &Connection, planner: &MediaPathPlanner, job: &schema::Job) -> Result<String> {
    let payload: PreviewJobPayload = serde_json::from_str(&job.payload_json)?;
    let source = Path::new(&payload.archive_path);
    let is_video = crate::metadata::detect_media_type(source) == "video";

    let mut written = Vec::new();
    for (tier, max_width) in crate::constants::THUMB_SIZES.iter() {
        let output = planner.thumbnail_path(&payload.hash, tier)?;
        let options = thumb::ThumbOptions {
            max_width: *max_width,
            ..Default::default()
        };

        if is_video {
            thumb::generate_thumbnail(source, &output, payload.duration_ms, &options)?;
        } else {
            thumb::generate_image_thumbnail(source, &output, &options)?;
        }
        written.push((*tier, output));
    }

    let sm = written.iter().find(|(t, _)| *t == "sm").map(|(_, p)| p.display().to_string());
    let lg = written.iter().find(|(t, _)| *t == "lg").map(|(_, p)| p.display().to_string());
    let preview = written
        .iter()
        .find(|(t, _)| *t == "preview")
        .map(|(_, p)| p.display().to_string());

    let sql = format!(
        "UPDATE {} SET thumb_sm_path = ?1, thumb_lg_path = ?2, thumb_preview_path = ?3 WHERE hash = ?4",
        payload.table
    );
    conn.execute(&sql, rusqlite::params![sm, lg, preview, payload.hash])?;

    Ok(serde_json::to_string(&written.into_iter().map(|(t, p)| (t, p.display().to_string())).collect::<Vec<_>>())?)
}

/// Job handler for the `proxy` queue: generate a 720p H.264 proxy for a
/// video item so the UI never plays back a multi-gigabyte original.
pub fn run_proxy_job(conn: &Connection, planner: &MediaPathPlanner, job: &schema::Job) -> Result<String> {
    let payload: PreviewJobPayload = serde_json::from_str(&job.payload_json)?;
    let source = Path::new(&payload.archive_path);
    let output = planner.proxy_path(&payload.hash)?;

    let metadata = crate::metadata::extract_metadata(source).unwrap_or_default();
    let options = proxy::ProxyOptions {
        deinterlace: proxy::needs_deinterlace(&metadata),
        ..Default::default()
    };
    proxy::generate_proxy(source, &output, &options)?;

    let _ = conn; // proxy path is derivable from the hash; nothing to persist yet
    Ok(output.display().to_string())
}

/// Placeholder metadata used only to decide deinterlace heuristics when the
/// caller has no metadata on hand yet.
pub fn default_metadata() -> MediaMetadata {
    MediaMetadata::default()
}
