// Metadata extraction module

pub mod exiftool;
pub mod ffprobe;

use std::path::Path;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::db::schema;
use crate::error::Result;

/// Combined metadata from all sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaMetadata {
    // Video properties
    pub duration_ms: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub fps: Option<f64>,
    pub codec: Option<String>,
    pub bitrate: Option<i64>,

    // Audio properties (present on videos and standalone audio sidecars)
    pub audio_codec: Option<String>,
    pub audio_channels: Option<i32>,
    pub audio_sample_rate: Option<i64>,

    // Date/time
    pub recorded_at: Option<String>,
    pub recorded_at_source: Option<String>,

    // Camera info
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,

    // Media kind
    pub media_type: String,
}

/// Extract metadata from a media file, preferring exiftool's camera and GPS
/// fields (more reliable for original-capture files) over ffprobe's stream
/// info, falling back to ffprobe alone when exiftool is unavailable or the
/// format gives it nothing.
pub fn extract_metadata(path: &Path) -> Result<MediaMetadata> {
    let mut meta = ffprobe::probe(path)?;

    if let Ok(exif) = exiftool::extract(path) {
        if exif.recorded_at.is_some() {
            meta.recorded_at = exif.recorded_at;
            meta.recorded_at_source = Some("exiftool".to_string());
        }
        meta.camera_make = meta.camera_make.or(exif.camera_make);
        meta.camera_model = meta.camera_model.or(exif.camera_model);
        meta.gps_latitude = meta.gps_latitude.or(exif.gps_latitude);
        meta.gps_longitude = meta.gps_longitude.or(exif.gps_longitude);
    }

    Ok(meta)
}

/// Determine media kind from file extension: one of the four kinds the
/// catalog stores separately (image, video, document, map).
pub fn detect_media_type(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if crate::constants::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        "image".to_string()
    } else if crate::constants::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        "video".to_string()
    } else if crate::constants::DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
        "document".to_string()
    } else if crate::constants::MAP_EXTENSIONS.contains(&ext.as_str()) {
        "map".to_string()
    } else {
        "document".to_string()
    }
}

/// Try to parse a timestamp out of a folder name (e.g. "2019-07-04" or
/// "20190704 Site Visit"), used by the import pipeline when a file itself
/// carries no capture date.
pub fn parse_folder_date(folder_name: &str) -> Option<String> {
    if let Ok(date) = chrono::NaiveDate::parse_from_str(folder_name, "%Y-%m-%d") {
        return Some(format!("{}T00:00:00Z", date));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(folder_name, "%Y%m%d") {
        return Some(format!("{}T00:00:00Z", date));
    }

    let date_regex = regex::Regex::new(r"(\d{4})-(\d{2})-(\d{2})").ok()?;
    let caps = date_regex.captures(folder_name)?;
    Some(format!(
        "{}-{}-{}T00:00:00Z",
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        caps.get(3)?.as_str()
    ))
}

#[derive(Deserialize)]
struct ExiftoolJobPayload {
    hash: String,
    table: String,
    archive_path: String,
}

/// Job handler for the `exiftool` queue: run full metadata extraction
/// against an already-copied archive file and persist the results onto its
/// media row (exif_json plus the denormalized gps/captured_at columns used
/// by the map and timeline views).
pub fn run_exiftool_job(conn: &Connection, job: &schema::Job) -> Result<String> {
    let payload: ExiftoolJobPayload = serde_json::from_str(&job.payload_json)?;
    let meta = extract_metadata(Path::new(&payload.archive_path))?;
    let exif_json = serde_json::to_string(&meta)?;

    let sql = format!(
        "UPDATE {} SET exif_json = ?1, gps_lat = COALESCE(gps_lat, ?2), gps_lng = COALESCE(gps_lng, ?3), \
         captured_at = COALESCE(captured_at, ?4) WHERE hash = ?5",
        payload.table
    );
    conn.execute(
        &sql,
        params![
            exif_json,
            meta.gps_latitude,
            meta.gps_longitude,
            meta.recorded_at,
            payload.hash,
        ],
    )?;

    Ok(exif_json)
}
