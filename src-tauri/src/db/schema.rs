// Catalog schema: table DDL (consumed by db::migrations) plus the typed
// row structs and CRUD helpers the rest of the core uses to talk to
// sqlite. Grounded on the teacher's db/schema.rs: one struct per entity,
// free functions taking `&Connection`, `rusqlite::params!` for binding,
// `OptionalExtension` for single-row lookups.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------
// DDL. Each constant is one `CREATE TABLE IF NOT EXISTS` or
// `CREATE INDEX IF NOT EXISTS` statement, applied by an Additive step in
// db::migrations. Kept here, next to the structs that mirror the columns,
// so the two never drift silently out of sync.
// ---------------------------------------------------------------------

pub const CREATE_LOCATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS locations (
    id                      TEXT PRIMARY KEY,
    name                    TEXT NOT NULL,
    short_name              TEXT,
    alternate_name          TEXT,
    category                TEXT,
    class                   TEXT,
    gps_lat                 REAL,
    gps_lng                 REAL,
    gps_accuracy_m          REAL,
    gps_source              TEXT,
    gps_tier                TEXT,
    gps_verified_on_map     INTEGER NOT NULL DEFAULT 0,
    gps_verification_meta   TEXT,
    addr_street             TEXT,
    addr_city               TEXT,
    addr_county             TEXT,
    addr_state              TEXT,
    addr_zipcode            TEXT,
    addr_confidence         REAL,
    addr_raw                TEXT,
    addr_normalized         TEXT,
    addr_parsed             TEXT,
    addr_source             TEXT,
    addr_verified           INTEGER NOT NULL DEFAULT 0,
    census_region           TEXT,
    census_division         TEXT,
    state_direction         TEXT,
    cultural_region         TEXT,
    country_cultural_region TEXT,
    country                 TEXT,
    continent               TEXT,
    built_abandoned_year    TEXT,
    year_precision          TEXT NOT NULL DEFAULT 'year',
    has_interior_docs       INTEGER NOT NULL DEFAULT 0,
    has_exterior_docs       INTEGER NOT NULL DEFAULT 0,
    has_drone_docs          INTEGER NOT NULL DEFAULT 0,
    has_web_history_docs    INTEGER NOT NULL DEFAULT 0,
    has_map_find_docs       INTEGER NOT NULL DEFAULT 0,
    is_project              INTEGER NOT NULL DEFAULT 0,
    is_favorite             INTEGER NOT NULL DEFAULT 0,
    is_historic             INTEGER NOT NULL DEFAULT 0,
    hero_media_hash         TEXT,
    hero_focal_x            REAL,
    hero_focal_y            REAL,
    created_by              TEXT,
    last_modified_by        TEXT,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL,
    media_image_count       INTEGER NOT NULL DEFAULT 0,
    media_video_count       INTEGER NOT NULL DEFAULT 0,
    media_document_count    INTEGER NOT NULL DEFAULT 0,
    media_map_count         INTEGER NOT NULL DEFAULT 0,
    media_total_bytes       INTEGER NOT NULL DEFAULT 0,
    earliest_media_date     TEXT,
    latest_media_date       TEXT,
    bagit_status            TEXT NOT NULL DEFAULT 'none',
    bagit_last_verified_at  TEXT,
    bagit_last_error        TEXT,
    host_only               INTEGER NOT NULL DEFAULT 0,
    view_count              INTEGER NOT NULL DEFAULT 0
);
";

pub const CREATE_LOCATIONS_GPS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_locations_gps ON locations (gps_lat, gps_lng) WHERE gps_lat IS NOT NULL;";
pub const CREATE_LOCATIONS_NAME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_locations_name ON locations (name);";

pub const CREATE_SUB_LOCATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS sub_locations (
    id                      TEXT PRIMARY KEY,
    parent_location_id      TEXT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
    is_primary              INTEGER NOT NULL DEFAULT 0,
    name                    TEXT NOT NULL,
    short_name              TEXT,
    alternate_name          TEXT,
    category                TEXT,
    class                   TEXT,
    gps_lat                 REAL,
    gps_lng                 REAL,
    gps_accuracy_m          REAL,
    gps_source              TEXT,
    gps_tier                TEXT,
    gps_verified_on_map     INTEGER NOT NULL DEFAULT 0,
    gps_verification_meta   TEXT,
    bagit_status            TEXT NOT NULL DEFAULT 'none',
    bagit_last_verified_at  TEXT,
    bagit_last_error        TEXT,
    created_by              TEXT,
    last_modified_by        TEXT,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL,
    media_image_count       INTEGER NOT NULL DEFAULT 0,
    media_video_count       INTEGER NOT NULL DEFAULT 0,
    media_document_count    INTEGER NOT NULL DEFAULT 0,
    media_map_count         INTEGER NOT NULL DEFAULT 0,
    media_total_bytes       INTEGER NOT NULL DEFAULT 0
);
";

pub const CREATE_SUB_LOCATIONS_PARENT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_sub_locations_parent ON sub_locations (parent_location_id);";

/// Shared column set for the four media-kind tables (images, videos,
/// documents, maps). One table per kind rather than a single polymorphic
/// table, matching the data model's "one kind per table" note; `{table}`
/// and `{kind_columns}` are substituted per call site.
fn media_table_ddl(table: &str, kind_columns: &str) -> String {
    format!(
        "
CREATE TABLE IF NOT EXISTS {table} (
    hash                TEXT PRIMARY KEY,
    original_filename   TEXT NOT NULL,
    canonical_filename  TEXT NOT NULL,
    archive_path        TEXT NOT NULL,
    original_path       TEXT,
    location_id         TEXT REFERENCES locations(id) ON DELETE CASCADE,
    sub_location_id     TEXT REFERENCES sub_locations(id) ON DELETE CASCADE,
    importer            TEXT,
    import_source       TEXT,
    is_contributed      INTEGER NOT NULL DEFAULT 0,
    contribution_source TEXT,
    is_hidden           INTEGER NOT NULL DEFAULT 0,
    hidden_reason       TEXT,
    is_live_photo       INTEGER NOT NULL DEFAULT 0,
    file_size           INTEGER NOT NULL,
    exif_json           TEXT,
    gps_lat             REAL,
    gps_lng             REAL,
    thumb_sm_path       TEXT,
    thumb_lg_path       TEXT,
    thumb_preview_path  TEXT,
    auto_tags_json      TEXT,
    confidence_json     TEXT,
    view_type           TEXT,
    quality_score       REAL,
    vlm_json            TEXT,
    web_source_id       TEXT,
    captured_at         TEXT,
    created_at          TEXT NOT NULL,
    {kind_columns}
);
"
    )
}

pub fn create_media_images_table() -> String {
    media_table_ddl(
        "media_images",
        "image_width INTEGER, image_height INTEGER, perceptual_hash TEXT",
    )
}

pub fn create_media_videos_table() -> String {
    media_table_ddl(
        "media_videos",
        "video_duration_ms INTEGER, video_codec TEXT, video_fps REAL",
    )
}

pub fn create_media_documents_table() -> String {
    media_table_ddl(
        "media_documents",
        "doc_page_count INTEGER, doc_author TEXT, doc_title TEXT",
    )
}

pub fn create_media_maps_table() -> String {
    media_table_ddl("media_maps", "map_format TEXT")
}

pub const CREATE_IMPORT_SESSIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS import_sessions (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    target_location_id  TEXT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
    status              TEXT NOT NULL DEFAULT 'pending',
    source_paths_json   TEXT NOT NULL,
    scan_result_json    TEXT,
    hash_result_json    TEXT,
    copy_result_json    TEXT,
    validate_result_json TEXT,
    finalize_result_json TEXT,
    total_count         INTEGER NOT NULL DEFAULT 0,
    total_bytes         INTEGER NOT NULL DEFAULT 0,
    resumable           INTEGER NOT NULL DEFAULT 1,
    last_completed_step TEXT,
    warnings_json       TEXT,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
";

/// One row per completed import session's Finalize phase: a permanent
/// history record distinct from `import_sessions` (which is mutable,
/// resumable working state, overwritten phase by phase). Spec.md 4.E
/// requires Finalize's single transaction "insert an `imports` row" in
/// addition to the media rows and cached-counter update.
pub const CREATE_IMPORTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS imports (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    import_session_id   INTEGER NOT NULL REFERENCES import_sessions(id) ON DELETE CASCADE,
    location_id         TEXT NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
    copied_count        INTEGER NOT NULL DEFAULT 0,
    duplicate_count     INTEGER NOT NULL DEFAULT 0,
    errored_count       INTEGER NOT NULL DEFAULT 0,
    total_bytes         INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL
);
";

pub const CREATE_IMPORTS_SESSION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_imports_session ON imports (import_session_id);";

pub const CREATE_JOBS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    queue           TEXT NOT NULL,
    priority        INTEGER NOT NULL DEFAULT 0,
    status          TEXT NOT NULL DEFAULT 'pending',
    payload_json    TEXT NOT NULL,
    depends_on      INTEGER REFERENCES jobs(id),
    attempts        INTEGER NOT NULL DEFAULT 0,
    max_attempts    INTEGER NOT NULL DEFAULT 5,
    result_json     TEXT,
    last_error      TEXT,
    locked_by       TEXT,
    locked_at       TEXT,
    started_at      TEXT,
    completed_at    TEXT,
    retry_after     TEXT,
    created_at      TEXT NOT NULL
);
";

pub const CREATE_JOBS_CLAIM_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs (queue, status, priority DESC, created_at ASC);";

pub const CREATE_JOB_AUDIT_LOG_TABLE: &str = "
CREATE TABLE IF NOT EXISTS job_audit_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id      INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    event       TEXT NOT NULL,
    detail_json TEXT,
    worker_id   TEXT,
    created_at  TEXT NOT NULL
);
";

pub const CREATE_DEAD_LETTERS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS dead_letters (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id       INTEGER NOT NULL,
    queue        TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    error        TEXT NOT NULL,
    attempts     INTEGER NOT NULL,
    failed_at    TEXT NOT NULL,
    acknowledged INTEGER NOT NULL DEFAULT 0
);
";

pub const CREATE_JOB_METRICS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS job_metrics (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    queue          TEXT NOT NULL,
    window_started_at TEXT NOT NULL,
    completed_count INTEGER NOT NULL DEFAULT 0,
    failed_count    INTEGER NOT NULL DEFAULT 0,
    dead_count      INTEGER NOT NULL DEFAULT 0,
    avg_duration_ms REAL
);
";

pub const CREATE_JOB_TRACES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS job_traces (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id     INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    span_name  TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at   TEXT,
    detail_json TEXT
);
";

pub const CREATE_REF_MAPS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS ref_maps (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    file_path   TEXT NOT NULL,
    file_type   TEXT NOT NULL,
    point_count INTEGER NOT NULL DEFAULT 0,
    importer    TEXT,
    imported_at TEXT NOT NULL
);
";

pub const CREATE_REF_MAP_POINTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS ref_map_points (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    ref_map_id     INTEGER NOT NULL REFERENCES ref_maps(id) ON DELETE CASCADE,
    name           TEXT,
    description    TEXT,
    lat            REAL NOT NULL,
    lng            REAL NOT NULL,
    state          TEXT,
    category       TEXT,
    raw_metadata_json TEXT,
    aka_names      TEXT NOT NULL DEFAULT '',
    linked_locid   TEXT REFERENCES locations(id) ON DELETE SET NULL,
    linked_at      TEXT
);
";

pub const CREATE_REF_MAP_POINTS_ROUNDED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_ref_map_points_rounded ON ref_map_points (ref_map_id, round(lat, 4), round(lng, 4));";

pub const CREATE_LOCATION_EXCLUSIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS location_exclusions (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name_a        TEXT NOT NULL,
    name_b        TEXT NOT NULL,
    decision      TEXT NOT NULL,
    decided_by    TEXT,
    decided_at    TEXT NOT NULL,
    UNIQUE(name_a, name_b)
);
";

pub const CREATE_MERGE_AUDIT_LOG_TABLE: &str = "
CREATE TABLE IF NOT EXISTS merge_audit_log (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    kept_location_id TEXT NOT NULL,
    merged_location_id TEXT NOT NULL,
    reason           TEXT NOT NULL,
    score_json       TEXT,
    performed_by     TEXT,
    performed_at     TEXT NOT NULL
);
";

pub const CREATE_WEB_SOURCES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS web_sources (
    id              TEXT PRIMARY KEY,
    url             TEXT NOT NULL,
    title           TEXT,
    location_id     TEXT REFERENCES locations(id) ON DELETE CASCADE,
    source_type     TEXT,
    status          TEXT NOT NULL DEFAULT 'pending',
    component_status_json TEXT,
    extracted_text  TEXT,
    screenshot_path TEXT,
    screenshot_hash TEXT,
    pdf_path        TEXT,
    pdf_hash        TEXT,
    html_path       TEXT,
    html_hash       TEXT,
    warc_path       TEXT,
    warc_hash       TEXT,
    metadata_json   TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);
";

pub const CREATE_WEB_SOURCE_VERSIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS web_source_versions (
    id             TEXT PRIMARY KEY,
    web_source_id  TEXT NOT NULL REFERENCES web_sources(id) ON DELETE CASCADE,
    captured_at    TEXT NOT NULL,
    html_hash      TEXT,
    extracted_text TEXT,
    metadata_json  TEXT
);
";

pub const CREATE_WEB_SOURCES_FTS_TABLE: &str =
    "CREATE VIRTUAL TABLE IF NOT EXISTS web_sources_fts USING fts5(id UNINDEXED, extracted_text, tokenize = 'porter unicode61');";

pub const CREATE_WEB_SOURCES_FTS_INSERT_TRIGGER: &str = "
CREATE TRIGGER IF NOT EXISTS web_sources_fts_insert AFTER INSERT ON web_sources BEGIN
    INSERT INTO web_sources_fts (id, extracted_text) VALUES (new.id, new.extracted_text);
END;
";

pub const CREATE_WEB_SOURCES_FTS_UPDATE_TRIGGER: &str = "
CREATE TRIGGER IF NOT EXISTS web_sources_fts_update AFTER UPDATE OF extracted_text ON web_sources BEGIN
    DELETE FROM web_sources_fts WHERE id = old.id;
    INSERT INTO web_sources_fts (id, extracted_text) VALUES (new.id, new.extracted_text);
END;
";

pub const CREATE_WEB_SOURCES_FTS_DELETE_TRIGGER: &str = "
CREATE TRIGGER IF NOT EXISTS web_sources_fts_delete AFTER DELETE ON web_sources BEGIN
    DELETE FROM web_sources_fts WHERE id = old.id;
END;
";

pub const CREATE_LOCATION_TIMELINE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS location_timeline (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id       TEXT REFERENCES locations(id) ON DELETE CASCADE,
    sub_location_id   TEXT REFERENCES sub_locations(id) ON DELETE CASCADE,
    event_type        TEXT NOT NULL,
    event_subtype     TEXT,
    start_date        TEXT NOT NULL,
    start_precision   TEXT NOT NULL DEFAULT 'date',
    end_date          TEXT,
    end_precision     TEXT,
    sort_key          INTEGER NOT NULL,
    source_type       TEXT NOT NULL,
    media_count       INTEGER NOT NULL DEFAULT 0,
    media_hashes_json TEXT,
    auto_approved     INTEGER NOT NULL DEFAULT 0,
    user_approved     INTEGER NOT NULL DEFAULT 0,
    source_refs_json  TEXT NOT NULL DEFAULT '[]',
    description       TEXT,
    confidence        REAL NOT NULL DEFAULT 0.5,
    verb_context      TEXT,
    prompt_version    TEXT,
    created_at        TEXT NOT NULL
);
";

pub const CREATE_LOCATION_TIMELINE_LOCATION_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_location_timeline_location ON location_timeline (location_id, sort_key);";

// ---------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub category: Option<String>,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub addr_state: Option<String>,
    pub bagit_status: String,
    pub created_at: String,
    pub updated_at: String,
    pub media_image_count: i64,
    pub media_video_count: i64,
    pub media_document_count: i64,
    pub media_map_count: i64,
    pub media_total_bytes: i64,
}

fn row_to_location(row: &Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get("id")?,
        name: row.get("name")?,
        short_name: row.get("short_name")?,
        category: row.get("category")?,
        gps_lat: row.get("gps_lat")?,
        gps_lng: row.get("gps_lng")?,
        addr_state: row.get("addr_state")?,
        bagit_status: row.get("bagit_status")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        media_image_count: row.get("media_image_count")?,
        media_video_count: row.get("media_video_count")?,
        media_document_count: row.get("media_document_count")?,
        media_map_count: row.get("media_map_count")?,
        media_total_bytes: row.get("media_total_bytes")?,
    })
}

const LOCATION_COLUMNS: &str = "id, name, short_name, category, gps_lat, gps_lng, addr_state, \
    bagit_status, created_at, updated_at, media_image_count, media_video_count, \
    media_document_count, media_map_count, media_total_bytes";

pub fn insert_location(
    conn: &Connection,
    id: &str,
    name: &str,
    gps_lat: Option<f64>,
    gps_lng: Option<f64>,
    created_by: Option<&str>,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO locations (id, name, gps_lat, gps_lng, created_by, last_modified_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?6)",
        params![id, name, gps_lat, gps_lng, created_by, now],
    )?;
    Ok(())
}

pub fn get_location(conn: &Connection, id: &str) -> Result<Option<Location>> {
    let sql = format!("SELECT {} FROM locations WHERE id = ?1", LOCATION_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id], row_to_location)
        .optional()?)
}

pub fn list_locations(conn: &Connection) -> Result<Vec<Location>> {
    let sql = format!("SELECT {} FROM locations ORDER BY name ASC", LOCATION_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_location)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Recompute and persist the cached media counters and bytes on a location
/// row. Called by the import pipeline's finalize phase after each batch.
pub fn refresh_location_media_counts(conn: &Connection, location_id: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE locations SET
            media_image_count = (SELECT COUNT(*) FROM media_images WHERE location_id = ?1),
            media_video_count = (SELECT COUNT(*) FROM media_videos WHERE location_id = ?1),
            media_document_count = (SELECT COUNT(*) FROM media_documents WHERE location_id = ?1),
            media_map_count = (SELECT COUNT(*) FROM media_maps WHERE location_id = ?1),
            media_total_bytes = (
                SELECT COALESCE(SUM(file_size), 0) FROM (
                    SELECT file_size FROM media_images WHERE location_id = ?1
                    UNION ALL SELECT file_size FROM media_videos WHERE location_id = ?1
                    UNION ALL SELECT file_size FROM media_documents WHERE location_id = ?1
                    UNION ALL SELECT file_size FROM media_maps WHERE location_id = ?1
                )
            ),
            earliest_media_date = (
                SELECT MIN(captured_at) FROM (
                    SELECT captured_at FROM media_images WHERE location_id = ?1
                    UNION ALL SELECT captured_at FROM media_videos WHERE location_id = ?1
                )
            ),
            latest_media_date = (
                SELECT MAX(captured_at) FROM (
                    SELECT captured_at FROM media_images WHERE location_id = ?1
                    UNION ALL SELECT captured_at FROM media_videos WHERE location_id = ?1
                )
            ),
            updated_at = ?2
         WHERE id = ?1",
        params![location_id, now],
    )?;
    Ok(())
}

/// Content hash and archive-relative path for every media row belonging to
/// `location_id`, across all four kind tables. Used by the BagIt validator
/// to build and check `manifest-blake3.txt`.
pub fn list_media_archive_paths_for_location(conn: &Connection, location_id: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT hash, archive_path FROM media_images WHERE location_id = ?1
         UNION ALL SELECT hash, archive_path FROM media_videos WHERE location_id = ?1
         UNION ALL SELECT hash, archive_path FROM media_documents WHERE location_id = ?1
         UNION ALL SELECT hash, archive_path FROM media_maps WHERE location_id = ?1",
    )?;
    let rows = stmt.query_map(params![location_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Re-home every child row (media of all four kinds, sub-locations,
/// timeline events, web sources) from `from_id` onto `to_id`. Used by the
/// merge engine to reattach a losing location's records to the survivor
/// before the losing row is deleted.
pub fn reattach_location_children(conn: &Connection, from_id: &str, to_id: &str) -> Result<()> {
    for table in ["media_images", "media_videos", "media_documents", "media_maps"] {
        let sql = format!("UPDATE {} SET location_id = ?1 WHERE location_id = ?2", table);
        conn.execute(&sql, params![to_id, from_id])?;
    }
    conn.execute(
        "UPDATE sub_locations SET parent_location_id = ?1 WHERE parent_location_id = ?2",
        params![to_id, from_id],
    )?;
    conn.execute(
        "UPDATE location_timeline SET location_id = ?1 WHERE location_id = ?2",
        params![to_id, from_id],
    )?;
    conn.execute(
        "UPDATE web_sources SET location_id = ?1 WHERE location_id = ?2",
        params![to_id, from_id],
    )?;
    conn.execute(
        "UPDATE ref_map_points SET linked_locid = ?1 WHERE linked_locid = ?2",
        params![to_id, from_id],
    )?;
    Ok(())
}

pub fn delete_location(conn: &Connection, location_id: &str) -> Result<()> {
    conn.execute("DELETE FROM locations WHERE id = ?1", params![location_id])?;
    Ok(())
}

pub fn set_bagit_status(conn: &Connection, location_id: &str, status: &str, error: Option<&str>) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE locations SET bagit_status = ?1, bagit_last_verified_at = ?2, bagit_last_error = ?3 WHERE id = ?4",
        params![status, now, error, location_id],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------
// Sub-locations
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubLocation {
    pub id: String,
    pub parent_location_id: String,
    pub is_primary: bool,
    pub name: String,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub bagit_status: String,
    pub created_at: String,
}

pub fn insert_sub_location(
    conn: &Connection,
    id: &str,
    parent_location_id: &str,
    name: &str,
    is_primary: bool,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO sub_locations (id, parent_location_id, name, is_primary, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, parent_location_id, name, is_primary, now],
    )?;
    Ok(())
}

pub fn get_sub_location(conn: &Connection, id: &str) -> Result<Option<SubLocation>> {
    Ok(conn
        .query_row(
            "SELECT id, parent_location_id, is_primary, name, gps_lat, gps_lng, bagit_status, created_at
             FROM sub_locations WHERE id = ?1",
            params![id],
            |row| {
                Ok(SubLocation {
                    id: row.get(0)?,
                    parent_location_id: row.get(1)?,
                    is_primary: row.get(2)?,
                    name: row.get(3)?,
                    gps_lat: row.get(4)?,
                    gps_lng: row.get(5)?,
                    bagit_status: row.get(6)?,
                    created_at: row.get(7)?,
                })
            },
        )
        .optional()?)
}

// ---------------------------------------------------------------------
// Media (images table shown in full; videos/documents/maps mirror it)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMediaImage {
    pub hash: String,
    pub original_filename: String,
    pub canonical_filename: String,
    pub archive_path: String,
    pub original_path: Option<String>,
    pub location_id: Option<String>,
    pub sub_location_id: Option<String>,
    pub importer: Option<String>,
    pub file_size: i64,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub captured_at: Option<String>,
    pub image_width: Option<i64>,
    pub image_height: Option<i64>,
    pub perceptual_hash: Option<String>,
}

/// Insert a media_images row, or do nothing if the hash already exists.
/// Returns `true` if a new row was inserted, `false` on a PK collision —
/// the import pipeline's duplicate-policy contract (invariant: a re-import
/// is idempotent, never an error).
pub fn insert_media_image_if_absent(conn: &Connection, media: &NewMediaImage) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let changed = conn.execute(
        "INSERT INTO media_images (
            hash, original_filename, canonical_filename, archive_path, original_path,
            location_id, sub_location_id, importer, file_size, gps_lat, gps_lng,
            captured_at, image_width, image_height, perceptual_hash, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(hash) DO NOTHING",
        params![
            media.hash,
            media.original_filename,
            media.canonical_filename,
            media.archive_path,
            media.original_path,
            media.location_id,
            media.sub_location_id,
            media.importer,
            media.file_size,
            media.gps_lat,
            media.gps_lng,
            media.captured_at,
            media.image_width,
            media.image_height,
            media.perceptual_hash,
            now,
        ],
    )?;
    Ok(changed > 0)
}

/// Shared fields across the four media-kind tables, used by the
/// kind-specific `NewMedia*` structs via composition rather than
/// duplicating every column four times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMediaCommon {
    pub hash: String,
    pub original_filename: String,
    pub canonical_filename: String,
    pub archive_path: String,
    pub original_path: Option<String>,
    pub location_id: Option<String>,
    pub sub_location_id: Option<String>,
    pub importer: Option<String>,
    pub file_size: i64,
    pub gps_lat: Option<f64>,
    pub gps_lng: Option<f64>,
    pub captured_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMediaVideo {
    pub common: NewMediaCommon,
    pub video_duration_ms: Option<i64>,
    pub video_codec: Option<String>,
    pub video_fps: Option<f64>,
}

pub fn insert_media_video_if_absent(conn: &Connection, media: &NewMediaVideo) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let c = &media.common;
    let changed = conn.execute(
        "INSERT INTO media_videos (
            hash, original_filename, canonical_filename, archive_path, original_path,
            location_id, sub_location_id, importer, file_size, gps_lat, gps_lng,
            captured_at, video_duration_ms, video_codec, video_fps, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(hash) DO NOTHING",
        params![
            c.hash, c.original_filename, c.canonical_filename, c.archive_path, c.original_path,
            c.location_id, c.sub_location_id, c.importer, c.file_size, c.gps_lat, c.gps_lng,
            c.captured_at, media.video_duration_ms, media.video_codec, media.video_fps, now,
        ],
    )?;
    Ok(changed > 0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMediaDocument {
    pub common: NewMediaCommon,
    pub doc_page_count: Option<i64>,
    pub doc_author: Option<String>,
    pub doc_title: Option<String>,
}

pub fn insert_media_document_if_absent(conn: &Connection, media: &NewMediaDocument) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let c = &media.common;
    let changed = conn.execute(
        "INSERT INTO media_documents (
            hash, original_filename, canonical_filename, archive_path, original_path,
            location_id, sub_location_id, importer, file_size, gps_lat, gps_lng,
            captured_at, doc_page_count, doc_author, doc_title, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(hash) DO NOTHING",
        params![
            c.hash, c.original_filename, c.canonical_filename, c.archive_path, c.original_path,
            c.location_id, c.sub_location_id, c.importer, c.file_size, c.gps_lat, c.gps_lng,
            c.captured_at, media.doc_page_count, media.doc_author, media.doc_title, now,
        ],
    )?;
    Ok(changed > 0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMediaMap {
    pub common: NewMediaCommon,
    pub map_format: Option<String>,
}

pub fn insert_media_map_if_absent(conn: &Connection, media: &NewMediaMap) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let c = &media.common;
    let changed = conn.execute(
        "INSERT INTO media_maps (
            hash, original_filename, canonical_filename, archive_path, original_path,
            location_id, sub_location_id, importer, file_size, gps_lat, gps_lng,
            captured_at, map_format, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
         ON CONFLICT(hash) DO NOTHING",
        params![
            c.hash, c.original_filename, c.canonical_filename, c.archive_path, c.original_path,
            c.location_id, c.sub_location_id, c.importer, c.file_size, c.gps_lat, c.gps_lng,
            c.captured_at, media.map_format, now,
        ],
    )?;
    Ok(changed > 0)
}

pub fn media_image_exists(conn: &Connection, hash: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM media_images WHERE hash = ?1",
            params![hash],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

/// Check existence of a hash across all four media-kind tables — used by
/// the import pipeline's hash phase to decide `duplicate` vs `copied`
/// without knowing the media kind ahead of time.
pub fn any_media_hash_exists(conn: &Connection, hash: &str) -> Result<bool> {
    for table in ["media_images", "media_videos", "media_documents", "media_maps"] {
        let sql = format!("SELECT 1 FROM {} WHERE hash = ?1", table);
        if conn
            .query_row(&sql, params![hash], |_| Ok(()))
            .optional()?
            .is_some()
        {
            return Ok(true);
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------
// Import sessions
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSession {
    pub id: i64,
    pub target_location_id: String,
    pub status: String,
    pub source_paths_json: String,
    pub total_count: i64,
    pub total_bytes: i64,
    pub resumable: bool,
    pub last_completed_step: Option<String>,
    pub created_at: String,
}

pub fn create_import_session(conn: &Connection, target_location_id: &str, source_paths_json: &str) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO import_sessions (target_location_id, status, source_paths_json, created_at, updated_at)
         VALUES (?1, 'pending', ?2, ?3, ?3)",
        params![target_location_id, source_paths_json, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_import_session(conn: &Connection, id: i64) -> Result<Option<ImportSession>> {
    Ok(conn
        .query_row(
            "SELECT id, target_location_id, status, source_paths_json, total_count, total_bytes,
                    resumable, last_completed_step, created_at
             FROM import_sessions WHERE id = ?1",
            params![id],
            |row| {
                Ok(ImportSession {
                    id: row.get(0)?,
                    target_location_id: row.get(1)?,
                    status: row.get(2)?,
                    source_paths_json: row.get(3)?,
                    total_count: row.get(4)?,
                    total_bytes: row.get(5)?,
                    resumable: row.get(6)?,
                    last_completed_step: row.get(7)?,
                    created_at: row.get(8)?,
                })
            },
        )
        .optional()?)
}

pub fn update_import_session_phase(
    conn: &Connection,
    id: i64,
    status: &str,
    last_completed_step: &str,
    result_column: &str,
    result_json: &str,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let sql = format!(
        "UPDATE import_sessions SET status = ?1, last_completed_step = ?2, {} = ?3, updated_at = ?4 WHERE id = ?5",
        result_column
    );
    conn.execute(&sql, params![status, last_completed_step, result_json, now, id])?;
    Ok(())
}

/// Record a completed import session's Finalize outcome as a permanent
/// `imports` row (spec.md 4.E), distinct from the resumable
/// `import_sessions` working state.
pub fn insert_import_record(
    conn: &Connection,
    import_session_id: i64,
    location_id: &str,
    copied_count: i64,
    duplicate_count: i64,
    errored_count: i64,
    total_bytes: i64,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO imports (import_session_id, location_id, copied_count, duplicate_count, errored_count, total_bytes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![import_session_id, location_id, copied_count, duplicate_count, errored_count, total_bytes, now],
    )?;
    Ok(conn.last_insert_rowid())
}

// ---------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub queue: String,
    pub priority: i64,
    pub status: String,
    pub payload_json: String,
    pub depends_on: Option<i64>,
    pub attempts: i64,
    pub max_attempts: i64,
    pub result_json: Option<String>,
    pub last_error: Option<String>,
    pub locked_by: Option<String>,
    pub created_at: String,
}

fn row_to_job(row: &Row) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get("id")?,
        queue: row.get("queue")?,
        priority: row.get("priority")?,
        status: row.get("status")?,
        payload_json: row.get("payload_json")?,
        depends_on: row.get("depends_on")?,
        attempts: row.get("attempts")?,
        max_attempts: row.get("max_attempts")?,
        result_json: row.get("result_json")?,
        last_error: row.get("last_error")?,
        locked_by: row.get("locked_by")?,
        created_at: row.get("created_at")?,
    })
}

const JOB_COLUMNS: &str = "id, queue, priority, status, payload_json, depends_on, attempts, \
    max_attempts, result_json, last_error, locked_by, created_at";

pub fn create_job(
    conn: &Connection,
    queue: &str,
    priority: i64,
    payload_json: &str,
    depends_on: Option<i64>,
    max_attempts: i64,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO jobs (queue, priority, status, payload_json, depends_on, max_attempts, created_at)
         VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6)",
        params![queue, priority, payload_json, depends_on, max_attempts, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_job(conn: &Connection, id: i64) -> Result<Option<Job>> {
    let sql = format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_job).optional()?)
}

/// List jobs, optionally filtered to one queue and/or one status, newest
/// first, capped at `limit`.
pub fn list_jobs(conn: &Connection, queue: Option<&str>, status: Option<&str>, limit: i64) -> Result<Vec<Job>> {
    let mut sql = format!("SELECT {} FROM jobs WHERE 1 = 1", JOB_COLUMNS);
    if queue.is_some() {
        sql.push_str(" AND queue = ?1");
    }
    if status.is_some() {
        sql.push_str(if queue.is_some() { " AND status = ?2" } else { " AND status = ?1" });
    }
    sql.push_str(" ORDER BY id DESC LIMIT ");
    sql.push_str(&limit.to_string());

    let mut stmt = conn.prepare(&sql)?;
    let rows = match (queue, status) {
        (Some(q), Some(s)) => stmt.query_map(params![q, s], row_to_job)?.collect::<std::result::Result<Vec<_>, _>>(),
        (Some(q), None) => stmt.query_map(params![q], row_to_job)?.collect::<std::result::Result<Vec<_>, _>>(),
        (None, Some(s)) => stmt.query_map(params![s], row_to_job)?.collect::<std::result::Result<Vec<_>, _>>(),
        (None, None) => stmt.query_map([], row_to_job)?.collect::<std::result::Result<Vec<_>, _>>(),
    };
    Ok(rows?)
}

// ---------------------------------------------------------------------
// Reference maps
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefMapPoint {
    pub id: i64,
    pub ref_map_id: i64,
    pub name: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub aka_names: String,
    pub linked_locid: Option<String>,
}

pub fn insert_ref_map(conn: &Connection, name: &str, file_path: &str, file_type: &str, importer: Option<&str>) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ref_maps (name, file_path, file_type, importer, imported_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, file_path, file_type, importer, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_ref_map_point(
    conn: &Connection,
    ref_map_id: i64,
    name: Option<&str>,
    lat: f64,
    lng: f64,
    aka_names: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO ref_map_points (ref_map_id, name, lat, lng, aka_names) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![ref_map_id, name, lat, lng, aka_names],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_ref_map_point_at_rounded(
    conn: &Connection,
    ref_map_id: i64,
    lat: f64,
    lng: f64,
    decimals: i32,
) -> Result<Option<RefMapPoint>> {
    Ok(conn
        .query_row(
            "SELECT id, ref_map_id, name, lat, lng, aka_names, linked_locid FROM ref_map_points
             WHERE ref_map_id = ?1 AND round(lat, ?2) = round(?3, ?2) AND round(lng, ?2) = round(?4, ?2)",
            params![ref_map_id, decimals, lat, lng],
            |row| {
                Ok(RefMapPoint {
                    id: row.get(0)?,
                    ref_map_id: row.get(1)?,
                    name: row.get(2)?,
                    lat: row.get(3)?,
                    lng: row.get(4)?,
                    aka_names: row.get(5)?,
                    linked_locid: row.get(6)?,
                })
            },
        )
        .optional()?)
}

pub fn merge_aka_name(conn: &Connection, point_id: i64, new_name: &str) -> Result<()> {
    conn.execute(
        "UPDATE ref_map_points SET aka_names =
            CASE WHEN aka_names = '' THEN ?2
                 WHEN ',' || aka_names || ',' LIKE '%,' || ?2 || ',%' THEN aka_names
                 ELSE aka_names || ',' || ?2 END
         WHERE id = ?1",
        params![point_id, new_name],
    )?;
    Ok(())
}

pub fn list_ref_map_points(conn: &Connection, ref_map_id: i64) -> Result<Vec<RefMapPoint>> {
    let mut stmt = conn.prepare(
        "SELECT id, ref_map_id, name, lat, lng, aka_names, linked_locid
         FROM ref_map_points WHERE ref_map_id = ?1",
    )?;
    let rows = stmt.query_map(params![ref_map_id], |row| {
        Ok(RefMapPoint {
            id: row.get(0)?,
            ref_map_id: row.get(1)?,
            name: row.get(2)?,
            lat: row.get(3)?,
            lng: row.get(4)?,
            aka_names: row.get(5)?,
            linked_locid: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Every reference point not yet attached to a catalog location — the
/// linking job's candidate pool.
pub fn list_unlinked_ref_map_points(conn: &Connection) -> Result<Vec<RefMapPoint>> {
    let mut stmt = conn.prepare(
        "SELECT id, ref_map_id, name, lat, lng, aka_names, linked_locid
         FROM ref_map_points WHERE linked_locid IS NULL",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RefMapPoint {
            id: row.get(0)?,
            ref_map_id: row.get(1)?,
            name: row.get(2)?,
            lat: row.get(3)?,
            lng: row.get(4)?,
            aka_names: row.get(5)?,
            linked_locid: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn link_ref_map_point(conn: &Connection, point_id: i64, location_id: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE ref_map_points SET linked_locid = ?1, linked_at = ?2 WHERE id = ?3",
        params![location_id, now, point_id],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------
// Location exclusions and merge audit
// ---------------------------------------------------------------------

pub fn is_merge_excluded(conn: &Connection, name_a: &str, name_b: &str) -> Result<bool> {
    let (lo, hi) = if name_a <= name_b { (name_a, name_b) } else { (name_b, name_a) };
    Ok(conn
        .query_row(
            "SELECT 1 FROM location_exclusions WHERE name_a = ?1 AND name_b = ?2",
            params![lo, hi],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub fn record_merge_exclusion(conn: &Connection, name_a: &str, name_b: &str, decision: &str, decided_by: Option<&str>) -> Result<()> {
    let (lo, hi) = if name_a <= name_b { (name_a, name_b) } else { (name_b, name_a) };
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO location_exclusions (name_a, name_b, decision, decided_by, decided_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(name_a, name_b) DO UPDATE SET decision = excluded.decision, decided_at = excluded.decided_at",
        params![lo, hi, decision, decided_by, now],
    )?;
    Ok(())
}

pub fn record_merge_audit(
    conn: &Connection,
    kept_location_id: &str,
    merged_location_id: &str,
    reason: &str,
    score_json: &str,
    performed_by: Option<&str>,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO merge_audit_log (kept_location_id, merged_location_id, reason, score_json, performed_by, performed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![kept_location_id, merged_location_id, reason, score_json, performed_by, now],
    )?;
    Ok(conn.last_insert_rowid())
}

// ---------------------------------------------------------------------
// Web sources
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSource {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub location_id: Option<String>,
    pub status: String,
    pub extracted_text: Option<String>,
    pub created_at: String,
}

pub fn insert_web_source(conn: &Connection, id: &str, url: &str, location_id: Option<&str>) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO web_sources (id, url, location_id, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'pending', ?4, ?4)
         ON CONFLICT(id) DO NOTHING",
        params![id, url, location_id, now],
    )?;
    Ok(())
}

pub fn get_web_source(conn: &Connection, id: &str) -> Result<Option<WebSource>> {
    Ok(conn
        .query_row(
            "SELECT id, url, title, location_id, status, extracted_text, created_at FROM web_sources WHERE id = ?1",
            params![id],
            |row| {
                Ok(WebSource {
                    id: row.get(0)?,
                    url: row.get(1)?,
                    title: row.get(2)?,
                    location_id: row.get(3)?,
                    status: row.get(4)?,
                    extracted_text: row.get(5)?,
                    created_at: row.get(6)?,
                })
            },
        )
        .optional()?)
}

pub fn update_web_source_capture(
    conn: &Connection,
    id: &str,
    title: Option<&str>,
    extracted_text: Option<&str>,
    component_status_json: &str,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE web_sources SET title = ?1, extracted_text = ?2, component_status_json = ?3,
            status = 'captured', updated_at = ?4 WHERE id = ?5",
        params![title, extracted_text, component_status_json, now, id],
    )?;
    Ok(())
}

pub fn insert_web_source_version(conn: &Connection, id: &str, web_source_id: &str, html_hash: Option<&str>, extracted_text: Option<&str>) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO web_source_versions (id, web_source_id, captured_at, html_hash, extracted_text)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, web_source_id, now, html_hash, extracted_text],
    )?;
    Ok(())
}

/// The `html_hash` of the most recently captured version of a web source, if
/// any exist yet. Used to decide whether a new capture actually changed the
/// page before recording it as a new version.
pub fn latest_web_source_version_hash(conn: &Connection, web_source_id: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT html_hash FROM web_source_versions WHERE web_source_id = ?1 ORDER BY captured_at DESC LIMIT 1",
            params![web_source_id],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn search_web_sources_fts(conn: &Connection, query: &str, limit: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM web_sources_fts WHERE web_sources_fts MATCH ?1 ORDER BY rank LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![query, limit], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: i64,
    pub location_id: Option<String>,
    pub event_type: String,
    pub start_date: String,
    pub start_precision: String,
    pub sort_key: i64,
    pub source_refs_json: String,
    pub description: Option<String>,
    pub confidence: f64,
    pub auto_approved: bool,
}

const TIMELINE_COLUMNS: &str = "id, location_id, event_type, start_date, start_precision, sort_key, \
    source_refs_json, description, confidence, auto_approved";

fn row_to_timeline_event(row: &Row) -> rusqlite::Result<TimelineEvent> {
    Ok(TimelineEvent {
        id: row.get(0)?,
        location_id: row.get(1)?,
        event_type: row.get(2)?,
        start_date: row.get(3)?,
        start_precision: row.get(4)?,
        sort_key: row.get(5)?,
        source_refs_json: row.get(6)?,
        description: row.get(7)?,
        confidence: row.get(8)?,
        auto_approved: row.get(9)?,
    })
}

pub fn insert_timeline_event(
    conn: &Connection,
    location_id: Option<&str>,
    event_type: &str,
    start_date: &str,
    start_precision: &str,
    sort_key: i64,
    source_type: &str,
    source_refs_json: &str,
    description: Option<&str>,
    confidence: f64,
    auto_approved: bool,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO location_timeline (
            location_id, event_type, start_date, start_precision, sort_key,
            source_type, source_refs_json, description, confidence, auto_approved, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            location_id, event_type, start_date, start_precision, sort_key, source_type,
            source_refs_json, description, confidence, auto_approved, now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_timeline_for_location(conn: &Connection, location_id: &str) -> Result<Vec<TimelineEvent>> {
    let sql = format!(
        "SELECT {} FROM location_timeline WHERE location_id = ?1 ORDER BY sort_key ASC",
        TIMELINE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![location_id], row_to_timeline_event)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Candidate events to merge against: same location and event type, whose
/// `sort_key` (days since epoch) falls within `window_days` of `sort_key`.
pub fn find_mergeable_timeline_events(
    conn: &Connection,
    location_id: &str,
    event_type: &str,
    sort_key: i64,
    window_days: i64,
) -> Result<Vec<TimelineEvent>> {
    let sql = format!(
        "SELECT {} FROM location_timeline
         WHERE location_id = ?1 AND event_type = ?2 AND ABS(sort_key - ?3) <= ?4
         ORDER BY ABS(sort_key - ?3) ASC",
        TIMELINE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![location_id, event_type, sort_key, window_days],
        row_to_timeline_event,
    )?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[allow(clippy::too_many_arguments)]
pub fn update_timeline_event_merge(
    conn: &Connection,
    id: i64,
    start_date: &str,
    start_precision: &str,
    sort_key: i64,
    source_refs_json: &str,
    description: Option<&str>,
    confidence: f64,
) -> Result<()> {
    conn.execute(
        "UPDATE location_timeline SET start_date = ?1, start_precision = ?2, sort_key = ?3,
            source_refs_json = ?4, description = ?5, confidence = ?6 WHERE id = ?7",
        params![start_date, start_precision, sort_key, source_refs_json, description, confidence, id],
    )?;
    Ok(())
}
