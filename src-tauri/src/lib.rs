// Locarch - Tauri Library Entry Point
//
// Exposes the catalog core (import pipeline, job queue, reference-map
// engine, merge engine, timeline merger, BagIt validator, web-source
// archiver) as `#[tauri::command]`s plus the `media://` custom protocol
// registered in `run()`. One archive (one catalog database, one directory
// tree) is open at a time per app instance, held in `ArchiveState`.

pub mod bagit;
pub mod constants;
pub mod db;
pub mod error;
pub mod geo;
pub mod hash;
pub mod import;
pub mod jobs;
pub mod media_path;
pub mod media_protocol;
pub mod merge;
pub mod metadata;
pub mod preview;
pub mod refmap;
pub mod timeline;
pub mod tools;
pub mod websource;

use std::path::PathBuf;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::Serialize;
use tauri::{AppHandle, Manager, State};

use constants::JOB_MAX_ATTEMPTS;
use db::schema::{self, Job, Location, RefMapPoint, SubLocation, TimelineEvent, WebSource};
use media_path::MediaPathPlanner;
use merge::MergeSuggestion;

/// The archive currently open in this app instance, if any. `media_protocol`
/// reaches `planner` directly (see `media_protocol::handle_request`); every
/// command here reaches both fields through the same lock pair so a
/// `close_archive` mid-command can never be observed as "half closed".
pub struct ArchiveState {
    pub conn: Mutex<Option<Connection>>,
    pub planner: Mutex<Option<MediaPathPlanner>>,
    pub workers: jobs::worker::WorkerState,
}

impl ArchiveState {
    fn new() -> Self {
        Self {
            conn: Mutex::new(None),
            planner: Mutex::new(None),
            workers: jobs::worker::WorkerState::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveInfo {
    pub archive_root: String,
    pub location_count: usize,
}

fn open_archive_state(state: &ArchiveState, archive_root: &std::path::Path) -> Result<ArchiveInfo, String> {
    let (conn, planner) = db::open_archive(archive_root).map_err(|e| e.to_string())?;
    let locations = schema::list_locations(&conn).map_err(|e| e.to_string())?;
    let info = ArchiveInfo {
        archive_root: archive_root.display().to_string(),
        location_count: locations.len(),
    };

    *state.conn.lock().map_err(|e| e.to_string())? = Some(conn);
    *state.planner.lock().map_err(|e| e.to_string())? = Some(planner);
    state.workers.set_archive(archive_root.to_path_buf());

    Ok(info)
}

#[tauri::command]
fn open_archive(state: State<ArchiveState>, path: String) -> Result<ArchiveInfo, String> {
    open_archive_state(&state, &PathBuf::from(path))
}

#[tauri::command]
fn close_archive(state: State<ArchiveState>) -> Result<(), String> {
    *state.conn.lock().map_err(|e| e.to_string())? = None;
    *state.planner.lock().map_err(|e| e.to_string())? = None;
    state.workers.clear_archive();
    Ok(())
}

/// Runs `f` with the open catalog connection, translating both the "no
/// archive open" and inner-error cases to the `Result<T, String>` shape
/// every Tauri command returns.
fn with_conn<T>(state: &State<ArchiveState>, f: impl FnOnce(&Connection) -> error::Result<T>) -> Result<T, String> {
    let guard = state.conn.lock().map_err(|e| e.to_string())?;
    let conn = guard.as_ref().ok_or("no archive open")?;
    f(conn).map_err(|e| e.to_string())
}

fn with_conn_and_planner<T>(
    state: &State<ArchiveState>,
    f: impl FnOnce(&Connection, &MediaPathPlanner) -> error::Result<T>,
) -> Result<T, String> {
    let conn_guard = state.conn.lock().map_err(|e| e.to_string())?;
    let conn = conn_guard.as_ref().ok_or("no archive open")?;
    let planner_guard = state.planner.lock().map_err(|e| e.to_string())?;
    let planner = planner_guard.as_ref().ok_or("no archive open")?;
    f(conn, planner).map_err(|e| e.to_string())
}

// --- Locations ----------------------------------------------------------

#[tauri::command]
fn create_location(
    state: State<ArchiveState>,
    name: String,
    gps_lat: Option<f64>,
    gps_lng: Option<f64>,
    created_by: Option<String>,
) -> Result<Location, String> {
    with_conn_and_planner(&state, |conn, planner| {
        let now = chrono::Utc::now().to_rfc3339();
        let id = hash::derive_entity_id(&now, &name);
        schema::insert_location(conn, &id, &name, gps_lat, gps_lng, created_by.as_deref())?;
        planner.ensure_location_directories(&id)?;

        if let (Some(lat), Some(lng)) = (gps_lat, gps_lng) {
            let payload = serde_json::to_string(&serde_json::json!({
                "location_id": id, "lat": lat, "lng": lng,
            }))?;
            jobs::create_job(conn, "ref-map-point-match", 0, &payload, None, JOB_MAX_ATTEMPTS)?;
        }

        schema::get_location(conn, &id)?.ok_or_else(|| error::CoreError::LocationNotFound(id))
    })
}

#[tauri::command]
fn list_locations(state: State<ArchiveState>) -> Result<Vec<Location>, String> {
    with_conn(&state, |conn| schema::list_locations(conn))
}

#[tauri::command]
fn get_location(state: State<ArchiveState>, id: String) -> Result<Location, String> {
    with_conn(&state, |conn| {
        schema::get_location(conn, &id)?.ok_or(error::CoreError::LocationNotFound(id))
    })
}

#[tauri::command]
fn delete_location(state: State<ArchiveState>, id: String) -> Result<(), String> {
    with_conn(&state, |conn| schema::delete_location(conn, &id))
}

#[tauri::command]
fn create_sub_location(
    state: State<ArchiveState>,
    parent_location_id: String,
    name: String,
    is_primary: bool,
) -> Result<SubLocation, String> {
    with_conn(&state, |conn| {
        let now = chrono::Utc::now().to_rfc3339();
        let id = hash::derive_entity_id(&now, &name);
        schema::insert_sub_location(conn, &id, &parent_location_id, &name, is_primary)?;
        schema::get_sub_location(conn, &id)?.ok_or(error::CoreError::LocationNotFound(id))
    })
}

// --- Import pipeline ------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportHandle {
    pub session_id: i64,
    pub job_id: i64,
}

#[tauri::command]
fn start_import(
    state: State<ArchiveState>,
    location_id: String,
    source_paths: Vec<String>,
) -> Result<ImportHandle, String> {
    with_conn_and_planner(&state, |conn, planner| {
        planner.ensure_location_directories(&location_id)?;
        let source_paths_json = serde_json::to_string(&source_paths)?;
        let session_id = schema::create_import_session(conn, &location_id, &source_paths_json)?;
        let payload = serde_json::to_string(&serde_json::json!({ "import_session_id": session_id }))?;
        let job_id = jobs::create_job(conn, "import", 10, &payload, None, JOB_MAX_ATTEMPTS)?;
        Ok(ImportHandle { session_id, job_id })
    })
}

#[tauri::command]
fn get_import_session(state: State<ArchiveState>, id: i64) -> Result<schema::ImportSession, String> {
    with_conn(&state, |conn| {
        schema::get_import_session(conn, id)?.ok_or(error::CoreError::SessionNotFound(id))
    })
}

#[tauri::command]
fn cancel_import(job_id: i64) -> Result<bool, String> {
    Ok(jobs::request_cancel(job_id))
}

// --- Jobs ------------------------------------------------------------------

#[tauri::command]
fn list_jobs(
    state: State<ArchiveState>,
    queue: Option<String>,
    status: Option<String>,
    limit: i64,
) -> Result<Vec<Job>, String> {
    with_conn(&state, |conn| schema::list_jobs(conn, queue.as_deref(), status.as_deref(), limit))
}

#[tauri::command]
fn pending_job_counts(state: State<ArchiveState>) -> Result<Vec<(String, i64)>, String> {
    with_conn(&state, jobs::count_pending_by_queue)
}

/// Dev/CLI convenience: drain one queue synchronously on the calling
/// thread instead of waiting for the background worker pool's poll
/// interval. The UI never needs this — the worker pool (spawned in
/// `run()`) already drains every queue continuously.
#[tauri::command]
fn run_pending_jobs(state: State<ArchiveState>, app: AppHandle, queue: String) -> Result<usize, String> {
    with_conn_and_planner(&state, |conn, planner| {
        let mut count = 0;
        while jobs::runner::run_next_job(conn, planner, &queue, Some(&app))? {
            count += 1;
        }
        Ok(count)
    })
}

// --- Reference maps ----------------------------------------------------

#[tauri::command]
fn import_reference_map(
    state: State<ArchiveState>,
    name: String,
    file_path: String,
    importer: Option<String>,
) -> Result<i64, String> {
    with_conn(&state, |conn| {
        refmap::import_ref_map_file(conn, &name, std::path::Path::new(&file_path), importer.as_deref())
    })
}

#[tauri::command]
fn list_reference_map_points(state: State<ArchiveState>, ref_map_id: i64) -> Result<Vec<RefMapPoint>, String> {
    with_conn(&state, |conn| schema::list_ref_map_points(conn, ref_map_id))
}

// --- Merge engine --------------------------------------------------------

#[tauri::command]
fn find_merge_candidates(state: State<ArchiveState>) -> Result<Vec<MergeSuggestion>, String> {
    with_conn(&state, merge::find_merge_candidates)
}

#[tauri::command]
fn execute_merge(
    state: State<ArchiveState>,
    keeper_id: String,
    loser_id: String,
    reason: String,
) -> Result<i64, String> {
    with_conn(&state, |conn| {
        let candidates = merge::find_merge_candidates(conn)?;
        let decision = candidates
            .into_iter()
            .find(|s| {
                (s.location_a == keeper_id && s.location_b == loser_id)
                    || (s.location_a == loser_id && s.location_b == keeper_id)
            })
            .map(|s| s.decision)
            .unwrap_or(merge::MergeDecision {
                is_match: true,
                match_type: "manual".to_string(),
                distance_m: None,
                name_similarity: 0.0,
                token_overlap: 0.0,
                auto_merge: false,
            });
        merge::execute_merge(conn, &keeper_id, &loser_id, &reason, &decision, None)
    })
}

#[tauri::command]
fn reject_merge(state: State<ArchiveState>, name_a: String, name_b: String) -> Result<(), String> {
    with_conn(&state, |conn| merge::reject_merge(conn, &name_a, &name_b, None))
}

// --- Timeline --------------------------------------------------------------

#[tauri::command]
fn list_timeline(state: State<ArchiveState>, location_id: String) -> Result<Vec<TimelineEvent>, String> {
    with_conn(&state, |conn| timeline::list_for_location(conn, &location_id))
}

// --- BagIt validator -----------------------------------------------------

#[tauri::command]
fn write_bag(state: State<ArchiveState>, location_id: String) -> Result<(), String> {
    with_conn_and_planner(&state, |conn, planner| bagit::write_bag(conn, planner, &location_id))
}

#[tauri::command]
fn validate_bag(state: State<ArchiveState>, location_id: String) -> Result<bagit::BagValidation, String> {
    with_conn_and_planner(&state, |conn, planner| bagit::validate_bag(conn, planner, &location_id))
}

// --- Web-source archiver -------------------------------------------------

#[tauri::command]
fn archive_web_source(
    state: State<ArchiveState>,
    location_id: Option<String>,
    url: String,
) -> Result<String, String> {
    with_conn_and_planner(&state, |conn, planner| {
        websource::archive_url(conn, planner, location_id.as_deref(), &url)
    })
}

#[tauri::command]
fn search_web_sources(state: State<ArchiveState>, query: String, limit: i64) -> Result<Vec<String>, String> {
    with_conn(&state, |conn| websource::search(conn, &query, limit))
}

#[tauri::command]
fn get_web_source(state: State<ArchiveState>, id: String) -> Result<WebSource, String> {
    with_conn(&state, |conn| {
        schema::get_web_source(conn, &id)?.ok_or_else(|| error::CoreError::Other(format!("web source not found: {}", id)))
    })
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let archive_state = ArchiveState::new();
    let workers_for_setup = archive_state.workers.clone();

    let builder = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_store::Builder::default().build())
        .plugin(tauri_plugin_log::Builder::default().build())
        .manage(archive_state)
        .setup(move |app| {
            jobs::worker::spawn_worker_pool(app.handle().clone(), workers_for_setup.clone());
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            open_archive,
            close_archive,
            create_location,
            list_locations,
            get_location,
            delete_location,
            create_sub_location,
            start_import,
            get_import_session,
            cancel_import,
            list_jobs,
            pending_job_counts,
            run_pending_jobs,
            import_reference_map,
            list_reference_map_points,
            find_merge_candidates,
            execute_merge,
            reject_merge,
            list_timeline,
            write_bag,
            validate_bag,
            archive_web_source,
            search_web_sources,
            get_web_source,
        ]);

    media_protocol::register(builder)
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
