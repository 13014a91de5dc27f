// Background job worker pool -- one thread per queue, each polling for
// pending jobs and draining them before sleeping again.
//
// Grounded on the teacher's jobs/worker.rs (WorkerState holding the open
// library path behind an Arc<Mutex<Option<PathBuf>>>, a spawn_worker /
// worker_loop / drain_jobs shape, panic-catching around each job run).
// Generalized from a single worker thread to one per queue in JOB_QUEUES,
// each sized by its DEFAULT_*_WORKERS constant, and from "library root" to
// "archive root" (the Media Path Planner owns per-archive paths).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tauri::AppHandle;

use crate::constants::{
    DEFAULT_BAGIT_WORKERS, DEFAULT_COPY_WORKERS, DEFAULT_EXTRACTION_WORKERS, DEFAULT_HASH_WORKERS,
    DEFAULT_PHASH_WORKERS, DEFAULT_PROXY_WORKERS, DEFAULT_REFMAP_WORKERS, DEFAULT_THUMB_WORKERS,
};
use crate::db::open_db;
use crate::media_path::MediaPathPlanner;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shared state that tells every worker thread which archive is open.
#[derive(Clone)]
pub struct WorkerState {
    archive_root: Arc<Mutex<Option<PathBuf>>>,
}

impl WorkerState {
    pub fn new() -> Self {
        Self {
            archive_root: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the archive path (called when an archive is opened).
    pub fn set_archive(&self, path: PathBuf) {
        *self.archive_root.lock().unwrap() = Some(path);
    }

    /// Clear the archive path (called when an archive is closed).
    pub fn clear_archive(&self) {
        *self.archive_root.lock().unwrap() = None;
    }

    fn current(&self) -> Option<PathBuf> {
        self.archive_root.lock().unwrap().clone()
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_count_for_queue(queue: &str) -> usize {
    match queue {
        "import" => DEFAULT_COPY_WORKERS,
        "exiftool" => DEFAULT_HASH_WORKERS,
        "thumbnail" => DEFAULT_THUMB_WORKERS,
        "proxy" => DEFAULT_PROXY_WORKERS,
        "perceptual-hash" => DEFAULT_PHASH_WORKERS,
        "ref-map-point-match" => DEFAULT_REFMAP_WORKERS,
        "bagit-validate" => DEFAULT_BAGIT_WORKERS,
        "extraction" => DEFAULT_EXTRACTION_WORKERS,
        _ => 1,
    }
}

/// Spawn the full worker pool: one or more threads per queue in
/// `JOB_QUEUES`, sized by that queue's default worker count. Call once
/// during app setup.
pub fn spawn_worker_pool(app: AppHandle, state: WorkerState) {
    for queue in super::runner::known_queues() {
        for worker_index in 0..worker_count_for_queue(queue) {
            let app = app.clone();
            let state = state.clone();
            let queue = queue.to_string();
            std::thread::Builder::new()
                .name(format!("job-worker-{}-{}", queue, worker_index))
                .spawn(move || worker_loop(app, state, queue))
                .expect("failed to spawn job worker thread");
        }
    }
}

fn worker_loop(app: AppHandle, state: WorkerState, queue: String) {
    loop {
        std::thread::sleep(POLL_INTERVAL);

        let archive_root = match state.current() {
            Some(p) => p,
            None => continue,
        };

        let planner = MediaPathPlanner::new(&archive_root);
        let conn = match open_db(&planner.db_path()) {
            Ok(c) => c,
            Err(e) => {
                log::error!("job worker [{}]: failed to open catalog: {}", queue, e);
                continue;
            }
        };

        let ran_one = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            super::runner::run_next_job(&conn, &planner, &queue, Some(&app))
        }));

        match ran_one {
            Ok(Ok(true)) => drain_jobs(&app, &state, &queue, &archive_root),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => log::error!("job worker [{}]: {}", queue, e),
            Err(_) => log::error!("job worker [{}]: job panicked (recovered)", queue),
        }
    }
}

/// After processing one job successfully, keep draining the same queue
/// until it is empty or the open archive changes, avoiding a poll-interval
/// gap between consecutive jobs.
fn drain_jobs(app: &AppHandle, state: &WorkerState, queue: &str, archive_root: &PathBuf) {
    loop {
        if state.current().as_ref() != Some(archive_root) {
            return;
        }

        let planner = MediaPathPlanner::new(archive_root);
        let conn = match open_db(&planner.db_path()) {
            Ok(c) => c,
            Err(_) => return,
        };

        let ran_one = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            super::runner::run_next_job(&conn, &planner, queue, Some(app))
        }));

        match ran_one {
            Ok(Ok(true)) => continue,
            Ok(Ok(false)) => return,
            Ok(Err(e)) => {
                log::error!("job worker [{}]: {}", queue, e);
                return;
            }
            Err(_) => {
                log::error!("job worker [{}]: job panicked (recovered)", queue);
                return;
            }
        }
    }
}
