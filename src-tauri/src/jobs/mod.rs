// Durable job queue: atomic claim, retry backoff, dead-letter queue, audit
// log, metrics/traces. Grounded on the teacher's jobs/mod.rs (cancel-flag
// registry, atomic claim-by-UPDATE-RETURNING, lease/backoff arithmetic),
// generalized with a queue name (the teacher had one global queue), a
// `depends_on` edge, and a dead-letter table instead of a terminal
// `status = 'failed'` row.

pub mod audit;
pub mod dead_letter;
pub mod progress;
pub mod runner;
pub mod worker;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::constants::{JOB_BASE_BACKOFF_SECONDS, JOB_LOCK_TIMEOUT_SECONDS, JOB_MAX_BACKOFF_SECONDS};
use crate::db::schema::{self, Job};
use crate::error::{CoreError, Result};

/// Registry of cooperative-cancel flags keyed by job id. Handlers poll
/// `is_cancelled` between units of work; nothing forcibly interrupts a
/// running thread.
static CANCEL_FLAGS: std::sync::LazyLock<Mutex<HashMap<i64, Arc<AtomicBool>>>> =
    std::sync::LazyLock::new(|| Mutex::new(HashMap::new()));

pub fn register_cancel_flag(job_id: i64) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    CANCEL_FLAGS.lock().unwrap().insert(job_id, Arc::clone(&flag));
    flag
}

pub fn request_cancel(job_id: i64) -> bool {
    let flags = CANCEL_FLAGS.lock().unwrap();
    match flags.get(&job_id) {
        Some(flag) => {
            flag.store(true, Ordering::Relaxed);
            true
        }
        None => false,
    }
}

pub fn remove_cancel_flag(job_id: i64) {
    CANCEL_FLAGS.lock().unwrap().remove(&job_id);
}

pub fn is_cancelled(flag: &AtomicBool) -> bool {
    flag.load(Ordering::Relaxed)
}

pub fn get_worker_id() -> String {
    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}:{}", hostname, std::process::id())
}

/// Enqueue a job. `depends_on`, when set, must name an existing job; the
/// new job will not be eligible for claim until that job reaches
/// `completed`.
pub fn create_job(
    conn: &Connection,
    queue: &str,
    priority: i64,
    payload_json: &str,
    depends_on: Option<i64>,
    max_attempts: i64,
) -> Result<i64> {
    let id = schema::create_job(conn, queue, priority, payload_json, depends_on, max_attempts)?;
    audit::record(conn, id, "created", None, None)?;
    Ok(id)
}

/// Atomically claim one pending, runnable job from `queue`: not blocked on
/// an incomplete dependency, not waiting out a retry backoff, ordered by
/// priority then FIFO. The `UPDATE ... WHERE id = (SELECT ...) RETURNING`
/// form makes the select-then-lock step a single statement, so exactly one
/// worker wins a race against concurrent claimants on the same row.
pub fn claim_job(conn: &Connection, queue: &str) -> Result<Option<Job>> {
    let worker_id = get_worker_id();
    let now = Utc::now().to_rfc3339();

    let result = conn.query_row(
        "UPDATE jobs
         SET status = 'processing', locked_by = ?1, locked_at = ?2, started_at = ?2
         WHERE id = (
            SELECT id FROM jobs
            WHERE queue = ?3
              AND status = 'pending'
              AND (retry_after IS NULL OR retry_after <= ?2)
              AND (
                depends_on IS NULL
                OR EXISTS (SELECT 1 FROM jobs dep WHERE dep.id = jobs.depends_on AND dep.status = 'completed')
              )
            ORDER BY priority DESC, created_at ASC
            LIMIT 1
         )
         RETURNING id, queue, priority, status, payload_json, depends_on, attempts,
                   max_attempts, result_json, last_error, locked_by, created_at",
        params![worker_id, now, queue],
        |row| {
            Ok(Job {
                id: row.get(0)?,
                queue: row.get(1)?,
                priority: row.get(2)?,
                status: row.get(3)?,
                payload_json: row.get(4)?,
                depends_on: row.get(5)?,
                attempts: row.get(6)?,
                max_attempts: row.get(7)?,
                result_json: row.get(8)?,
                last_error: row.get(9)?,
                locked_by: row.get(10)?,
                created_at: row.get(11)?,
            })
        },
    );

    match result {
        Ok(job) => {
            audit::record(conn, job.id, "claimed", Some(&worker_id), None)?;
            Ok(Some(job))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(CoreError::Database(e)),
    }
}

pub fn complete_job(conn: &Connection, job_id: i64, result_json: &str) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let rows = conn.execute(
        "UPDATE jobs SET status = 'completed', result_json = ?1, completed_at = ?2
         WHERE id = ?3 AND status = 'processing'",
        params![result_json, now, job_id],
    )?;
    if rows > 0 {
        audit::record(conn, job_id, "completed", None, None)?;
    }
    Ok(rows > 0)
}

/// Fail a job: retry with exponential backoff while attempts remain,
/// otherwise move it to the dead-letter table and mark the row `dead`.
pub fn fail_job(conn: &Connection, job_id: i64, error: &str) -> Result<bool> {
    let job = schema::get_job(conn, job_id)?.ok_or(CoreError::JobNotFound(job_id))?;
    let new_attempts = job.attempts + 1;
    let now = Utc::now();

    if new_attempts >= job.max_attempts {
        let rows = conn.execute(
            "UPDATE jobs SET status = 'dead', last_error = ?1, attempts = ?2, completed_at = ?3
             WHERE id = ?4 AND status = 'processing'",
            params![error, new_attempts, now.to_rfc3339(), job_id],
        )?;
        if rows > 0 {
            dead_letter::record(conn, &job, error, new_attempts)?;
            audit::record(conn, job_id, "dead_lettered", None, Some(error))?;
        }
        Ok(rows > 0)
    } else {
        let backoff_seconds =
            (JOB_BASE_BACKOFF_SECONDS * 2i64.pow((new_attempts - 1).max(0) as u32)).min(JOB_MAX_BACKOFF_SECONDS);
        let retry_after = now + chrono::Duration::seconds(backoff_seconds);
        let rows = conn.execute(
            "UPDATE jobs SET status = 'pending', last_error = ?1, attempts = ?2,
                locked_by = NULL, locked_at = NULL, retry_after = ?3
             WHERE id = ?4 AND status = 'processing'",
            params![error, new_attempts, retry_after.to_rfc3339(), job_id],
        )?;
        if rows > 0 {
            audit::record(conn, job_id, "retry_scheduled", None, Some(error))?;
        }
        Ok(rows > 0)
    }
}

/// Stale-lock janitor: a job stuck in `processing` past the lock timeout
/// (its worker crashed without reporting completion or failure) is
/// returned to `pending` so another worker can claim it, with its attempt
/// counter incremented so it still counts toward `max_attempts`.
pub fn reclaim_stale_jobs(conn: &Connection) -> Result<usize> {
    let threshold = Utc::now() - chrono::Duration::seconds(JOB_LOCK_TIMEOUT_SECONDS);
    let rows = conn.execute(
        "UPDATE jobs SET status = 'pending', locked_by = NULL, locked_at = NULL,
            attempts = attempts + 1
         WHERE status = 'processing' AND locked_at < ?1",
        params![threshold.to_rfc3339()],
    )?;
    Ok(rows)
}

/// Dead-letter every `pending` job whose `depends_on` antecedent has
/// permanently failed (`failed` or `dead`). Such a job can never satisfy
/// `claim_job`'s dependency-completed condition and would otherwise sit in
/// `pending` forever; spec.md 8 requires it transition to `dead` with
/// reason `dependency_failed` instead.
pub fn dead_letter_dependency_failed_jobs(conn: &Connection) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare(
        "SELECT id FROM jobs
         WHERE status = 'pending'
           AND depends_on IS NOT NULL
           AND EXISTS (
                SELECT 1 FROM jobs dep
                WHERE dep.id = jobs.depends_on AND dep.status IN ('failed', 'dead')
           )",
    )?;
    let ids: Vec<i64> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    drop(stmt);

    let mut dead_lettered = 0;
    for job_id in ids {
        let job = match schema::get_job(conn, job_id)? {
            Some(j) => j,
            None => continue,
        };
        let rows = conn.execute(
            "UPDATE jobs SET status = 'dead', last_error = 'dependency_failed', completed_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![now, job_id],
        )?;
        if rows > 0 {
            dead_letter::record(conn, &job, "dependency_failed", job.attempts)?;
            audit::record(conn, job_id, "dead_lettered", None, Some("dependency_failed"))?;
            dead_lettered += 1;
        }
    }
    Ok(dead_lettered)
}

pub fn count_pending_by_queue(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT queue, COUNT(*) FROM jobs WHERE status = 'pending' GROUP BY queue ORDER BY queue",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn acknowledge_dead_letter(conn: &Connection, dead_letter_id: i64) -> Result<bool> {
    let rows = conn.execute(
        "UPDATE dead_letters SET acknowledged = 1 WHERE id = ?1",
        params![dead_letter_id],
    )?;
    Ok(rows > 0)
}

pub fn job_exists(conn: &Connection, job_id: i64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM jobs WHERE id = ?1", params![job_id], |_| Ok(()))
        .optional()?
        .is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn claim_job_excludes_jobs_with_incomplete_dependency() {
        let conn = fresh_conn();
        let parent = create_job(&conn, "import", 0, "{}", None, 5).unwrap();
        let _child = create_job(&conn, "import", 0, "{}", Some(parent), 5).unwrap();

        // Only the parent is claimable; the child is blocked.
        let claimed = claim_job(&conn, "import").unwrap().unwrap();
        assert_eq!(claimed.id, parent);
        assert!(claim_job(&conn, "import").unwrap().is_none());
    }

    #[test]
    fn claim_job_unblocks_dependent_once_parent_completes() {
        let conn = fresh_conn();
        let parent = create_job(&conn, "import", 0, "{}", None, 5).unwrap();
        let _child = create_job(&conn, "import", 0, "{}", Some(parent), 5).unwrap();

        let claimed = claim_job(&conn, "import").unwrap().unwrap();
        complete_job(&conn, claimed.id, "{}").unwrap();

        let next = claim_job(&conn, "import").unwrap().unwrap();
        assert_eq!(next.depends_on, Some(parent));
    }

    #[test]
    fn fail_job_schedules_retry_then_dead_letters_on_exhaustion() {
        let conn = fresh_conn();
        let id = create_job(&conn, "import", 0, "{}", None, 2).unwrap();

        claim_job(&conn, "import").unwrap();
        fail_job(&conn, id, "boom").unwrap();
        let job = schema::get_job(&conn, id).unwrap().unwrap();
        assert_eq!(job.status, "pending");
        assert_eq!(job.attempts, 1);

        // Backoff hasn't elapsed yet, so it's not claimable immediately.
        assert!(claim_job(&conn, "import").unwrap().is_none());

        conn.execute("UPDATE jobs SET retry_after = NULL WHERE id = ?1", params![id])
            .unwrap();
        claim_job(&conn, "import").unwrap();
        fail_job(&conn, id, "boom again").unwrap();

        let job = schema::get_job(&conn, id).unwrap().unwrap();
        assert_eq!(job.status, "dead");

        let dead_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM dead_letters WHERE job_id = ?1", params![id], |r| r.get(0))
            .unwrap();
        assert_eq!(dead_count, 1);
    }

    #[test]
    fn reclaim_stale_jobs_returns_abandoned_locks_to_pending() {
        let conn = fresh_conn();
        let id = create_job(&conn, "import", 0, "{}", None, 5).unwrap();
        claim_job(&conn, "import").unwrap();

        conn.execute(
            "UPDATE jobs SET locked_at = '2000-01-01T00:00:00Z' WHERE id = ?1",
            params![id],
        )
        .unwrap();

        let reclaimed = reclaim_stale_jobs(&conn).unwrap();
        assert_eq!(reclaimed, 1);
        let job = schema::get_job(&conn, id).unwrap().unwrap();
        assert_eq!(job.status, "pending");
        assert_eq!(job.attempts, 1);
    }

    #[test]
    fn dead_letter_dependency_failed_jobs_moves_blocked_dependents_to_dead() {
        let conn = fresh_conn();
        let parent = create_job(&conn, "import", 0, "{}", None, 1).unwrap();
        let child = create_job(&conn, "import", 0, "{}", Some(parent), 5).unwrap();

        claim_job(&conn, "import").unwrap();
        fail_job(&conn, parent, "boom").unwrap();
        let parent_job = schema::get_job(&conn, parent).unwrap().unwrap();
        assert_eq!(parent_job.status, "dead");

        // The child is still pending and unclaimable; it must never run.
        assert!(claim_job(&conn, "import").unwrap().is_none());

        let moved = dead_letter_dependency_failed_jobs(&conn).unwrap();
        assert_eq!(moved, 1);

        let child_job = schema::get_job(&conn, child).unwrap().unwrap();
        assert_eq!(child_job.status, "dead");
        assert_eq!(child_job.last_error.as_deref(), Some("dependency_failed"));

        let dead_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM dead_letters WHERE job_id = ?1 AND error = 'dependency_failed'",
                params![child],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(dead_count, 1);
    }
}
