// Dead-letter queue: jobs that exhausted their retry budget land here for
// operator review rather than vanishing into a terminal `failed` status.
// Grounded on the teacher's jobs/mod.rs fail_job, generalized with its own
// table so a dead job keeps its original payload even after the `jobs` row
// is eventually pruned.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::db::schema::Job;
use crate::error::Result;

pub struct DeadLetter {
    pub id: i64,
    pub job_id: i64,
    pub queue: String,
    pub payload_json: String,
    pub error: String,
    pub attempts: i64,
    pub failed_at: String,
    pub acknowledged: bool,
}

pub fn record(conn: &Connection, job: &Job, error: &str, attempts: i64) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO dead_letters (job_id, queue, payload_json, error, attempts, failed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![job.id, job.queue, job.payload_json, error, attempts, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_unacknowledged(conn: &Connection) -> Result<Vec<DeadLetter>> {
    let mut stmt = conn.prepare(
        "SELECT id, job_id, queue, payload_json, error, attempts, failed_at, acknowledged
         FROM dead_letters WHERE acknowledged = 0 ORDER BY failed_at ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DeadLetter {
            id: row.get(0)?,
            job_id: row.get(1)?,
            queue: row.get(2)?,
            payload_json: row.get(3)?,
            error: row.get(4)?,
            attempts: row.get(5)?,
            failed_at: row.get(6)?,
            acknowledged: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Re-enqueue a dead job as a fresh pending job with a reset attempt
/// counter, acknowledging the original dead-letter row.
pub fn requeue(conn: &Connection, dead_letter_id: i64, max_attempts: i64) -> Result<i64> {
    let dl = conn.query_row(
        "SELECT queue, payload_json FROM dead_letters WHERE id = ?1",
        params![dead_letter_id],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
    )?;
    let new_id = super::create_job(conn, &dl.0, 0, &dl.1, None, max_attempts)?;
    conn.execute(
        "UPDATE dead_letters SET acknowledged = 1 WHERE id = ?1",
        params![dead_letter_id],
    )?;
    Ok(new_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::jobs::{claim_job, create_job, fail_job};

    #[test]
    fn requeue_creates_fresh_job_and_acknowledges_original() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let id = create_job(&conn, "import", 0, "{\"path\":\"/x\"}", None, 1).unwrap();
        claim_job(&conn, "import").unwrap();
        fail_job(&conn, id, "boom").unwrap();

        let pending = list_unacknowledged(&conn).unwrap();
        assert_eq!(pending.len(), 1);

        let new_id = requeue(&conn, pending[0].id, 5).unwrap();
        assert_ne!(new_id, id);

        let pending_after = list_unacknowledged(&conn).unwrap();
        assert!(pending_after.is_empty());
    }
}
