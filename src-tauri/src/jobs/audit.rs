// Append-only audit trail for job lifecycle events. Grounded on the
// teacher's jobs/mod.rs logging calls, lifted into a table so the history
// survives process restarts and is queryable from the CLI.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;

pub fn record(
    conn: &Connection,
    job_id: i64,
    event: &str,
    worker_id: Option<&str>,
    detail: Option<&str>,
) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO job_audit_log (job_id, event, detail_json, worker_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![job_id, event, detail, worker_id, now],
    )?;
    Ok(())
}

pub fn list_for_job(conn: &Connection, job_id: i64) -> Result<Vec<(String, Option<String>, String)>> {
    let mut stmt = conn.prepare(
        "SELECT event, detail_json, created_at FROM job_audit_log WHERE job_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![job_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?, row.get::<_, String>(2)?))
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::jobs::create_job;

    #[test]
    fn record_and_list_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let id = create_job(&conn, "import", 0, "{}", None, 5).unwrap();

        record(&conn, id, "note", Some("worker-1"), Some("{\"k\":1}")).unwrap();
        let events = list_for_job(&conn, id).unwrap();

        // `create_job` itself records a "created" event, so "note" is the second.
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0, "note");
    }
}
