// Version tracking for web-source captures: one `web_source_versions` row
// per capture that actually changed the page, so re-archiving a stable URL
// doesn't grow the history unboundedly. Grounded on db/schema.rs's existing
// `insert_web_source_version`/`latest_web_source_version_hash`.

use rusqlite::Connection;

use crate::db::schema;
use crate::error::Result;
use crate::hash::derive_entity_id;

/// Record a capture as a new version if its `html_hash` differs from the
/// most recent recorded version (or none exist yet). Returns whether a new
/// version was recorded.
pub fn record_if_changed(
    conn: &Connection,
    web_source_id: &str,
    html_hash: Option<&str>,
    extracted_text: Option<&str>,
) -> Result<bool> {
    let previous = schema::latest_web_source_version_hash(conn, web_source_id)?;
    let changed = previous.as_deref() != html_hash;
    if !changed {
        return Ok(false);
    }

    let now = chrono::Utc::now().to_rfc3339();
    let version_id = derive_entity_id(&now, &format!("{}:{}", web_source_id, html_hash.unwrap_or("")));
    schema::insert_web_source_version(conn, &version_id, web_source_id, html_hash, extracted_text)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        schema::insert_web_source(&conn, "ws1", "https://example.com", None).unwrap();
        conn
    }

    #[test]
    fn first_capture_always_records_a_version() {
        let conn = fresh_conn();
        let changed = record_if_changed(&conn, "ws1", Some("hash-a"), Some("text")).unwrap();
        assert!(changed);
    }

    #[test]
    fn identical_hash_does_not_record_again() {
        let conn = fresh_conn();
        record_if_changed(&conn, "ws1", Some("hash-a"), Some("text")).unwrap();
        let changed = record_if_changed(&conn, "ws1", Some("hash-a"), Some("text")).unwrap();
        assert!(!changed);
    }

    #[test]
    fn changed_hash_records_new_version() {
        let conn = fresh_conn();
        record_if_changed(&conn, "ws1", Some("hash-a"), Some("text")).unwrap();
        let changed = record_if_changed(&conn, "ws1", Some("hash-b"), Some("updated text")).unwrap();
        assert!(changed);
    }
}
