// Catalog store: connection setup, migration entrypoint, and the
// archive-root-relative path helpers the rest of the core uses to find
// the database file. Grounded on the teacher's db/mod.rs (`open_db`,
// `get_db_path`, `init_library_folders`), generalized from a single
// library root to the archive-root layout the Media Path Planner owns.

pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

use crate::constants::BUSY_TIMEOUT_MS;
use crate::error::{CoreError, Result};
use crate::media_path::MediaPathPlanner;

/// Open (creating if absent) the catalog database at `db_path`, configure
/// it per the Catalog Store contract — WAL journaling, foreign keys
/// enforced, a busy timeout of at least 5s — and run the migration engine.
pub fn open_db(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;

    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.busy_timeout(std::time::Duration::from_millis(BUSY_TIMEOUT_MS as u64))
        .map_err(CoreError::Database)?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// Open the catalog for an archive root, provisioning the archive's
/// directory skeleton first if it does not exist yet.
pub fn open_archive(archive_root: &Path) -> Result<(Connection, MediaPathPlanner)> {
    let planner = MediaPathPlanner::new(archive_root);
    planner.ensure_directories()?;
    let conn = open_db(&planner.db_path())?;
    Ok((conn, planner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_archive_initializes_folders_and_catalog() {
        let dir = tempdir().unwrap();
        let (conn, planner) = open_archive(dir.path()).unwrap();
        assert!(planner.db_path().exists());
        assert!(planner.thumbs_root().is_dir());

        let fk_enabled: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk_enabled, 1);
    }

    #[test]
    fn open_db_is_idempotent_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("catalog.db");
        {
            let _conn = open_db(&db_path).unwrap();
        }
        // Reopening an already-migrated database must not error or
        // duplicate any schema objects.
        let _conn = open_db(&db_path).unwrap();
    }
}
