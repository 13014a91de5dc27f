// Timeline merger: folds a newly observed dated event for a location into
// the existing location_timeline, merging it into a nearby same-type event
// rather than inserting a duplicate whenever one is close enough in time.
// Grounded on the teacher's dedup-by-fingerprint pattern in
// ingest/matching.rs, adapted from file-hash equality to a date-window +
// precision comparison.

pub mod precision;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::Value;

use crate::constants::{CELLPHONE_MAKES, FILM_SCANNER_MAKES, TIMELINE_DESC_PREFIX_LEN, TIMELINE_MERGE_WINDOW_DAYS};
use crate::db::schema::{self, TimelineEvent};
use crate::error::Result;

use precision::is_higher_or_equal_precision;

const EPOCH_DAYS_OFFSET: i64 = 719_163; // NaiveDate::num_days_from_ce() value for 1970-01-01

/// Convert an ISO date string ("YYYY-MM-DD" or RFC3339) into a day-granularity
/// sort key (days since the Unix epoch). Falls back to 0 for unparseable
/// dates rather than failing the whole ingest.
pub fn sort_key_for_date(date: &str) -> i64 {
    let date_part = date.split('T').next().unwrap_or(date);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(d) => d.num_days_from_ce() as i64 - EPOCH_DAYS_OFFSET,
        Err(_) => 0,
    }
}

/// True if `make` (camera EXIF `Make`) identifies a phone, whose capture
/// dates are trustworthy enough to auto-approve without human review.
pub fn is_cellphone_make(make: &str) -> bool {
    CELLPHONE_MAKES.iter().any(|m| m.eq_ignore_ascii_case(make))
}

/// True if `make` identifies a film scanner: the capture date it reports is
/// the scan date, not the date the photo was taken, so it must never be
/// used to auto-approve or backfill a timeline event.
pub fn is_film_scanner_make(make: &str) -> bool {
    FILM_SCANNER_MAKES.iter().any(|m| m.eq_ignore_ascii_case(make))
}

fn union_source_refs(existing_json: &str, new_ref: &str) -> Result<String> {
    let mut refs: Vec<String> = serde_json::from_str::<Value>(existing_json)
        .ok()
        .and_then(|v| v.as_array().cloned())
        .map(|arr| arr.into_iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    if !refs.iter().any(|r| r == new_ref) {
        refs.push(new_ref.to_string());
    }
    Ok(serde_json::to_string(&refs)?)
}

fn merge_description(existing: Option<&str>, incoming: Option<&str>) -> Option<String> {
    let incoming = incoming?;
    match existing {
        None => Some(incoming.to_string()),
        Some(existing) => {
            let prefix_len = TIMELINE_DESC_PREFIX_LEN.min(incoming.len());
            if existing.contains(&incoming[..prefix_len]) {
                Some(existing.to_string())
            } else {
                Some(format!("{}; {}", existing, incoming))
            }
        }
    }
}

/// Best mergeable candidate for an incoming event: the closest-in-time
/// event already within `TIMELINE_MERGE_WINDOW_DAYS`, if any.
fn find_merge_target(
    conn: &Connection,
    location_id: &str,
    event_type: &str,
    sort_key: i64,
) -> Result<Option<TimelineEvent>> {
    let candidates = schema::find_mergeable_timeline_events(
        conn,
        location_id,
        event_type,
        sort_key,
        TIMELINE_MERGE_WINDOW_DAYS,
    )?;
    Ok(candidates.into_iter().next())
}

/// Record a dated event for a location, merging it into a nearby existing
/// event of the same type rather than inserting a duplicate. `camera_make`
/// drives auto-approval: a cellphone make auto-approves, a film-scanner make
/// never does (its reported date is a scan date, not a capture date).
#[allow(clippy::too_many_arguments)]
pub fn ingest_event(
    conn: &Connection,
    location_id: &str,
    event_type: &str,
    date: &str,
    precision: &str,
    source_type: &str,
    source_ref: &str,
    description: Option<&str>,
    confidence: f64,
    camera_make: Option<&str>,
) -> Result<i64> {
    let sort_key = sort_key_for_date(date);
    let auto_approved = camera_make.map(is_cellphone_make).unwrap_or(false)
        && !camera_make.map(is_film_scanner_make).unwrap_or(false);

    match find_merge_target(conn, location_id, event_type, sort_key)? {
        None => schema::insert_timeline_event(
            conn,
            Some(location_id),
            event_type,
            date,
            precision,
            sort_key,
            source_type,
            &serde_json::to_string(&[source_ref])?,
            description,
            confidence,
            auto_approved,
        ),
        Some(existing) => {
            let (kept_date, kept_precision, kept_sort_key) =
                if is_higher_or_equal_precision(precision, &existing.start_precision) {
                    (date, precision, sort_key)
                } else {
                    (
                        existing.start_date.as_str(),
                        existing.start_precision.as_str(),
                        existing.sort_key,
                    )
                };
            let merged_refs = union_source_refs(&existing.source_refs_json, source_ref)?;
            let merged_description = merge_description(existing.description.as_deref(), description);
            let merged_confidence = confidence.max(existing.confidence);

            schema::update_timeline_event_merge(
                conn,
                existing.id,
                kept_date,
                kept_precision,
                kept_sort_key,
                &merged_refs,
                merged_description.as_deref(),
                merged_confidence,
            )?;
            Ok(existing.id)
        }
    }
}

pub fn list_for_location(conn: &Connection, location_id: &str) -> Result<Vec<TimelineEvent>> {
    schema::list_timeline_for_location(conn, location_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO locations (id, name, created_at, updated_at) VALUES ('loc1', 'Test', datetime('now'), datetime('now'))",
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn first_event_inserts_new_row() {
        let conn = fresh_conn();
        let id = ingest_event(
            &conn, "loc1", "media_captured", "2019-05-01", "exact", "media_capture", "hash1", None, 0.8, None,
        )
        .unwrap();
        let events = list_for_location(&conn, "loc1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, id);
    }

    #[test]
    fn nearby_event_merges_instead_of_duplicating() {
        let conn = fresh_conn();
        ingest_event(
            &conn, "loc1", "media_captured", "2019-05-01", "year", "media_capture", "hash1", Some("first visit"), 0.5, None,
        )
        .unwrap();
        ingest_event(
            &conn, "loc1", "media_captured", "2019-05-03", "exact", "media_capture", "hash2", Some("second batch"), 0.9, None,
        )
        .unwrap();

        let events = list_for_location(&conn, "loc1").unwrap();
        assert_eq!(events.len(), 1);
        // exact beats year
        assert_eq!(events[0].start_date, "2019-05-03");
        assert_eq!(events[0].start_precision, "exact");
        assert_eq!(events[0].confidence, 0.9);
        let refs: Vec<String> = serde_json::from_str(&events[0].source_refs_json).unwrap();
        assert_eq!(refs, vec!["hash1".to_string(), "hash2".to_string()]);
    }

    #[test]
    fn far_apart_events_stay_separate() {
        let conn = fresh_conn();
        ingest_event(
            &conn, "loc1", "media_captured", "2015-01-01", "exact", "media_capture", "hash1", None, 0.8, None,
        )
        .unwrap();
        ingest_event(
            &conn, "loc1", "media_captured", "2020-01-01", "exact", "media_capture", "hash2", None, 0.8, None,
        )
        .unwrap();
        assert_eq!(list_for_location(&conn, "loc1").unwrap().len(), 2);
    }

    #[test]
    fn cellphone_make_auto_approves() {
        let conn = fresh_conn();
        ingest_event(
            &conn, "loc1", "media_captured", "2021-01-01", "exact", "media_capture", "hash1", None, 0.7, Some("Apple"),
        )
        .unwrap();
        let events = list_for_location(&conn, "loc1").unwrap();
        assert!(events[0].auto_approved);
    }

    #[test]
    fn film_scanner_make_never_auto_approves() {
        let conn = fresh_conn();
        ingest_event(
            &conn, "loc1", "media_captured", "2021-01-01", "exact", "media_capture", "hash1", None, 0.7, Some("Noritsu"),
        )
        .unwrap();
        let events = list_for_location(&conn, "loc1").unwrap();
        assert!(!events[0].auto_approved);
    }

    #[test]
    fn duplicate_description_prefix_is_not_repeated() {
        let conn = fresh_conn();
        ingest_event(
            &conn, "loc1", "media_captured", "2021-06-01", "month", "media_capture", "hash1",
            Some("Abandoned farmhouse with collapsed roof and scattered furniture"), 0.5, None,
        )
        .unwrap();
        ingest_event(
            &conn, "loc1", "media_captured", "2021-06-02", "exact", "media_capture", "hash2",
            Some("Abandoned farmhouse with collapsed roof and scattered furniture, revisited"), 0.6, None,
        )
        .unwrap();
        let events = list_for_location(&conn, "loc1").unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].description.as_ref().unwrap().contains("; Abandoned farmhouse"));
    }
}
