// Scans the catalog for mergeable locations, runs the decision matrix
// against every pair, and executes approved merges transactionally.
// Grounded on spec.md 4.H; transaction pattern matches
// `refmap::import::import_ref_map_file`.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::schema;
use crate::error::Result;

use super::decide::{decide, MergeCandidate, MergeDecision};

#[derive(Debug, Clone, Serialize)]
pub struct MergeSuggestion {
    pub location_a: String,
    pub location_b: String,
    pub decision: MergeDecision,
}

/// Compares every pair of locations and returns those the decision matrix
/// flags as a match, skipping pairs explicitly excluded by a prior
/// human "different place" decision.
pub fn find_merge_candidates(conn: &Connection) -> Result<Vec<MergeSuggestion>> {
    let locations = schema::list_locations(conn)?;
    let mut suggestions = Vec::new();

    for i in 0..locations.len() {
        for j in (i + 1)..locations.len() {
            let a = &locations[i];
            let b = &locations[j];

            if schema::is_merge_excluded(conn, &a.name, &b.name)? {
                continue;
            }

            let candidate_a = MergeCandidate {
                name: a.name.clone(),
                lat: a.gps_lat,
                lng: a.gps_lng,
                state: a.addr_state.clone(),
            };
            let candidate_b = MergeCandidate {
                name: b.name.clone(),
                lat: b.gps_lat,
                lng: b.gps_lng,
                state: b.addr_state.clone(),
            };

            let decision = decide(&candidate_a, &candidate_b);
            if decision.is_match {
                suggestions.push(MergeSuggestion {
                    location_a: a.id.clone(),
                    location_b: b.id.clone(),
                    decision,
                });
            }
        }
    }

    Ok(suggestions)
}

/// Merges `loser_id` into `keeper_id`: reattaches every child record, then
/// deletes the loser row, all inside one transaction, recording the
/// decision in `merge_audit_log`.
pub fn execute_merge(
    conn: &Connection,
    keeper_id: &str,
    loser_id: &str,
    reason: &str,
    decision: &MergeDecision,
    performed_by: Option<&str>,
) -> Result<i64> {
    let score_json = serde_json::to_string(decision)?;
    let tx = conn.unchecked_transaction()?;

    schema::reattach_location_children(&tx, loser_id, keeper_id)?;
    schema::delete_location(&tx, loser_id)?;
    let audit_id = schema::record_merge_audit(&tx, keeper_id, loser_id, reason, &score_json, performed_by)?;
    schema::refresh_location_media_counts(&tx, keeper_id)?;

    tx.commit()?;
    Ok(audit_id)
}

/// Records a human decision that two locations are NOT the same place,
/// so future candidate scans skip the pair permanently.
pub fn reject_merge(conn: &Connection, name_a: &str, name_b: &str, decided_by: Option<&str>) -> Result<()> {
    schema::record_merge_exclusion(conn, name_a, name_b, "different_place", decided_by)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db;
    use tempfile::tempdir;

    #[test]
    fn candidate_scan_flags_close_gps_pair() {
        let dir = tempdir().unwrap();
        let conn = open_db(&dir.path().join("catalog.db")).unwrap();
        schema::insert_location(&conn, "loc_a", "Old Mill Site", Some(42.36), Some(-71.05), None).unwrap();
        schema::insert_location(&conn, "loc_b", "Mill Ruins", Some(42.36001), Some(-71.05001), None).unwrap();

        let suggestions = find_merge_candidates(&conn).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].decision.match_type, "gps");
    }

    #[test]
    fn excluded_pair_is_skipped() {
        let dir = tempdir().unwrap();
        let conn = open_db(&dir.path().join("catalog.db")).unwrap();
        schema::insert_location(&conn, "loc_a", "Old Mill Site", Some(42.36), Some(-71.05), None).unwrap();
        schema::insert_location(&conn, "loc_b", "Mill Ruins", Some(42.36001), Some(-71.05001), None).unwrap();
        schema::record_merge_exclusion(&conn, "Old Mill Site", "Mill Ruins", "different_place", None).unwrap();

        let suggestions = find_merge_candidates(&conn).unwrap();
        assert!(suggestions.is_empty());
    }

    #[test]
    fn execute_merge_reattaches_children_and_deletes_loser() {
        let dir = tempdir().unwrap();
        let conn = open_db(&dir.path().join("catalog.db")).unwrap();
        schema::insert_location(&conn, "keeper", "Keeper Site", Some(42.0), Some(-71.0), None).unwrap();
        schema::insert_location(&conn, "loser", "Loser Site", Some(42.0), Some(-71.0), None).unwrap();

        let media = schema::NewMediaImage {
            hash: "a".repeat(64),
            original_filename: "x.jpg".to_string(),
            canonical_filename: "x.jpg".to_string(),
            archive_path: "locations/loser/media/aa/aaaa.jpg".to_string(),
            original_path: None,
            location_id: Some("loser".to_string()),
            sub_location_id: None,
            importer: None,
            file_size: 100,
            gps_lat: None,
            gps_lng: None,
            captured_at: None,
            image_width: None,
            image_height: None,
            perceptual_hash: None,
        };
        schema::insert_media_image_if_absent(&conn, &media).unwrap();

        let decision = MergeDecision {
            is_match: true,
            match_type: "gps".to_string(),
            distance_m: Some(0.0),
            name_similarity: 0.5,
            token_overlap: 0.0,
            auto_merge: true,
        };
        execute_merge(&conn, "keeper", "loser", "gps proximity", &decision, None).unwrap();

        assert!(schema::get_location(&conn, "loser").unwrap().is_none());
        let keeper = schema::get_location(&conn, "keeper").unwrap().unwrap();
        assert_eq!(keeper.media_image_count, 1);
    }
}
