// Links a catalog location's GPS value against unlinked reference-map
// points within radius. A link sets `linked_locid`/`linked_at` on the
// point rather than deleting it; linked points drop out of the Atlas
// layer but remain in the source map (spec.md 4.G).

use rusqlite::Connection;
use serde::Deserialize;

use crate::constants::REFMAP_LINK_RADIUS_METERS;
use crate::db::schema;
use crate::error::Result;
use crate::geo::haversine_distance_meters;

#[derive(Deserialize)]
struct LinkJobPayload {
    location_id: String,
    lat: f64,
    lng: f64,
}

/// Job handler for the `ref-map-point-match` queue: triggered whenever a
/// location's GPS is set or changed.
pub fn run_link_job(conn: &Connection, job: &schema::Job) -> Result<String> {
    let payload: LinkJobPayload = serde_json::from_str(&job.payload_json)?;
    let linked = link_location(conn, &payload.location_id, payload.lat, payload.lng)?;
    Ok(serde_json::to_string(&linked)?)
}

fn link_location(conn: &Connection, location_id: &str, lat: f64, lng: f64) -> Result<Vec<i64>> {
    let candidates = schema::list_unlinked_ref_map_points(conn)?;
    let mut linked_ids = Vec::new();

    for point in candidates {
        let distance = haversine_distance_meters(lat, lng, point.lat, point.lng);
        if distance <= REFMAP_LINK_RADIUS_METERS {
            schema::link_ref_map_point(conn, point.id, location_id)?;
            linked_ids.push(point.id);
        }
    }

    Ok(linked_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db;
    use tempfile::tempdir;

    #[test]
    fn links_points_within_radius_and_leaves_far_points_alone() {
        let dir = tempdir().unwrap();
        let conn = open_db(&dir.path().join("catalog.db")).unwrap();
        schema::insert_location(&conn, "loc1", "Test Site", Some(42.36), Some(-71.05), None).unwrap();

        let ref_map_id = schema::insert_ref_map(&conn, "Test Map", "/x.kml", "kml", None).unwrap();
        let near_id = schema::insert_ref_map_point(&conn, ref_map_id, Some("Near"), 42.36001, -71.05001, "Near").unwrap();
        let far_id = schema::insert_ref_map_point(&conn, ref_map_id, Some("Far"), 45.0, -80.0, "Far").unwrap();

        let linked = link_location(&conn, "loc1", 42.36, -71.05).unwrap();
        assert_eq!(linked, vec![near_id]);

        let points = schema::list_ref_map_points(&conn, ref_map_id).unwrap();
        let near = points.iter().find(|p| p.id == near_id).unwrap();
        let far = points.iter().find(|p| p.id == far_id).unwrap();
        assert_eq!(near.linked_locid.as_deref(), Some("loc1"));
        assert!(far.linked_locid.is_none());
    }
}
