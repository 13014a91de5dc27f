// Deduplicates a freshly-parsed point list by rounded coordinates before
// insertion. Two points round to the same `(lat, lng)` become one row; the
// survivor accumulates every distinct name it absorbed into `aka_names`
// (pipe-delimited per spec.md 4.G).

use crate::constants::REFMAP_COORD_ROUND_DECIMALS;

use super::types::Point;

pub struct DedupedPoint {
    pub lat: f64,
    pub lng: f64,
    pub primary_name: Option<String>,
    pub aka_names: String,
    pub description: Option<String>,
    pub state: Option<String>,
    pub category: Option<String>,
}

pub fn dedup_points(points: Vec<Point>) -> Vec<DedupedPoint> {
    let mut buckets: Vec<DedupedPoint> = Vec::new();

    for point in points {
        let rounded = round_coord(point.lat, point.lng);
        let existing = buckets
            .iter_mut()
            .find(|b| round_coord(b.lat, b.lng) == rounded);

        match existing {
            Some(survivor) => {
                if let Some(name) = &point.name {
                    merge_aka_name(&mut survivor.aka_names, name);
                }
                if survivor.description.is_none() {
                    survivor.description = point.description;
                }
                if survivor.state.is_none() {
                    survivor.state = point.state;
                }
                if survivor.category.is_none() {
                    survivor.category = point.category;
                }
            }
            None => {
                let aka_names = point.name.clone().unwrap_or_default();
                buckets.push(DedupedPoint {
                    lat: point.lat,
                    lng: point.lng,
                    primary_name: point.name,
                    aka_names,
                    description: point.description,
                    state: point.state,
                    category: point.category,
                });
            }
        }
    }

    buckets
}

fn round_coord(lat: f64, lng: f64) -> (i64, i64) {
    let factor = 10f64.powi(REFMAP_COORD_ROUND_DECIMALS);
    ((lat * factor).round() as i64, (lng * factor).round() as i64)
}

fn merge_aka_name(aka_names: &mut String, new_name: &str) {
    if aka_names.is_empty() {
        *aka_names = new_name.to_string();
        return;
    }
    if !aka_names.split('|').any(|n| n == new_name) {
        aka_names.push('|');
        aka_names.push_str(new_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_points_with_same_rounded_coordinates() {
        let points = vec![
            Point {
                name: Some("Old Mill".to_string()),
                description: None,
                lat: 42.36001,
                lng: -71.05001,
                state: None,
                category: None,
                raw_metadata: None,
            },
            Point {
                name: Some("Abandoned Mill".to_string()),
                description: None,
                lat: 42.36002,
                lng: -71.05002,
                state: Some("MA".to_string()),
                category: None,
                raw_metadata: None,
            },
        ];

        let deduped = dedup_points(points);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].aka_names, "Old Mill|Abandoned Mill");
        assert_eq!(deduped[0].state.as_deref(), Some("MA"));
    }

    #[test]
    fn keeps_distinct_coordinates_separate() {
        let points = vec![
            Point::new(40.0, -74.0),
            Point::new(41.0, -75.0),
        ];
        let deduped = dedup_points(points);
        assert_eq!(deduped.len(), 2);
    }
}
