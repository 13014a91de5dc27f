// CSV parser. Column names are matched case-insensitively against a small
// set of recognized headers (`lat`/`latitude`, `lng`/`lon`/`longitude`,
// `name`, `state`, `category`); any other columns are folded into
// `raw_metadata` as a JSON object so nothing is silently dropped.

use std::path::Path;

use crate::error::{CoreError, Result};

use super::types::Point;

pub fn parse_csv_file(path: &Path) -> Result<Vec<Point>> {
    let mut reader = ::csv::Reader::from_path(path)
        .map_err(|e| CoreError::Other(format!("failed to open csv {}: {}", path.display(), e)))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CoreError::Other(format!("failed to read csv headers: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let lat_idx = find_column(&headers, &["lat", "latitude"]);
    let lng_idx = find_column(&headers, &["lng", "lon", "long", "longitude"]);
    let name_idx = find_column(&headers, &["name", "title"]);
    let state_idx = find_column(&headers, &["state", "province"]);
    let category_idx = find_column(&headers, &["category", "type"]);

    let (lat_idx, lng_idx) = match (lat_idx, lng_idx) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(CoreError::Other(
                "csv file has no recognizable lat/lng columns".to_string(),
            ))
        }
    };

    let mut points = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| CoreError::Other(format!("csv row error: {}", e)))?;

        let lat: Option<f64> = record.get(lat_idx).and_then(|s| s.trim().parse().ok());
        let lng: Option<f64> = record.get(lng_idx).and_then(|s| s.trim().parse().ok());
        let (Some(lat), Some(lng)) = (lat, lng) else {
            continue;
        };

        let name = name_idx.and_then(|i| record.get(i)).map(|s| s.to_string());
        let state = state_idx.and_then(|i| record.get(i)).map(|s| s.to_string());
        let category = category_idx.and_then(|i| record.get(i)).map(|s| s.to_string());

        let raw_metadata = serde_json::to_string(
            &headers
                .iter()
                .zip(record.iter())
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect::<std::collections::HashMap<String, String>>(),
        )
        .ok();

        points.push(Point {
            name,
            description: None,
            lat,
            lng,
            state,
            category,
            raw_metadata,
        });
    }

    Ok(points)
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| candidates.iter().any(|c| h.eq_ignore_ascii_case(c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[test]
    fn parses_rows_with_lat_lng_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name,lat,lng,state").unwrap();
        writeln!(file, "Old Mill,42.36,-71.05,MA").unwrap();
        let points = parse_csv_file(file.path()).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].name.as_deref(), Some("Old Mill"));
        assert_eq!(points[0].state.as_deref(), Some("MA"));
    }

    #[test]
    fn skips_rows_with_unparseable_coordinates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name,latitude,longitude").unwrap();
        writeln!(file, "Bad Row,not-a-number,-71.05").unwrap();
        writeln!(file, "Good Row,42.0,-71.0").unwrap();
        let points = parse_csv_file(file.path()).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].name.as_deref(), Some("Good Row"));
    }

    #[test]
    fn errors_when_no_coordinate_columns_present() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name,description").unwrap();
        writeln!(file, "Old Mill,abandoned").unwrap();
        assert!(parse_csv_file(file.path()).is_err());
    }
}
