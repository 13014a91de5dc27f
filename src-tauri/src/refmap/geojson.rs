// GeoJSON parser via the `geojson` crate. Only Point-geometry features are
// reference-map candidates; other geometry types are skipped rather than
// rejecting the whole file.

use std::path::Path;

use geojson::{GeoJson, Value};

use crate::error::{CoreError, Result};

use super::types::Point;

pub fn parse_geojson_file(path: &Path) -> Result<Vec<Point>> {
    let text = std::fs::read_to_string(path).map_err(|e| CoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_geojson_str(&text)
}

fn parse_geojson_str(text: &str) -> Result<Vec<Point>> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| CoreError::Other(format!("geojson parse error: {}", e)))?;

    let mut points = Vec::new();
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in fc.features {
                if let Some(point) = feature_to_point(&feature) {
                    points.push(point);
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(point) = feature_to_point(&feature) {
                points.push(point);
            }
        }
        GeoJson::Geometry(geometry) => {
            if let Some((lat, lng)) = geometry_to_latlng(&geometry.value) {
                points.push(Point::new(lat, lng));
            }
        }
    }

    Ok(points)
}

fn feature_to_point(feature: &geojson::Feature) -> Option<Point> {
    let geometry = feature.geometry.as_ref()?;
    let (lat, lng) = geometry_to_latlng(&geometry.value)?;

    let props = feature.properties.as_ref();
    let name = props
        .and_then(|p| p.get("name"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let description = props
        .and_then(|p| p.get("description"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let state = props
        .and_then(|p| p.get("state"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let category = props
        .and_then(|p| p.get("category"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let raw_metadata = props.map(|p| serde_json::Value::Object(p.clone()).to_string());

    Some(Point {
        name,
        description,
        lat,
        lng,
        state,
        category,
        raw_metadata,
    })
}

fn geometry_to_latlng(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Point(coords) if coords.len() >= 2 => Some((coords[1], coords[0])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feature_collection_points() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"name": "Old Mill", "state": "MA"},
                    "geometry": {"type": "Point", "coordinates": [-71.05, 42.36]}
                }
            ]
        }"#;
        let points = parse_geojson_str(json).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].name.as_deref(), Some("Old Mill"));
        assert_eq!(points[0].state.as_deref(), Some("MA"));
        assert!((points[0].lat - 42.36).abs() < 1e-9);
    }

    #[test]
    fn skips_non_point_geometry() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {"type": "LineString", "coordinates": [[-71.0, 42.0], [-71.1, 42.1]]}
                }
            ]
        }"#;
        let points = parse_geojson_str(json).unwrap();
        assert!(points.is_empty());
    }
}
