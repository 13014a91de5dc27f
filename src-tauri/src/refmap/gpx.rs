// GPX parser: walks `<wpt>` and `<trkpt>` elements for their `lat`/`lon`
// attributes and nested `<name>`/`<desc>`. Same event-reader idiom as
// `kml.rs`, different tag set.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{CoreError, Result};

use super::types::Point;

pub fn parse_gpx_file(path: &Path) -> Result<Vec<Point>> {
    let bytes = std::fs::read(path).map_err(|e| CoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_gpx_bytes(&bytes)
}

fn parse_gpx_bytes(bytes: &[u8]) -> Result<Vec<Point>> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut points = Vec::new();
    let mut buf = Vec::new();

    let mut in_point = false;
    let mut current_tag: Vec<u8> = Vec::new();
    let mut lat: Option<f64> = None;
    let mut lng: Option<f64> = None;
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) => {
                let tag = e.name().as_ref().to_vec();
                if tag == b"wpt" || tag == b"trkpt" {
                    let mut point_lat = None;
                    let mut point_lng = None;
                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value().unwrap_or_default().to_string();
                        match attr.key.as_ref() {
                            b"lat" => point_lat = value.parse().ok(),
                            b"lon" => point_lng = value.parse().ok(),
                            _ => {}
                        }
                    }
                    if let (Some(lat), Some(lng)) = (point_lat, point_lng) {
                        points.push(Point {
                            name: None,
                            description: None,
                            lat,
                            lng,
                            state: None,
                            category: None,
                            raw_metadata: None,
                        });
                    }
                }
            }
            Ok(Event::Start(e)) => {
                let tag = e.name().as_ref().to_vec();
                if tag == b"wpt" || tag == b"trkpt" {
                    in_point = true;
                    lat = None;
                    lng = None;
                    name = None;
                    description = None;
                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value().unwrap_or_default().to_string();
                        match attr.key.as_ref() {
                            b"lat" => lat = value.parse().ok(),
                            b"lon" => lng = value.parse().ok(),
                            _ => {}
                        }
                    }
                }
                current_tag = tag;
            }
            Ok(Event::Text(t)) => {
                if in_point {
                    let text = t.decode().map(|c| c.into_owned()).unwrap_or_default();
                    match current_tag.as_slice() {
                        b"name" => name = Some(text),
                        b"desc" => description = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let tag = e.name().as_ref().to_vec();
                if (tag == b"wpt" || tag == b"trkpt") && in_point {
                    in_point = false;
                    if let (Some(lat), Some(lng)) = (lat, lng) {
                        points.push(Point {
                            name: name.clone(),
                            description: description.clone(),
                            lat,
                            lng,
                            state: None,
                            category: None,
                            raw_metadata: None,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CoreError::Other(format!("gpx parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_waypoints_with_name() {
        let gpx = br#"<?xml version="1.0"?>
<gpx><wpt lat="42.36" lon="-71.05"><name>Old Mill</name></wpt></gpx>"#;
        let points = parse_gpx_bytes(gpx).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].name.as_deref(), Some("Old Mill"));
        assert!((points[0].lat - 42.36).abs() < 1e-9);
    }

    #[test]
    fn parses_track_points() {
        let gpx = br#"<gpx><trk><trkseg>
<trkpt lat="40.1" lon="-74.2"></trkpt>
<trkpt lat="40.2" lon="-74.3"></trkpt>
</trkseg></trk></gpx>"#;
        let points = parse_gpx_bytes(gpx).unwrap();
        assert_eq!(points.len(), 2);
    }
}
