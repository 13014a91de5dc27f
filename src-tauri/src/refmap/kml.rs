// KML (and KMZ, its zipped form) parser. Walks `<Placemark>` elements and
// pulls `<name>`, `<description>`, and the first `<coordinates>` under a
// `<Point>`. Grounded on the crate's `quick-xml` event-reader idiom, used
// the same way by `gpx.rs` for its own tag set.

use std::io::{BufReader, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{CoreError, Result};

use super::types::Point;

pub fn parse_kml_file(path: &Path) -> Result<Vec<Point>> {
    let bytes = std::fs::read(path).map_err(|e| CoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_kml_bytes(&bytes)
}

pub fn parse_kmz_file(path: &Path) -> Result<Vec<Point>> {
    let file = std::fs::File::open(path).map_err(|e| CoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| CoreError::Other(format!("invalid kmz archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| CoreError::Other(format!("invalid kmz entry: {}", e)))?;
        if entry.name().ends_with(".kml") {
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|e| CoreError::Other(format!("failed to read kml from kmz: {}", e)))?;
            return parse_kml_bytes(&buf);
        }
    }
    Err(CoreError::Other("kmz archive contains no .kml entry".to_string()))
}

fn parse_kml_bytes(bytes: &[u8]) -> Result<Vec<Point>> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut points = Vec::new();
    let mut buf = Vec::new();

    let mut in_placemark = false;
    let mut in_point = false;
    let mut current_tag: Vec<u8> = Vec::new();

    let mut name: Option<String> = None;
    let mut description: Option<String> = None;
    let mut coordinates: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = e.name().as_ref().to_vec();
                match tag.as_slice() {
                    b"Placemark" => {
                        in_placemark = true;
                        name = None;
                        description = None;
                        coordinates = None;
                    }
                    b"Point" if in_placemark => in_point = true,
                    _ => {}
                }
                current_tag = tag;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .decode()
                    .map(|c| c.into_owned())
                    .unwrap_or_default();
                if in_placemark {
                    match current_tag.as_slice() {
                        b"name" => name = Some(text),
                        b"description" => description = Some(text),
                        b"coordinates" if in_point => coordinates = Some(text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"Point" => in_point = false,
                b"Placemark" => {
                    in_placemark = false;
                    if let Some(coords) = coordinates.take() {
                        if let Some(point) = parse_coordinates(&coords, name.clone(), description.clone()) {
                            points.push(point);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(CoreError::Other(format!("kml parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(points)
}

/// KML coordinate order is `lng,lat[,alt]`, the opposite of this crate's
/// `Point{lat, lng}` convention.
fn parse_coordinates(raw: &str, name: Option<String>, description: Option<String>) -> Option<Point> {
    let first = raw.split_whitespace().next()?;
    let mut parts = first.split(',');
    let lng: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    Some(Point {
        name,
        description,
        lat,
        lng,
        state: None,
        category: None,
        raw_metadata: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_placemark() {
        let kml = br#"<?xml version="1.0"?>
<kml><Document>
<Placemark>
  <name>Old Mill</name>
  <description>Abandoned since 1974</description>
  <Point><coordinates>-71.05,42.36,0</coordinates></Point>
</Placemark>
</Document></kml>"#;
        let points = parse_kml_bytes(kml).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].name.as_deref(), Some("Old Mill"));
        assert!((points[0].lat - 42.36).abs() < 1e-9);
        assert!((points[0].lng - (-71.05)).abs() < 1e-9);
    }

    #[test]
    fn ignores_placemarks_without_point_geometry() {
        let kml = br#"<kml><Document>
<Placemark><name>No geometry</name></Placemark>
</Document></kml>"#;
        let points = parse_kml_bytes(kml).unwrap();
        assert!(points.is_empty());
    }
}
