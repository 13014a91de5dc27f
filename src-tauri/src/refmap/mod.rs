// Reference-map engine: KML/KMZ/GPX/GeoJSON/CSV import, coordinate-rounded
// dedup, and GPS-proximity linking against catalog locations. Grounded on
// spec.md 4.G; parsers are plain synchronous functions run inside a Job
// off the calling thread, matching the crate's async-free core.

pub mod csv;
pub mod dedup;
pub mod geojson;
pub mod gpx;
pub mod import;
pub mod kml;
pub mod linking;
pub mod types;

pub use import::import_ref_map_file;
pub use linking::run_link_job;
