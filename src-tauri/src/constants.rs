// Locarch constants
// These values are the archive format contract. Do not change without a
// migration: changing an on-disk path layout or a hash scheme breaks every
// archive already on disk.

pub const PIPELINE_VERSION: u32 = 1;

// Hashing
pub const HASH_ALGORITHM: &str = "blake3";
pub const HASH_CHUNK_SIZE: usize = 1_048_576; // 1MB streaming buffer
pub const PHASH_DOWNSAMPLE: u32 = 32; // grayscale NxN before DCT
pub const PHASH_KEEP: usize = 8; // top-left KxK DCT coefficients kept (minus DC)

// Concurrency defaults
pub const DEFAULT_HASH_WORKERS: usize = 4;
pub const DEFAULT_COPY_WORKERS: usize = 2;
pub const DEFAULT_THUMB_WORKERS: usize = 1;
pub const DEFAULT_PROXY_WORKERS: usize = 1;
pub const DEFAULT_PHASH_WORKERS: usize = 2;
pub const DEFAULT_REFMAP_WORKERS: usize = 1;
pub const DEFAULT_BAGIT_WORKERS: usize = 1;
pub const DEFAULT_EXTRACTION_WORKERS: usize = 1;
pub const MAX_CONCURRENT_FFMPEG: usize = 2;

// Archive layout
pub const ARCHIVE_FOLDER: &str = ".locarch";
pub const DB_FILENAME: &str = "catalog.db";
pub const THUMBS_FOLDER: &str = "thumbnails";
pub const THUMB_SIZES: [(&str, u32); 3] = [("sm", 400), ("lg", 800), ("preview", 1920)];
pub const PROXIES_FOLDER: &str = "proxies";
pub const LOCATIONS_FOLDER: &str = "locations";
pub const MEDIA_SUBDIR: &str = "media";
pub const WEB_SOURCES_SUBDIR: &str = "web-sources";
pub const BAG_INFO_FILENAME: &str = "bag-info.txt";
pub const MANIFEST_FILENAME: &str = "manifest-blake3.txt";
pub const ARCHIVE_VERSION: &str = "1.0";

// Catalog Store
pub const BUSY_TIMEOUT_MS: u32 = 5_000;

// Job queue
pub const JOB_MAX_ATTEMPTS: i64 = 5;
pub const JOB_BASE_BACKOFF_SECONDS: i64 = 1;
pub const JOB_MAX_BACKOFF_SECONDS: i64 = 300;
pub const JOB_LOCK_TIMEOUT_SECONDS: i64 = 600; // stale-lock janitor threshold
pub const JOB_QUEUES: [&str; 9] = [
    "import",
    "exiftool",
    "thumbnail",
    "proxy",
    "perceptual-hash",
    "ref-map-point-match",
    "bagit-validate",
    "extraction",
    "location-stats",
];

// Reference-map dedup
pub const REFMAP_COORD_ROUND_DECIMALS: i32 = 4;
pub const REFMAP_LINK_RADIUS_METERS: f64 = 25.0;

// Merge engine thresholds
pub const MERGE_GPS_RADIUS_METERS: f64 = 25.0;
pub const MERGE_COMBINED_RADIUS_METERS: f64 = 100.0;
pub const MERGE_GENERIC_NAME_RADIUS_METERS: f64 = 5_000.0;
pub const MERGE_NAME_SIMILARITY_THRESHOLD: f64 = 0.92;
pub const MERGE_COMBINED_NAME_SIMILARITY_THRESHOLD: f64 = 0.85;
pub const MERGE_TOKEN_OVERLAP_THRESHOLD: f64 = 2.0 / 3.0;
pub const GENERIC_LOCATION_NAMES: [&str; 8] = [
    "hospital", "school", "church", "factory", "mill", "farm", "house", "barn",
];

// Timeline merger
pub const TIMELINE_MERGE_WINDOW_DAYS: i64 = 365;
pub const TIMELINE_DESC_PREFIX_LEN: usize = 50;
pub const CELLPHONE_MAKES: [&str; 4] = ["Apple", "Samsung", "Google", "OnePlus"];
pub const FILM_SCANNER_MAKES: [&str; 3] = ["Noritsu", "Fuji Frontier", "Pakon"];

// BagIt validator
pub const BAGIT_REVALIDATE_INTERVAL_HOURS: i64 = 24;

// Media protocol
pub const RANGE_SCHEME: &str = "media";

// Media kinds / extensions
pub const IMAGE_EXTENSIONS: [&str; 9] = [
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "heic",
];
pub const VIDEO_EXTENSIONS: [&str; 10] = [
    "mp4", "mov", "avi", "mkv", "webm", "m4v", "mpg", "mpeg", "wmv", "flv",
];
pub const DOCUMENT_EXTENSIONS: [&str; 5] = ["pdf", "doc", "docx", "txt", "rtf"];
pub const MAP_EXTENSIONS: [&str; 6] = ["kml", "kmz", "gpx", "geojson", "json", "tif"];
pub const SIDECAR_EXTENSIONS: [&str; 6] = ["srt", "lrf", "thm", "xmp", "xml", "idx"];
pub const IMPORT_SIZE_CEILING_BYTES: u64 = 20 * 1024 * 1024 * 1024; // 20 GiB, flagged not rejected

// Proxy / thumbnail presets
pub const PROXY_CODEC: &str = "h264";
pub const PROXY_RESOLUTION: u32 = 720;
pub const PROXY_CRF: u32 = 23;
pub const THUMB_FORMAT: &str = "jpg";
pub const THUMB_QUALITY: u32 = 85;
