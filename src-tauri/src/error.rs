// Locarch error types
// One variant per error kind the core must distinguish (see §7 of the spec).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoPlain(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("path escapes archive root: {0}")]
    PathEscape(String),

    #[error("post-copy rehash mismatch for {path}: expected {expected}, got {actual}")]
    CorruptedCopy {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("caller timeout exceeded")]
    TimeoutExceeded,

    #[error("external helper unavailable: {0}")]
    ExternalHelperUnavailable(String),

    #[error("merge blocked by exclusion: {0}")]
    ConflictingMerge(String),

    #[error("location not found: {0}")]
    LocationNotFound(String),

    #[error("media not found: {0}")]
    MediaNotFound(String),

    #[error("import session not found: {0}")]
    SessionNotFound(i64),

    #[error("job not found: {0}")]
    JobNotFound(i64),

    #[error("hash error: {0}")]
    Hash(String),

    #[error("exiftool error: {0}")]
    ExifTool(String),

    #[error("ffprobe error: {0}")]
    FFprobe(String),

    #[error("ffmpeg error: {0}")]
    FFmpeg(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
